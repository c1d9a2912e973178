use super::*;
use battery_core::BatteryConfig;

fn battery(soc_fraction: f64) -> BatteryState {
    BatteryState::from_config(&BatteryConfig {
        capacity_mwh: 55.0,
        power_mw: 20.0,
        round_trip_efficiency: 0.9,
        soc_initial_fraction: soc_fraction,
    })
    .unwrap()
}

fn limits() -> RiskLimits {
    RiskLimits {
        max_position_mwh: 100.0,
        max_order_mwh: 25.0,
        min_price_eur_mwh: 0.0,
        max_price_eur_mwh: 1000.0,
        max_open_orders: 3,
    }
}

fn manager() -> RiskManager {
    RiskManager::new(battery(0.5), limits())
}

#[test]
fn test_buy_reserve_applies_full_volume() {
    let rm = manager();
    rm.reserve(Side::Buy, 20.0, 50.0, Uuid::new_v4()).unwrap();
    assert!((rm.soc_mwh() - 47.5).abs() < 1e-9);
    assert_eq!(rm.open_orders(), 1);
}

#[test]
fn test_sell_reserve_uses_discharge_efficiency() {
    let rm = manager();
    rm.reserve(Side::Sell, 20.0, 80.0, Uuid::new_v4()).unwrap();
    let expected = 27.5 - 20.0 / 0.9f64.sqrt();
    assert!((rm.soc_mwh() - expected).abs() < 1e-9);
}

#[test]
fn test_release_round_trip_restores_soc() {
    let rm = manager();
    let before = rm.soc_mwh();

    let r = rm.reserve(Side::Buy, 17.3, 42.0, Uuid::new_v4()).unwrap();
    rm.release(r).unwrap();
    assert!((rm.soc_mwh() - before).abs() < 1e-9);

    let r = rm.reserve(Side::Sell, 11.7, 42.0, Uuid::new_v4()).unwrap();
    rm.release(r).unwrap();
    assert!((rm.soc_mwh() - before).abs() < 1e-9);
    assert_eq!(rm.open_orders(), 0);
}

#[test]
fn test_commit_keeps_delta_applied() {
    let rm = manager();
    let r = rm.reserve(Side::Buy, 10.0, 50.0, Uuid::new_v4()).unwrap();
    rm.commit(r).unwrap();
    assert!((rm.soc_mwh() - 37.5).abs() < 1e-9);
    assert_eq!(rm.open_orders(), 0);
}

#[test]
fn test_commit_and_release_are_idempotent() {
    let rm = manager();
    let r = rm.reserve(Side::Buy, 10.0, 50.0, Uuid::new_v4()).unwrap();

    rm.commit(r).unwrap();
    assert_eq!(rm.commit(r), Err(RiskError::ReservationNotFound(r)));
    assert_eq!(rm.release(r), Err(RiskError::ReservationNotFound(r)));
    // Neither reported duplicate touched the SOC.
    assert!((rm.soc_mwh() - 37.5).abs() < 1e-12);
}

#[test]
fn test_soc_ceiling_rejected() {
    let rm = manager();
    // 27.5 + 25 would land at 52.5, fine; then another 25 would overflow 55.
    rm.reserve(Side::Buy, 25.0, 50.0, Uuid::new_v4()).unwrap();
    let err = rm
        .reserve(Side::Buy, 25.0, 50.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::LimitExceeded(_)));
    assert!((rm.soc_mwh() - 52.5).abs() < 1e-9);
    assert_eq!(rm.open_orders(), 1);
}

#[test]
fn test_soc_floor_rejected() {
    let rm = RiskManager::new(battery(0.1), limits()); // 5.5 MWh stored
    let err = rm
        .reserve(Side::Sell, 10.0, 80.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::LimitExceeded(_)));
    assert!((rm.soc_mwh() - 5.5).abs() < 1e-9);
}

#[test]
fn test_per_order_cap() {
    let rm = manager();
    let err = rm
        .reserve(Side::Buy, 25.1, 50.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::LimitExceeded(_)));
}

#[test]
fn test_price_bounds_fail_fast() {
    let rm = manager();
    for price in [-1.0, 1000.5] {
        let err = rm
            .reserve(Side::Buy, 5.0, price, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, RiskError::LimitExceeded(_)));
    }
    assert_eq!(rm.open_orders(), 0);
    assert!((rm.soc_mwh() - 27.5).abs() < 1e-12);
}

#[test]
fn test_open_order_cap() {
    let rm = manager();
    for _ in 0..3 {
        rm.reserve(Side::Buy, 5.0, 50.0, Uuid::new_v4()).unwrap();
    }
    let err = rm
        .reserve(Side::Buy, 5.0, 50.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::LimitExceeded(_)));
    assert_eq!(rm.open_orders(), 3);
}

#[test]
fn test_position_cap_counts_in_flight_magnitude() {
    let rm = RiskManager::new(
        battery(0.5),
        RiskLimits {
            max_position_mwh: 30.0,
            max_order_mwh: 25.0,
            min_price_eur_mwh: 0.0,
            max_price_eur_mwh: 1000.0,
            max_open_orders: 10,
        },
    );
    rm.reserve(Side::Buy, 20.0, 50.0, Uuid::new_v4()).unwrap();
    // |20| + |11| > 30
    let err = rm
        .reserve(Side::Buy, 11.0, 50.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::LimitExceeded(_)));
}

#[test]
fn test_non_positive_volume_invalid() {
    let rm = manager();
    let err = rm
        .reserve(Side::Buy, 0.0, 50.0, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, RiskError::InvalidOrderParameters(_)));
}

#[test]
fn test_bounds_hold_under_mixed_sequences() {
    let rm = manager();
    let mut live = Vec::new();
    for i in 0..3 {
        let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
        if let Ok(r) = rm.reserve(side, 8.0, 50.0, Uuid::new_v4()) {
            live.push(r);
        }
        let soc = rm.soc_mwh();
        assert!((-1e-9..=55.0 + 1e-9).contains(&soc));
    }
    for (i, r) in live.into_iter().enumerate() {
        if i % 2 == 0 {
            let _ = rm.commit(r);
        } else {
            let _ = rm.release(r);
        }
        let soc = rm.soc_mwh();
        assert!((-1e-9..=55.0 + 1e-9).contains(&soc));
    }
    assert_eq!(rm.open_orders(), 0);
}
