use battery_core::{BatteryState, Reservation, RiskError, RiskLimits, Side};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Battery state plus the live reservation table. One lock covers both so
/// that reserve/commit/release are each other's critical sections.
struct Book {
    battery: BatteryState,
    reservations: HashMap<Uuid, Reservation>,
}

/// Owns the battery and enforces the configured risk limits.
///
/// Invariants:
/// - for every order in a non-terminal state there is exactly one live
///   reservation, and the live-reservation count is the open-order count;
/// - `0 <= soc_mwh <= capacity_mwh` after every operation;
/// - a reservation's SOC delta is applied exactly once, and reversed exactly
///   once if (and only if) the reservation is released.
pub struct RiskManager {
    limits: RiskLimits,
    book: Mutex<Book>,
}

impl RiskManager {
    pub fn new(battery: BatteryState, limits: RiskLimits) -> Self {
        Self {
            limits,
            book: Mutex::new(Book {
                battery,
                reservations: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Book> {
        // A poisoned lock means a panic mid-check, before any mutation; the
        // book is still consistent, so keep going.
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserves SOC for an order and applies the signed delta immediately,
    /// atomically with recording the reservation. BUY charges (`+volume`),
    /// SELL discharges (`-volume / discharge_efficiency`).
    pub fn reserve(
        &self,
        side: Side,
        volume_mwh: f64,
        limit_price_eur_mwh: f64,
        order_id: Uuid,
    ) -> Result<Uuid, RiskError> {
        if !volume_mwh.is_finite() || volume_mwh <= 0.0 {
            return Err(RiskError::InvalidOrderParameters(
                "volume_mwh must be > 0".into(),
            ));
        }
        if volume_mwh > self.limits.max_order_mwh {
            return Err(RiskError::LimitExceeded(format!(
                "volume {:.3} MWh exceeds per-order limit {:.3} MWh",
                volume_mwh, self.limits.max_order_mwh
            )));
        }
        if limit_price_eur_mwh < self.limits.min_price_eur_mwh
            || limit_price_eur_mwh > self.limits.max_price_eur_mwh
        {
            return Err(RiskError::LimitExceeded(format!(
                "price {:.2} outside bounds [{:.2}, {:.2}]",
                limit_price_eur_mwh, self.limits.min_price_eur_mwh, self.limits.max_price_eur_mwh
            )));
        }

        let mut book = self.lock();

        if book.reservations.len() >= self.limits.max_open_orders {
            return Err(RiskError::LimitExceeded(format!(
                "open order limit {} reached",
                self.limits.max_open_orders
            )));
        }

        let soc_delta_mwh = match side {
            Side::Buy => volume_mwh,
            Side::Sell => -volume_mwh / book.battery.discharge_efficiency(),
        };

        let in_flight_mwh: f64 = book
            .reservations
            .values()
            .map(|r| r.soc_delta_mwh.abs())
            .sum();
        if in_flight_mwh + soc_delta_mwh.abs() > self.limits.max_position_mwh {
            return Err(RiskError::LimitExceeded(format!(
                "in-flight position {:.3} MWh would exceed limit {:.3} MWh",
                in_flight_mwh + soc_delta_mwh.abs(),
                self.limits.max_position_mwh
            )));
        }

        if book.battery.delta_violates_bounds(soc_delta_mwh) {
            let (energy, headroom) = book.battery.available_energy_mwh();
            return Err(RiskError::LimitExceeded(match side {
                Side::Buy => format!(
                    "insufficient headroom to charge: {:.3} MWh needed, {:.3} MWh free",
                    soc_delta_mwh, headroom
                ),
                Side::Sell => format!(
                    "insufficient energy to discharge: {:.3} MWh needed, {:.3} MWh stored",
                    -soc_delta_mwh, energy
                ),
            }));
        }

        let reservation_id = Uuid::new_v4();
        book.battery.apply_soc_delta(soc_delta_mwh);
        book.reservations.insert(
            reservation_id,
            Reservation {
                reservation_id,
                order_id,
                soc_delta_mwh,
            },
        );

        debug!(
            "Reserved {:.3} MWh SOC delta for order {} (reservation {}), soc now {:.3}",
            soc_delta_mwh,
            order_id,
            reservation_id,
            book.battery.soc_mwh()
        );
        Ok(reservation_id)
    }

    /// Called on FILLED: drops the reservation record and leaves the SOC
    /// delta applied. The energy actually moved.
    pub fn commit(&self, reservation_id: Uuid) -> Result<(), RiskError> {
        let mut book = self.lock();
        match book.reservations.remove(&reservation_id) {
            Some(r) => {
                debug!(
                    "Committed reservation {} for order {} ({:+.3} MWh)",
                    reservation_id, r.order_id, r.soc_delta_mwh
                );
                Ok(())
            }
            None => {
                warn!("Commit for unknown reservation {} ignored", reservation_id);
                Err(RiskError::ReservationNotFound(reservation_id))
            }
        }
    }

    /// Called on CANCELLED / EXPIRED / REJECTED: drops the record and
    /// reverses the SOC delta, restoring the pre-reservation state.
    pub fn release(&self, reservation_id: Uuid) -> Result<(), RiskError> {
        let mut book = self.lock();
        match book.reservations.remove(&reservation_id) {
            Some(r) => {
                book.battery.apply_soc_delta(-r.soc_delta_mwh);
                debug!(
                    "Released reservation {} for order {}, soc back to {:.3}",
                    reservation_id,
                    r.order_id,
                    book.battery.soc_mwh()
                );
                Ok(())
            }
            None => {
                warn!("Release for unknown reservation {} ignored", reservation_id);
                Err(RiskError::ReservationNotFound(reservation_id))
            }
        }
    }

    pub fn soc_mwh(&self) -> f64 {
        self.lock().battery.soc_mwh()
    }

    /// Stored energy and remaining headroom, both in MWh.
    pub fn available_energy_mwh(&self) -> (f64, f64) {
        self.lock().battery.available_energy_mwh()
    }

    /// Number of live reservations; equals the open-order count.
    pub fn open_orders(&self) -> usize {
        self.lock().reservations.len()
    }
}

#[cfg(test)]
mod tests;
