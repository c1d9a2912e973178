use anyhow::Result;
use battery_core::{
    AppConfig, BatteryConfig, BatteryState, DeliverySlot, HistoricalPriceSeries, Market,
    OrderIntent, PlannedTrade, Side,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use execution_engine::engine::Engine;
use execution_engine::market::sim::FillSimulator;
use execution_engine::risk::RiskManager;
use log::{info, warn};
use std::collections::HashMap;
use strategy_planner::DayAheadPlanner;

/// Orders the simulator never matched expire this long after delivery end.
const EXPIRY_WINDOW_HOURS: i64 = 24;

/// Outcome of one simulated trading day.
#[derive(Debug, Clone)]
pub struct DayResult {
    pub date: NaiveDate,
    pub orders_submitted: usize,
    pub orders_filled: usize,
    pub orders_expired: usize,
    pub buy_energy_mwh: f64,
    pub sell_energy_mwh: f64,
    pub cost_eur: f64,
    pub revenue_eur: f64,
    pub soc_end_mwh: f64,
}

impl DayResult {
    pub fn profit_eur(&self) -> f64 {
        self.revenue_eur - self.cost_eur
    }

    pub fn buy_vwap(&self) -> Option<f64> {
        (self.buy_energy_mwh > 0.0).then(|| self.cost_eur / self.buy_energy_mwh)
    }

    pub fn sell_vwap(&self) -> Option<f64> {
        (self.sell_energy_mwh > 0.0).then(|| self.revenue_eur / self.sell_energy_mwh)
    }
}

/// One engine and one simulator for the whole run, so the SOC carries over
/// from day to day exactly as it would on the physical asset.
pub struct BacktestSession {
    engine: Engine,
    sim: FillSimulator,
    planner: DayAheadPlanner,
    battery_config: BatteryConfig,
}

impl BacktestSession {
    pub fn new(app: &AppConfig) -> Result<Self> {
        let battery = BatteryState::from_config(&app.battery)?;
        let sim = FillSimulator::new();
        let engine = Engine::new(
            RiskManager::new(battery, app.risk.clone()),
            Box::new(sim.market_client()),
        );
        Ok(Self {
            engine,
            sim,
            planner: DayAheadPlanner::new(app.planner.clone()),
            battery_config: app.battery.clone(),
        })
    }

    pub fn soc_mwh(&self) -> f64 {
        self.engine.soc_mwh()
    }

    /// Plans the day against its own price curve, submits the plan, then
    /// steps hour by hour matching fills and finally flushes stale orders.
    pub fn run_day(
        &mut self,
        prices: &HistoricalPriceSeries,
        date: NaiveDate,
    ) -> Result<DayResult> {
        let curve = prices.day_prices(date);
        let battery = self.battery_snapshot()?;
        let plan = self.planner.plan(&battery, date, &curve);

        let mut submitted: HashMap<uuid::Uuid, PlannedTrade> = HashMap::new();
        for entry in &plan.entries {
            match self.engine.submit(intent_for(date, entry)) {
                Ok(order_id) => {
                    submitted.insert(order_id, entry.clone());
                }
                // The plan is advisory; a risk rejection here just means
                // the live book no longer has room for this action.
                Err(e) => warn!(
                    "{}: planned {:?} H{} dropped at submission: {}",
                    date,
                    entry.side,
                    entry.hour + 1,
                    e
                ),
            }
        }

        let mut result = DayResult {
            date,
            orders_submitted: submitted.len(),
            orders_filled: 0,
            orders_expired: 0,
            buy_energy_mwh: 0.0,
            sell_energy_mwh: 0.0,
            cost_eur: 0.0,
            revenue_eur: 0.0,
            soc_end_mwh: 0.0,
        };

        for hour in 0..curve.len() as u32 {
            let now = slot_start(date, hour);
            for order_id in self.sim.check_fills(&mut self.engine, prices, now) {
                let entry = match submitted.get(&order_id) {
                    Some(e) => e,
                    None => continue, // left over from an earlier day
                };
                // Fills only happen against an observed slot price, so a
                // missing one here means the books and the simulator have
                // diverged; skip the order rather than invent a price.
                let observed = match prices.slot_price(date, entry.hour) {
                    Some(p) => p,
                    None => {
                        warn!(
                            "{}: filled order {} has no settlement price for H{}, not booked",
                            date,
                            order_id,
                            entry.hour + 1
                        );
                        continue;
                    }
                };
                match entry.side {
                    Side::Buy => {
                        result.buy_energy_mwh += entry.volume_mwh;
                        result.cost_eur += entry.volume_mwh * observed;
                    }
                    Side::Sell => {
                        result.sell_energy_mwh += entry.volume_mwh;
                        result.revenue_eur += entry.volume_mwh * observed;
                    }
                }
                result.orders_filled += 1;
            }
        }

        let flush_time = slot_start(date, 0) + Duration::hours(48 + EXPIRY_WINDOW_HOURS);
        result.orders_expired = self
            .sim
            .expire(
                &mut self.engine,
                flush_time,
                Duration::hours(EXPIRY_WINDOW_HOURS),
            )
            .len();
        result.soc_end_mwh = self.engine.soc_mwh();

        info!(
            "{}: {} submitted, {} filled, {} expired, profit {:.2} EUR, SOC {:.2} MWh",
            date,
            result.orders_submitted,
            result.orders_filled,
            result.orders_expired,
            result.profit_eur(),
            result.soc_end_mwh
        );
        Ok(result)
    }

    /// Battery parameters with the engine's current SOC, for planning the
    /// next day.
    fn battery_snapshot(&self) -> Result<BatteryState> {
        let mut cfg = self.battery_config.clone();
        cfg.soc_initial_fraction = self.engine.soc_mwh() / cfg.capacity_mwh;
        Ok(BatteryState::from_config(&cfg)?)
    }
}

/// Start of a delivery slot. Indexing past hour 23 rolls into the next
/// calendar day, which only happens on long DST days.
pub fn slot_start(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))
}

/// Turns one planned action into a day-ahead order: limit at the planned
/// price, one-hour delivery window, hourly product naming (H1..H24).
pub fn intent_for(date: NaiveDate, entry: &PlannedTrade) -> OrderIntent {
    let start = slot_start(date, entry.hour);
    OrderIntent {
        market: Market::DayAhead,
        product: format!("H{}", entry.hour + 1),
        delivery_slot: DeliverySlot {
            date,
            hour: entry.hour,
        },
        delivery_start: start,
        delivery_end: start + Duration::hours(1),
        side: entry.side,
        volume_mwh: entry.volume_mwh,
        limit_price_eur_mwh: entry.price_eur_mwh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battery_core::{DataConfig, PlannerConfig, RiskLimits, SpreadReference};

    fn app() -> AppConfig {
        AppConfig {
            battery: BatteryConfig {
                capacity_mwh: 30.0,
                power_mw: 10.0,
                round_trip_efficiency: 0.9,
                soc_initial_fraction: 0.0,
            },
            risk: RiskLimits {
                max_position_mwh: 100.0,
                max_order_mwh: 25.0,
                min_price_eur_mwh: 0.0,
                max_price_eur_mwh: 1000.0,
                max_open_orders: 10,
            },
            planner: PlannerConfig {
                cycle_target_per_day: 1.0,
                min_spread_eur_mwh: 15.0,
                spread_reference: SpreadReference::EffectiveCostBasis,
                enforce_soc_end_equal_start: false,
                soc_end_tolerance_mwh: 0.5,
            },
            data: DataConfig {
                day_ahead_csv: "unused.csv".into(),
            },
        }
    }

    fn shaped_series(date: NaiveDate) -> HistoricalPriceSeries {
        let curve = [
            50.0, 40.0, 30.0, 25.0, 20.0, 35.0, 60.0, 80.0, 90.0, 85.0, 75.0, 70.0, 65.0, 70.0,
            75.0, 80.0, 90.0, 100.0, 110.0, 95.0, 80.0, 60.0, 45.0, 35.0,
        ];
        let mut series = HistoricalPriceSeries::default();
        for (hour, price) in curve.iter().enumerate() {
            series.insert(date, hour as u32, *price);
        }
        series
    }

    #[test]
    fn test_full_cycle_day_is_profitable() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let series = shaped_series(date);
        let mut session = BacktestSession::new(&app()).unwrap();

        let result = session.run_day(&series, date).unwrap();
        assert_eq!(result.orders_submitted, 6);
        assert_eq!(result.orders_filled, 6);
        assert_eq!(result.orders_expired, 0);
        assert!((result.cost_eur - 750.0).abs() < 1e-6);
        assert!(result.profit_eur() > 0.0);
        // The day buys three full-power hours and sells everything back.
        assert!((result.buy_energy_mwh - 30.0).abs() < 1e-9);
        assert!(result.soc_end_mwh.abs() < 1e-9);
    }

    #[test]
    fn test_long_dst_day_books_hour_25_at_its_own_price() {
        // 25-hour day with a cheap final hour. The next day's H1 trades at
        // 500; the hour-25 buy must fill and book against its own 22 print,
        // not the rolled-over calendar date.
        let long_day = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
        let next_day = NaiveDate::from_ymd_opt(2025, 10, 27).unwrap();
        let mut series = shaped_series(long_day);
        series.insert(long_day, 24, 22.0);
        series.insert(next_day, 0, 500.0);

        let mut session = BacktestSession::new(&app()).unwrap();
        let result = session.run_day(&series, long_day).unwrap();

        assert_eq!(result.orders_submitted, 7);
        assert_eq!(result.orders_filled, 7);
        assert_eq!(result.orders_expired, 0);
        // Three trough buys at 750 plus the hour-25 buy at 22 * 10.
        assert!((result.cost_eur - 970.0).abs() < 1e-6);
        assert!((result.buy_energy_mwh - 40.0).abs() < 1e-9);
        assert!((result.soc_end_mwh - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_soc_carries_across_days() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let next = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let mut series = shaped_series(date);
        // Next day is flat: no plan, SOC untouched.
        for hour in 0..24 {
            series.insert(next, hour, 50.0);
        }

        let mut session = BacktestSession::new(&app()).unwrap();
        let first = session.run_day(&series, date).unwrap();
        let second = session.run_day(&series, next).unwrap();
        assert_eq!(second.orders_submitted, 0);
        assert!((second.soc_end_mwh - first.soc_end_mwh).abs() < 1e-9);
    }

    #[test]
    fn test_day_without_prices_is_a_no_op() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let series = HistoricalPriceSeries::default();
        let mut session = BacktestSession::new(&app()).unwrap();

        let result = session.run_day(&series, date).unwrap();
        assert_eq!(result.orders_submitted, 0);
        assert_eq!(result.orders_filled, 0);
        assert!(result.profit_eur().abs() < 1e-12);
    }
}
