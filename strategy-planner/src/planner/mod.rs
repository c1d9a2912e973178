use battery_core::{BatteryState, PlannedTrade, PlannerConfig, Side, SpreadReference, TradePlan};
use chrono::NaiveDate;
use log::{debug, info};

const EPS: f64 = 1e-9;

/// Maximum cycles per day honoured regardless of configuration. Vendor
/// warranty ceiling.
const CYCLE_CAP: f64 = 2.0;

/// Day-ahead arbitrage planner. Buys the cheapest low-percentile hours,
/// sells the richest high-percentile hours, and walks the day
/// chronologically so every planned action is feasible against the running
/// SOC. The plan is advisory; the reservation manager re-checks feasibility
/// when orders are actually submitted.
pub struct DayAheadPlanner {
    config: PlannerConfig,
}

impl DayAheadPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Builds the plan for one trading day from its hourly price curve.
    /// `hourly_prices[h]` is the price for delivery hour `h`; the slice is
    /// 24 entries long, or 23/25 on DST transition days. Days without a
    /// usable spread yield an empty plan.
    pub fn plan(
        &self,
        battery: &BatteryState,
        date: NaiveDate,
        hourly_prices: &[f64],
    ) -> TradePlan {
        if hourly_prices.is_empty() {
            return TradePlan::empty(date);
        }

        let (low_threshold, high_threshold) = thresholds(hourly_prices);
        if high_threshold - low_threshold <= EPS {
            debug!(
                "{}: no usable spread (low {:.2}, high {:.2}), skipping day",
                date, low_threshold, high_threshold
            );
            return TradePlan::empty(date);
        }

        let budget = self.hour_budget(battery, hourly_prices.len());
        if budget == 0 {
            return TradePlan::empty(date);
        }

        let buy_hours = select_hours(hourly_prices, budget, |p| p <= low_threshold, false);
        let sell_hours = select_hours(hourly_prices, budget, |p| p >= high_threshold, true);

        let entries = self.walk_day(battery, hourly_prices, &buy_hours, &sell_hours);
        let mut plan = TradePlan { date, entries };

        if self.config.enforce_soc_end_equal_start {
            self.trim_to_start_soc(battery, &mut plan);
        }

        info!(
            "{}: planned {} actions (buy {:.2} MWh, sell {:.2} MWh, thresholds {:.2}/{:.2})",
            date,
            plan.entries.len(),
            plan.buy_energy_mwh(),
            plan.sell_energy_mwh(),
            low_threshold,
            high_threshold
        );
        plan
    }

    /// How many hours each side of the arbitrage may use. One cycle needs
    /// roughly `capacity / power` hours at full power; DST days scale the
    /// budget with the day length.
    fn hour_budget(&self, battery: &BatteryState, day_hours: usize) -> usize {
        let cycle_hours = (battery.capacity_mwh() / battery.power_mw()).round().max(1.0);
        let max_cycles = self.config.cycle_target_per_day.clamp(0.0, CYCLE_CAP);
        let base = (max_cycles * cycle_hours).floor() as usize;
        match day_hours {
            23 => base * 23 / 24,
            25 => base + 1,
            _ => base,
        }
    }

    /// Chronological pass over the day. Buys fill toward the capacity
    /// ceiling; sells deliver from stored energy through the discharge leg
    /// and must clear the configured spread over the reference price.
    fn walk_day(
        &self,
        battery: &BatteryState,
        hourly_prices: &[f64],
        buy_hours: &[usize],
        sell_hours: &[usize],
    ) -> Vec<PlannedTrade> {
        let discharge_eff = battery.discharge_efficiency();
        let mut soc = battery.soc_mwh();
        let mut bought_energy = 0.0f64;
        let mut bought_value = 0.0f64;
        let mut last_buy_price: Option<f64> = None;
        let mut entries = Vec::new();

        for (hour, &price) in hourly_prices.iter().enumerate() {
            if buy_hours.contains(&hour) {
                let volume = battery.power_mw().min(battery.capacity_mwh() - soc);
                if volume <= EPS {
                    continue;
                }
                soc += volume;
                bought_energy += volume;
                bought_value += volume * price;
                last_buy_price = Some(price);
                entries.push(PlannedTrade {
                    hour: hour as u32,
                    side: Side::Buy,
                    volume_mwh: volume,
                    price_eur_mwh: price,
                });
            } else if sell_hours.contains(&hour) {
                let deliverable = battery.power_mw().min(soc * discharge_eff);
                if deliverable <= EPS {
                    continue;
                }
                // A sell without recorded buys has no cost basis to price
                // against; skip it rather than guess.
                let reference = match self.config.spread_reference {
                    SpreadReference::EffectiveCostBasis if bought_energy > EPS => {
                        (bought_value / bought_energy) / discharge_eff
                    }
                    SpreadReference::LastBuyPrice => match last_buy_price {
                        Some(p) => p,
                        None => continue,
                    },
                    _ => continue,
                };
                if price - reference < self.config.min_spread_eur_mwh - EPS {
                    debug!(
                        "Hour {}: spread {:.2} below minimum {:.2}, sell skipped",
                        hour,
                        price - reference,
                        self.config.min_spread_eur_mwh
                    );
                    continue;
                }
                soc -= deliverable / discharge_eff;
                entries.push(PlannedTrade {
                    hour: hour as u32,
                    side: Side::Sell,
                    volume_mwh: deliverable,
                    price_eur_mwh: price,
                });
            }
        }
        entries
    }

    /// Reduces planned volumes until the ending SOC is within tolerance of
    /// the starting SOC. Surplus drops the most expensive buys first;
    /// deficit drops the cheapest sells first, so the trimmed actions are
    /// the least profitable ones.
    fn trim_to_start_soc(&self, battery: &BatteryState, plan: &mut TradePlan) {
        let discharge_eff = battery.discharge_efficiency();
        let soc_start = battery.soc_mwh();
        let soc_end = |plan: &TradePlan| {
            plan.entries.iter().fold(soc_start, |soc, e| match e.side {
                Side::Buy => soc + e.volume_mwh,
                Side::Sell => soc - e.volume_mwh / discharge_eff,
            })
        };

        let mut drift = soc_end(plan) - soc_start;
        if drift.abs() <= self.config.soc_end_tolerance_mwh {
            return;
        }
        debug!(
            "{}: ending SOC drifts {:.3} MWh from start, trimming",
            plan.date, drift
        );

        if drift > 0.0 {
            // Too much bought: shrink buys, dearest first.
            let mut order: Vec<usize> = (0..plan.entries.len())
                .filter(|&i| plan.entries[i].side == Side::Buy)
                .collect();
            order.sort_by(|&a, &b| {
                plan.entries[b]
                    .price_eur_mwh
                    .total_cmp(&plan.entries[a].price_eur_mwh)
            });
            for i in order {
                if drift <= self.config.soc_end_tolerance_mwh {
                    break;
                }
                let cut = plan.entries[i].volume_mwh.min(drift);
                plan.entries[i].volume_mwh -= cut;
                drift -= cut;
            }
        } else {
            // Too much sold: shrink sells, cheapest first. Each delivered
            // MWh drew 1/discharge_eff MWh from the SOC.
            let mut order: Vec<usize> = (0..plan.entries.len())
                .filter(|&i| plan.entries[i].side == Side::Sell)
                .collect();
            order.sort_by(|&a, &b| {
                plan.entries[a]
                    .price_eur_mwh
                    .total_cmp(&plan.entries[b].price_eur_mwh)
            });
            for i in order {
                if -drift <= self.config.soc_end_tolerance_mwh {
                    break;
                }
                let cut = plan.entries[i].volume_mwh.min(-drift * discharge_eff);
                plan.entries[i].volume_mwh -= cut;
                drift += cut / discharge_eff;
            }
        }

        plan.entries.retain(|e| e.volume_mwh > EPS);
    }
}

/// 25th/75th price percentiles with linear interpolation. Days with fewer
/// than four distinct prices degrade to (min, max).
fn thresholds(prices: &[f64]) -> (f64, f64) {
    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = 1;
    for w in sorted.windows(2) {
        if (w[1] - w[0]).abs() > EPS {
            distinct += 1;
        }
    }
    if distinct < 4 {
        return (sorted[0], sorted[sorted.len() - 1]);
    }
    (percentile(&sorted, 0.25), percentile(&sorted, 0.75))
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Hours passing `eligible`, best first (cheapest for buys, richest for
/// sells), capped at `budget`. Ties break toward the earlier hour.
fn select_hours(
    prices: &[f64],
    budget: usize,
    eligible: impl Fn(f64) -> bool,
    richest_first: bool,
) -> Vec<usize> {
    let mut hours: Vec<usize> = (0..prices.len()).filter(|&h| eligible(prices[h])).collect();
    hours.sort_by(|&a, &b| {
        let ord = prices[a].total_cmp(&prices[b]);
        let ord = if richest_first { ord.reverse() } else { ord };
        ord.then(a.cmp(&b))
    });
    hours.truncate(budget);
    hours
}
