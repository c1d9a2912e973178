use crate::backtest::DayResult;

const WINDOWS: [usize; 4] = [1, 30, 60, 90];

/// Aggregate over the trailing `days` of a backtest history.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub days: usize,
    pub profit_eur: f64,
    pub revenue_eur: f64,
    pub cost_eur: f64,
    pub buy_energy_mwh: f64,
    pub sell_energy_mwh: f64,
}

impl WindowSummary {
    pub fn profit_per_day(&self) -> f64 {
        if self.days == 0 {
            0.0
        } else {
            self.profit_eur / self.days as f64
        }
    }
}

pub fn summarize(history: &[DayResult], window: usize) -> WindowSummary {
    let days = window.min(history.len());
    let tail = &history[history.len() - days..];
    WindowSummary {
        days,
        profit_eur: tail.iter().map(DayResult::profit_eur).sum(),
        revenue_eur: tail.iter().map(|d| d.revenue_eur).sum(),
        cost_eur: tail.iter().map(|d| d.cost_eur).sum(),
        buy_energy_mwh: tail.iter().map(|d| d.buy_energy_mwh).sum(),
        sell_energy_mwh: tail.iter().map(|d| d.sell_energy_mwh).sum(),
    }
}

/// Trailing-window profitability table over the full backtest history.
pub fn print_report(history: &[DayResult]) {
    if history.is_empty() {
        println!("No trading days in range.");
        return;
    }

    println!(
        "{:>8} {:>12} {:>14} {:>12} {:>12} {:>12} {:>12}",
        "window", "profit EUR", "profit/day", "revenue", "cost", "bought MWh", "sold MWh"
    );
    // Partially-covered windows still print; the days column makes the
    // actual coverage explicit.
    for window in WINDOWS {
        let s = summarize(history, window);
        println!(
            "{:>7}d {:>12.2} {:>14.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            s.days,
            s.profit_eur,
            s.profit_per_day(),
            s.revenue_eur,
            s.cost_eur,
            s.buy_energy_mwh,
            s.sell_energy_mwh
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(n: u32, profit: f64) -> DayResult {
        DayResult {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap() + chrono::Duration::days(n as i64),
            orders_submitted: 6,
            orders_filled: 6,
            orders_expired: 0,
            buy_energy_mwh: 30.0,
            sell_energy_mwh: 28.0,
            cost_eur: 750.0,
            revenue_eur: 750.0 + profit,
            soc_end_mwh: 0.0,
        }
    }

    #[test]
    fn test_summarize_takes_trailing_days() {
        let history: Vec<DayResult> = (0..5).map(|n| day(n, n as f64 * 100.0)).collect();

        let last = summarize(&history, 1);
        assert_eq!(last.days, 1);
        assert!((last.profit_eur - 400.0).abs() < 1e-9);

        let all = summarize(&history, 30);
        assert_eq!(all.days, 5);
        assert!((all.profit_eur - 1000.0).abs() < 1e-9);
        assert!((all.profit_per_day() - 200.0).abs() < 1e-9);
        assert!((all.buy_energy_mwh - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_empty_history() {
        let s = summarize(&[], 30);
        assert_eq!(s.days, 0);
        assert_eq!(s.profit_per_day(), 0.0);
    }
}
