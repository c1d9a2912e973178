use crate::model::Side;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One planned action for a delivery hour of the trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTrade {
    /// Index into the day's price curve (0-based; 0..23/24/25 under DST).
    pub hour: u32,
    pub side: Side,
    pub volume_mwh: f64,
    pub price_eur_mwh: f64,
}

/// Ordered trade plan for one trading day. Immutable after creation and
/// consumed once by the execution engine; never partially re-applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePlan {
    pub date: NaiveDate,
    pub entries: Vec<PlannedTrade>,
}

impl TradePlan {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn buy_energy_mwh(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.side == Side::Buy)
            .map(|e| e.volume_mwh)
            .sum()
    }

    pub fn sell_energy_mwh(&self) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.side == Side::Sell)
            .map(|e| e.volume_mwh)
            .sum()
    }
}
