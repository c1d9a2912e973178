use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of one hourly delivery slot: trading date plus 0-based hour index
/// (0..23/24/25 under DST). Carried explicitly on orders because the
/// wall-clock start of hour index 24 falls on the next calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliverySlot {
    pub date: NaiveDate,
    pub hour: u32,
}

/// One hourly price observation, as found in the day-ahead history CSV
/// (columns: date, hour, price).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDate,
    pub hour: u32,
    #[serde(rename = "price")]
    pub price_eur_mwh: f64,
}

/// Ordered, date-indexed hourly price history. Read-only to the core: the
/// planner reads it as a forecast, the fill simulator as settlement lookup.
#[derive(Debug, Clone, Default)]
pub struct HistoricalPriceSeries {
    slots: BTreeMap<(NaiveDate, u32), f64>,
}

impl HistoricalPriceSeries {
    pub fn from_records(records: impl IntoIterator<Item = PriceRecord>) -> Self {
        let mut slots = BTreeMap::new();
        for r in records {
            slots.insert((r.date, r.hour), r.price_eur_mwh);
        }
        Self { slots }
    }

    pub fn insert(&mut self, date: NaiveDate, hour: u32, price_eur_mwh: f64) {
        self.slots.insert((date, hour), price_eur_mwh);
    }

    /// Price for a single delivery slot, if observed.
    pub fn slot_price(&self, date: NaiveDate, hour: u32) -> Option<f64> {
        self.slots.get(&(date, hour)).copied()
    }

    /// All prices for one day, ordered by hour. 23/24/25 entries depending
    /// on DST.
    pub fn day_prices(&self, date: NaiveDate) -> Vec<f64> {
        self.slots
            .range((date, 0)..=(date, u32::MAX))
            .map(|(_, p)| *p)
            .collect()
    }

    /// Distinct dates covered, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.slots.keys().map(|(d, _)| *d).collect();
        dates.dedup();
        dates
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_slot_lookup_and_day_extraction() {
        let mut s = HistoricalPriceSeries::default();
        s.insert(day(2), 1, 42.0);
        s.insert(day(1), 0, 10.0);
        s.insert(day(1), 1, 20.0);
        s.insert(day(1), 2, 30.0);

        assert_eq!(s.slot_price(day(1), 1), Some(20.0));
        assert_eq!(s.slot_price(day(1), 5), None);
        assert_eq!(s.day_prices(day(1)), vec![10.0, 20.0, 30.0]);
        assert_eq!(s.day_prices(day(3)), Vec::<f64>::new());
        assert_eq!(s.dates(), vec![day(1), day(2)]);
    }
}
