use crate::error::RiskError;
use crate::model::prices::DeliverySlot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Market {
    DayAhead,
    Balancing,
}

/// Order lifecycle states. `Submitted` and `Accepted` are transient;
/// `PartiallyFilled` accumulates fills; the last four are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Submitted,
    Accepted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Rejected
        )
    }

    /// Transition function of the state machine. No transition leaves a
    /// terminal state.
    pub fn can_transition(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match self {
            Submitted => matches!(
                to,
                Accepted | PartiallyFilled | Filled | Cancelled | Expired | Rejected
            ),
            Accepted => matches!(to, PartiallyFilled | Filled | Cancelled | Expired | Rejected),
            PartiallyFilled => matches!(to, PartiallyFilled | Filled | Cancelled | Expired),
            Filled | Cancelled | Expired | Rejected => false,
        }
    }
}

/// A trade intent as handed to the execution engine: everything an order
/// needs except an id and a status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub market: Market,
    pub product: String,
    /// Settlement key. Not derivable from `delivery_start` on long DST days,
    /// where hour index 24 starts on the next calendar date.
    pub delivery_slot: DeliverySlot,
    pub delivery_start: NaiveDateTime,
    pub delivery_end: NaiveDateTime,
    pub side: Side,
    pub volume_mwh: f64,
    pub limit_price_eur_mwh: f64,
}

impl OrderIntent {
    /// Rejects malformed intents before any reservation is attempted.
    pub fn validate(&self) -> Result<(), RiskError> {
        if !self.volume_mwh.is_finite() || self.volume_mwh <= 0.0 {
            return Err(RiskError::InvalidOrderParameters(
                "volume_mwh must be > 0".into(),
            ));
        }
        if !self.limit_price_eur_mwh.is_finite() {
            return Err(RiskError::InvalidOrderParameters(
                "limit_price_eur_mwh must be finite".into(),
            ));
        }
        if self.delivery_end <= self.delivery_start {
            return Err(RiskError::InvalidOrderParameters(
                "delivery_end must be after delivery_start".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub intent: OrderIntent,
    pub status: OrderStatus,
    pub filled_volume_mwh: f64,
}

impl Order {
    pub fn new(id: Uuid, intent: OrderIntent) -> Self {
        Self {
            id,
            intent,
            status: OrderStatus::Submitted,
            filled_volume_mwh: 0.0,
        }
    }

    pub fn remaining_volume_mwh(&self) -> f64 {
        (self.intent.volume_mwh - self.filled_volume_mwh).max(0.0)
    }
}
