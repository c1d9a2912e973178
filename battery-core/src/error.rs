use crate::model::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

/// Rejections produced by the reservation manager. None of these are fatal:
/// every variant resolves to a rejected submission or an ignored duplicate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    #[error("risk limit exceeded: {0}")]
    LimitExceeded(String),

    /// Duplicate or out-of-order terminal event. Logged and ignored by the
    /// caller; the SOC is never mutated twice for one reservation.
    #[error("reservation {0} not found")]
    ReservationNotFound(Uuid),

    #[error("invalid order parameters: {0}")]
    InvalidOrderParameters(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Risk(#[from] RiskError),

    /// The market collaborator refused the order. Treated identically to an
    /// immediate CANCELLED for reservation purposes.
    #[error("market rejected order: {0}")]
    MarketRejected(String),

    #[error("order {0} is not tracked")]
    UnknownOrder(Uuid),

    #[error("illegal transition {from:?} -> {to:?} for order {order_id}")]
    IllegalTransition {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
