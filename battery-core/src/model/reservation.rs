use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pending, reversible claim against the battery SOC tied to one open
/// order. The `soc_delta_mwh` has already been applied to the SOC when the
/// reservation is created; `commit` keeps it, `release` reverses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub order_id: Uuid,
    pub soc_delta_mwh: f64,
}
