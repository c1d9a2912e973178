use battery_core::OrderIntent;
use log::debug;
use uuid::Uuid;

pub mod sim;

/// Why the market collaborator refused an order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRejection {
    pub reason: String,
}

/// Narrow contract the execution engine depends on. A live venue connection
/// and the historical fill simulator are interchangeable behind it; the
/// variant is chosen at construction time, never branched on inside the
/// engine.
pub trait MarketClient: Send {
    fn name(&self) -> &str;

    /// Accept the order under the engine-assigned id, or refuse it.
    fn place_order(&mut self, order_id: Uuid, intent: &OrderIntent) -> Result<(), MarketRejection>;

    /// Request cancellation; returns true if the request was accepted.
    /// Issuing a cancel does not release anything — the reservation is only
    /// released when the confirmed terminal CANCELLED status arrives through
    /// the normal update path.
    fn cancel_order(&mut self, order_id: Uuid) -> bool;
}

/// Accepts every order and never produces a fill or a cancel confirmation.
/// Dry-run mode exercises the planner and engine against this.
#[derive(Debug, Default)]
pub struct DryRunMarket;

impl MarketClient for DryRunMarket {
    fn name(&self) -> &str {
        "DRY-RUN"
    }

    fn place_order(&mut self, order_id: Uuid, intent: &OrderIntent) -> Result<(), MarketRejection> {
        debug!(
            "Dry-run accepted order {}: {:?} {:.3} MWh @ {:.2} EUR/MWh",
            order_id, intent.side, intent.volume_mwh, intent.limit_price_eur_mwh
        );
        Ok(())
    }

    fn cancel_order(&mut self, _order_id: Uuid) -> bool {
        true
    }
}
