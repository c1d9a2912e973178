use crate::market::MarketClient;
use crate::monitor::{LifecycleHandler, OrderMonitor};
use crate::risk::RiskManager;
use battery_core::{EngineError, Order, OrderIntent, OrderStatus};
use log::{info, warn};
use std::collections::HashMap;
use uuid::Uuid;

/// Orchestrates the order lifecycle: reserve SOC, submit to the market
/// collaborator, track the order, and commit or reverse the reservation on
/// the terminal callback. The terminal handlers below are the only callers
/// of `commit`/`release`.
pub struct Engine {
    risk: RiskManager,
    market: Box<dyn MarketClient>,
    monitor: OrderMonitor,
    active_orders: HashMap<Uuid, Uuid>, // order_id -> reservation_id
}

impl Engine {
    pub fn new(risk: RiskManager, market: Box<dyn MarketClient>) -> Self {
        Self {
            risk,
            market,
            monitor: OrderMonitor::new(),
            active_orders: HashMap::new(),
        }
    }

    /// Submits a trade intent. Validates, reserves SOC, forwards to the
    /// market collaborator and starts lifecycle tracking. A risk rejection
    /// returns before any collaborator contact; a market rejection releases
    /// the fresh reservation immediately.
    pub fn submit(&mut self, intent: OrderIntent) -> Result<Uuid, EngineError> {
        intent.validate()?;

        let order_id = Uuid::new_v4();
        let reservation_id = self.risk.reserve(
            intent.side,
            intent.volume_mwh,
            intent.limit_price_eur_mwh,
            order_id,
        )?;

        if let Err(rejection) = self.market.place_order(order_id, &intent) {
            warn!(
                "Market {} rejected order {}: {}",
                self.market.name(),
                order_id,
                rejection.reason
            );
            if let Err(e) = self.risk.release(reservation_id) {
                warn!("Release after market rejection failed: {}", e);
            }
            return Err(EngineError::MarketRejected(rejection.reason));
        }

        self.active_orders.insert(order_id, reservation_id);
        self.monitor.track(Order::new(order_id, intent));
        info!(
            "Submitted order {} (reservation {}, {} open)",
            order_id,
            reservation_id,
            self.active_orders.len()
        );
        Ok(order_id)
    }

    /// Requests cancellation from the collaborator. The reservation stays
    /// live until the confirmed terminal CANCELLED status is observed via
    /// `update_status` — the market may still fill the order.
    pub fn cancel(&mut self, order_id: Uuid) -> Result<bool, EngineError> {
        if !self.active_orders.contains_key(&order_id) {
            return Err(EngineError::UnknownOrder(order_id));
        }
        info!("Requesting cancellation of order {}", order_id);
        Ok(self.market.cancel_order(order_id))
    }

    /// Single entry point for status updates from whichever collaborator
    /// drives the lifecycle (fill simulator in backtests, a poller in live
    /// mode). Duplicate terminal deliveries are rejected and never mutate
    /// the SOC a second time.
    pub fn update_status(
        &mut self,
        order_id: Uuid,
        new_status: OrderStatus,
        filled_volume_mwh: Option<f64>,
    ) -> Result<(), EngineError> {
        let mut handler = TerminalHandler {
            risk: &self.risk,
            active_orders: &mut self.active_orders,
        };
        let result =
            self.monitor
                .update_status(order_id, new_status, filled_volume_mwh, &mut handler);
        if let Err(e) = &result {
            warn!("Status update for order {} rejected: {}", order_id, e);
        }
        result
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn soc_mwh(&self) -> f64 {
        self.risk.soc_mwh()
    }

    pub fn open_orders(&self) -> usize {
        self.active_orders.len()
    }

    pub fn is_active(&self, order_id: Uuid) -> bool {
        self.active_orders.contains_key(&order_id)
    }

    /// Last observed status of a live order. Terminal orders are no longer
    /// tracked and return `None`.
    pub fn order_status(&self, order_id: Uuid) -> Option<OrderStatus> {
        self.monitor.get(order_id).map(|o| o.status)
    }
}

/// Commits on fill, releases on cancel/expiry/rejection, and drops the
/// active-order entry — exactly once per order.
struct TerminalHandler<'a> {
    risk: &'a RiskManager,
    active_orders: &'a mut HashMap<Uuid, Uuid>,
}

impl LifecycleHandler for TerminalHandler<'_> {
    fn on_filled(&mut self, order_id: Uuid) {
        match self.active_orders.remove(&order_id) {
            Some(reservation_id) => {
                if let Err(e) = self.risk.commit(reservation_id) {
                    warn!("Commit for filled order {} failed: {}", order_id, e);
                }
            }
            None => warn!("Filled order {} has no recorded reservation", order_id),
        }
    }

    fn on_cancelled_like(&mut self, order_id: Uuid, status: OrderStatus) {
        match self.active_orders.remove(&order_id) {
            Some(reservation_id) => {
                if let Err(e) = self.risk.release(reservation_id) {
                    warn!(
                        "Release for order {} ({:?}) failed: {}",
                        order_id, status, e
                    );
                }
            }
            None => warn!(
                "Order {} ({:?}) has no recorded reservation",
                order_id, status
            ),
        }
    }
}
