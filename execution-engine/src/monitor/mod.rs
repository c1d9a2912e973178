use battery_core::{EngineError, Order, OrderStatus};
use log::{debug, info};
use std::collections::HashMap;
use uuid::Uuid;

/// Receives terminal lifecycle events. The monitor dispatches exactly one of
/// these per order, on its first arrival at a terminal state.
pub trait LifecycleHandler {
    fn on_filled(&mut self, order_id: Uuid);
    /// Covers CANCELLED, EXPIRED and REJECTED.
    fn on_cancelled_like(&mut self, order_id: Uuid, status: OrderStatus);
}

/// Per-order state machine. All transitions flow through `update_status`;
/// anything arriving after a terminal state is rejected, never reapplied.
#[derive(Default)]
pub struct OrderMonitor {
    tracked: HashMap<Uuid, Order>,
}

impl OrderMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, order: Order) {
        debug!("Tracking order {} ({:?})", order.id, order.status);
        self.tracked.insert(order.id, order);
    }

    pub fn is_tracked(&self, order_id: Uuid) -> bool {
        self.tracked.contains_key(&order_id)
    }

    pub fn active_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn get(&self, order_id: Uuid) -> Option<&Order> {
        self.tracked.get(&order_id)
    }

    /// Single entry point for status updates. Applies the transition
    /// function, records fill progress, and on the first terminal transition
    /// dispatches the matching handler callback and stops tracking.
    ///
    /// Terminal orders are dropped from the table, so a duplicate terminal
    /// delivery surfaces as `UnknownOrder` and touches nothing.
    pub fn update_status(
        &mut self,
        order_id: Uuid,
        new_status: OrderStatus,
        filled_volume_mwh: Option<f64>,
        handler: &mut dyn LifecycleHandler,
    ) -> Result<(), EngineError> {
        let order = self
            .tracked
            .get_mut(&order_id)
            .ok_or(EngineError::UnknownOrder(order_id))?;

        if !order.status.can_transition(new_status) {
            return Err(EngineError::IllegalTransition {
                order_id,
                from: order.status,
                to: new_status,
            });
        }

        debug!(
            "Order {} status {:?} -> {:?}",
            order_id, order.status, new_status
        );
        order.status = new_status;
        if let Some(filled) = filled_volume_mwh {
            order.filled_volume_mwh = filled;
        } else if new_status == OrderStatus::Filled {
            // A full fill with no explicit volume means the whole order.
            order.filled_volume_mwh = order.intent.volume_mwh;
        }

        if !new_status.is_terminal() {
            return Ok(());
        }

        self.tracked.remove(&order_id);
        info!("Order {} terminal: {:?}", order_id, new_status);

        match new_status {
            OrderStatus::Filled => handler.on_filled(order_id),
            _ => handler.on_cancelled_like(order_id, new_status),
        }
        Ok(())
    }
}
