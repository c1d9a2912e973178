use super::{MarketClient, MarketRejection};
use crate::engine::Engine;
use battery_core::{HistoricalPriceSeries, OrderIntent, OrderStatus, Side};
use chrono::{Duration, NaiveDateTime};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PendingOrder {
    intent: OrderIntent,
    cancel_requested: bool,
}

/// Pending orders in registration order. Registration order keeps backtests
/// deterministic.
#[derive(Default)]
struct PendingBook {
    orders: Vec<(Uuid, PendingOrder)>,
}

impl PendingBook {
    fn remove(&mut self, order_id: Uuid) -> Option<PendingOrder> {
        let idx = self.orders.iter().position(|(id, _)| *id == order_id)?;
        Some(self.orders.remove(idx).1)
    }
}

/// The engine-facing half of the simulator: a `MarketClient` that records
/// orders into the shared pending book.
pub struct SimulatedMarket {
    book: Arc<Mutex<PendingBook>>,
}

impl MarketClient for SimulatedMarket {
    fn name(&self) -> &str {
        "SIM"
    }

    fn place_order(&mut self, order_id: Uuid, intent: &OrderIntent) -> Result<(), MarketRejection> {
        let mut book = lock(&self.book);
        book.orders.push((
            order_id,
            PendingOrder {
                intent: intent.clone(),
                cancel_requested: false,
            },
        ));
        debug!(
            "Sim registered order {}: {:?} {:.3} MWh @ {:.2} EUR/MWh",
            order_id, intent.side, intent.volume_mwh, intent.limit_price_eur_mwh
        );
        Ok(())
    }

    fn cancel_order(&mut self, order_id: Uuid) -> bool {
        let mut book = lock(&self.book);
        match book.orders.iter_mut().find(|(id, _)| *id == order_id) {
            Some((_, pending)) => {
                // Request only. The CANCELLED status is confirmed on the
                // next check_fills pass, through the normal update path.
                pending.cancel_requested = true;
                true
            }
            None => false,
        }
    }
}

/// Matches pending orders against a historical price series and drives the
/// execution engine's status updates from the sequential backtest loop.
/// Stands in for a live market feed; the engine cannot tell the difference.
pub struct FillSimulator {
    book: Arc<Mutex<PendingBook>>,
}

impl Default for FillSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl FillSimulator {
    pub fn new() -> Self {
        Self {
            book: Arc::new(Mutex::new(PendingBook::default())),
        }
    }

    /// The `MarketClient` half to hand to the engine at construction time.
    pub fn market_client(&self) -> SimulatedMarket {
        SimulatedMarket {
            book: Arc::clone(&self.book),
        }
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.book).orders.len()
    }

    /// Delivers confirmed cancellations, then matches every pending order
    /// whose delivery window has begun against the price observation for its
    /// delivery slot. BUY fills at `observed <= limit`, SELL at
    /// `observed >= limit`, full volume only. A missing price slot leaves
    /// the order pending until expiry; it never silently fills.
    ///
    /// Returns the ids of orders filled on this pass.
    pub fn check_fills(
        &self,
        engine: &mut Engine,
        prices: &HistoricalPriceSeries,
        current_time: NaiveDateTime,
    ) -> Vec<Uuid> {
        let cancels: Vec<Uuid> = {
            let mut book = lock(&self.book);
            let ids: Vec<Uuid> = book
                .orders
                .iter()
                .filter(|(_, p)| p.cancel_requested)
                .map(|(id, _)| *id)
                .collect();
            book.orders.retain(|(_, p)| !p.cancel_requested);
            ids
        };
        for order_id in cancels {
            info!("Order {} cancellation confirmed", order_id);
            if let Err(e) = engine.update_status(order_id, OrderStatus::Cancelled, None) {
                warn!("Cancel delivery for order {} rejected: {}", order_id, e);
            }
        }

        let candidates: Vec<(Uuid, OrderIntent)> = lock(&self.book)
            .orders
            .iter()
            .filter(|(_, p)| p.intent.delivery_start <= current_time)
            .map(|(id, p)| (*id, p.intent.clone()))
            .collect();

        let mut filled = Vec::new();
        for (order_id, intent) in candidates {
            // Settle against the order's own slot key, never the rolled
            // wall-clock timestamp (hour index 24 starts on the next date).
            let slot = intent.delivery_slot;
            let observed = match prices.slot_price(slot.date, slot.hour) {
                Some(p) => p,
                None => {
                    debug!(
                        "No price observation for order {} slot {} H{}",
                        order_id, slot.date, slot.hour
                    );
                    continue;
                }
            };

            let fills = match intent.side {
                Side::Buy => observed <= intent.limit_price_eur_mwh,
                Side::Sell => observed >= intent.limit_price_eur_mwh,
            };
            if !fills {
                continue;
            }

            info!(
                "Order {} fills: {:?} {:.3} MWh, observed {:.2} vs limit {:.2}",
                order_id, intent.side, intent.volume_mwh, observed, intent.limit_price_eur_mwh
            );
            lock(&self.book).remove(order_id);
            if let Err(e) =
                engine.update_status(order_id, OrderStatus::Filled, Some(intent.volume_mwh))
            {
                warn!("Fill delivery for order {} rejected: {}", order_id, e);
            } else {
                filled.push(order_id);
            }
        }
        filled
    }

    /// Expires pending orders whose delivery window ended more than
    /// `expiry_window` before `current_time`. Expiry is this driver's
    /// timeout policy, not a property of the state machine.
    pub fn expire(
        &self,
        engine: &mut Engine,
        current_time: NaiveDateTime,
        expiry_window: Duration,
    ) -> Vec<Uuid> {
        let stale: Vec<Uuid> = {
            let mut book = lock(&self.book);
            let ids: Vec<Uuid> = book
                .orders
                .iter()
                .filter(|(_, p)| p.intent.delivery_end + expiry_window < current_time)
                .map(|(id, _)| *id)
                .collect();
            book.orders
                .retain(|(_, p)| p.intent.delivery_end + expiry_window >= current_time);
            ids
        };

        let mut expired = Vec::new();
        for order_id in stale {
            info!("Order {} expired", order_id);
            if let Err(e) = engine.update_status(order_id, OrderStatus::Expired, None) {
                warn!("Expiry delivery for order {} rejected: {}", order_id, e);
            } else {
                expired.push(order_id);
            }
        }
        expired
    }

    /// Explicit cancellation of one pending order, bypassing the
    /// request/confirm round trip. Returns false if the order is unknown.
    pub fn cancel(&self, engine: &mut Engine, order_id: Uuid) -> bool {
        if lock(&self.book).remove(order_id).is_none() {
            return false;
        }
        if let Err(e) = engine.update_status(order_id, OrderStatus::Cancelled, None) {
            warn!("Cancel delivery for order {} rejected: {}", order_id, e);
        }
        true
    }
}

fn lock(book: &Arc<Mutex<PendingBook>>) -> MutexGuard<'_, PendingBook> {
    book.lock().unwrap_or_else(|e| e.into_inner())
}
