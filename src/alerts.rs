//! One-shot price alerts with crossing detection
//!
//! Alerts are ephemeral, in-memory state grouped per pool. An alert fires
//! at most once: crossing detection removes it from the active set in the
//! same operation that reports it.

use crate::notify::MessageRef;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;

/// A registered one-shot price target.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub target_price: Decimal,
    /// Opaque destination the originating command came from.
    pub chat_key: String,
    /// Message to edit when the alert fires, when the transport gave one.
    pub message: Option<MessageRef>,
    pub triggered: bool,
}

impl PriceAlert {
    pub fn new(target_price: Decimal, chat_key: &str, message: Option<MessageRef>) -> Self {
        Self {
            target_price,
            chat_key: chat_key.to_string(),
            message,
            triggered: false,
        }
    }
}

/// Per-pool registry of active alerts.
pub struct AlertRegistry {
    alerts: RwLock<HashMap<String, Vec<PriceAlert>>>,
}

impl AlertRegistry {
    pub fn new() -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, pool_id: &str, alert: PriceAlert) {
        let mut alerts = self.alerts.write().unwrap();
        alerts.entry(pool_id.to_string()).or_default().push(alert);
    }

    pub fn list(&self, pool_id: &str) -> Vec<PriceAlert> {
        let alerts = self.alerts.read().unwrap();
        alerts.get(pool_id).cloned().unwrap_or_default()
    }

    pub fn active_count(&self, pool_id: &str) -> usize {
        let alerts = self.alerts.read().unwrap();
        alerts.get(pool_id).map(Vec::len).unwrap_or(0)
    }

    /// Drop every alert a chat registered on a pool; returns how many.
    pub fn remove_for_chat(&self, pool_id: &str, chat_key: &str) -> usize {
        let mut alerts = self.alerts.write().unwrap();
        let Some(pool_alerts) = alerts.get_mut(pool_id) else {
            return 0;
        };
        let before = pool_alerts.len();
        pool_alerts.retain(|alert| alert.chat_key != chat_key);
        before - pool_alerts.len()
    }

    /// Evaluate one price step and remove the alerts it triggers.
    ///
    /// A missing previous price means the pool has not produced an
    /// observation since the alert was registered; the new price only
    /// seeds the baseline and nothing can fire. Multiple alerts at the
    /// same target are independent and co-trigger on the same crossing.
    pub fn check_crossings(
        &self,
        pool_id: &str,
        previous: Option<Decimal>,
        current: Decimal,
    ) -> Vec<PriceAlert> {
        let Some(previous) = previous else {
            return Vec::new();
        };

        let mut alerts = self.alerts.write().unwrap();
        let Some(pool_alerts) = alerts.get_mut(pool_id) else {
            return Vec::new();
        };

        let mut fired = Vec::new();
        pool_alerts.retain(|alert| {
            if crossed(previous, current, alert.target_price) {
                let mut alert = alert.clone();
                alert.triggered = true;
                fired.push(alert);
                false
            } else {
                true
            }
        });
        if pool_alerts.is_empty() {
            alerts.remove(pool_id);
        }
        fired
    }
}

impl Default for AlertRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Crossed upward (`previous < target <= current`) or downward
/// (`previous > target >= current`).
fn crossed(previous: Decimal, current: Decimal, target: Decimal) -> bool {
    (previous < target && target <= current) || (previous > target && target >= current)
}
