//! Append-only audit trail of significant settlement actions

use chrono::{DateTime, Utc};
use ledger_core::{Actor, TerritoryId};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    /// Seller transaction recorded for a paid checkout
    TransactionCreated,
    /// Seller transaction moved to ReadyForPayout
    TransactionPromoted,
    /// Seller transaction canceled by an operator
    TransactionCanceled,
    /// Payout issued at the gateway
    PayoutCreated,
    /// Payout call failed
    PayoutFailed,
    /// Payout outcome applied locally
    PayoutReconciled,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::TransactionCreated => "transaction_created",
            AuditAction::TransactionPromoted => "transaction_promoted",
            AuditAction::TransactionCanceled => "transaction_canceled",
            AuditAction::PayoutCreated => "payout_created",
            AuditAction::PayoutFailed => "payout_failed",
            AuditAction::PayoutReconciled => "payout_reconciled",
        };
        f.write_str(name)
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Who
    pub actor: Actor,
    /// Territory, when the action is scoped to one
    pub territory_id: Option<TerritoryId>,
    /// What
    pub action: AuditAction,
    /// Entity kind ("seller_transaction", "payout", ...)
    pub entity_type: &'static str,
    /// Entity ID
    pub entity_id: String,
    /// Extra structured detail
    pub details: serde_json::Value,
    /// When
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry stamped now
    pub fn new(
        actor: Actor,
        territory_id: Option<TerritoryId>,
        action: AuditAction,
        entity_type: &'static str,
        entity_id: impl ToString,
        details: serde_json::Value,
    ) -> Self {
        Self {
            actor,
            territory_id,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Sink for audit entries
pub trait AuditLogger: Send + Sync {
    /// Append an entry
    fn log(&self, entry: AuditEntry);
}

/// Writes entries to the `audit` tracing target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn log(&self, entry: AuditEntry) {
        let territory = entry
            .territory_id
            .map(|t| t.to_string())
            .unwrap_or_default();
        tracing::info!(
            target: "audit",
            actor = %entry.actor,
            territory_id = %territory,
            action = %entry.action,
            entity_type = entry.entity_type,
            entity_id = %entry.entity_id,
            details = %entry.details,
            recorded_at = %entry.recorded_at,
            "audit"
        );
    }
}

/// Keeps entries in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLogger {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditLogger {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Entries for one action
    pub fn entries_for(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditLogger for MemoryAuditLogger {
    fn log(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_logger_filters_by_action() {
        let logger = MemoryAuditLogger::new();
        let territory = TerritoryId::new_v4();

        logger.log(AuditEntry::new(
            Actor::System,
            Some(territory),
            AuditAction::TransactionCreated,
            "seller_transaction",
            "tx-1",
            json!({ "net_cents": 9_500 }),
        ));
        logger.log(AuditEntry::new(
            Actor::System,
            Some(territory),
            AuditAction::PayoutCreated,
            "payout",
            "po_1",
            json!({}),
        ));

        assert_eq!(logger.entries().len(), 2);
        let created = logger.entries_for(AuditAction::PayoutCreated);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].entity_id, "po_1");
    }

    #[test]
    fn test_entry_serializes() {
        let entry = AuditEntry::new(
            Actor::System,
            None,
            AuditAction::PayoutReconciled,
            "payout",
            "po_2",
            json!({ "status": "Completed" }),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["action"], "PayoutReconciled");
        assert_eq!(value["entity_id"], "po_2");
    }
}
