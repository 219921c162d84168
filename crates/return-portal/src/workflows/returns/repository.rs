use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{CustomerSnapshot, ReturnId, ReturnItem, ReturnStatus, TenantId};
use super::risk::RiskAssessment;
use super::workflow::{HistoryEntry, RejectionReason};

/// Persisted return/exchange record. Never deleted; terminal records stay for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: ReturnId,
    pub tenant_id: TenantId,
    pub order_id: String,
    pub order_number: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<ReturnItem>,
    pub status: ReturnStatus,
    /// Append-only operator notes, one timestamped entry per line.
    pub admin_notes: String,
    #[serde(default)]
    pub customer_note: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub rejection: Option<RejectionReason>,
    /// Screening result captured at submission.
    pub risk: RiskAssessment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_changed_at: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub settlement: Option<SettlementIntent>,
}

impl ReturnRecord {
    pub fn total_value(&self) -> f64 {
        self.items.iter().map(ReturnItem::value).sum()
    }

    pub fn summary_view(&self) -> ReturnSummaryView {
        ReturnSummaryView {
            id: self.id.clone(),
            order_number: self.order_number.clone(),
            customer_email: self.customer.email.clone(),
            status: self.status.label(),
            item_count: self.items.len(),
            total_value: self.total_value(),
            risk_score: self.risk.risk_score,
            is_high_risk: self.risk.is_high_risk,
            created_at: self.created_at,
        }
    }
}

/// Refund/exchange intent written before any remote settlement call.
///
/// The idempotency key is reused on every retry so the remote side can deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementIntent {
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub refund_id: Option<String>,
    /// Draft created for the exchange, stored before it is completed.
    #[serde(default)]
    pub exchange_draft_id: Option<String>,
    #[serde(default)]
    pub exchange_order_id: Option<String>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

impl SettlementIntent {
    pub fn new(record_id: &ReturnId, now: DateTime<Utc>) -> Self {
        Self {
            idempotency_key: format!("{}-settlement", record_id.0),
            created_at: now,
            attempts: 0,
            last_error: None,
            refund_id: None,
            exchange_draft_id: None,
            exchange_order_id: None,
            settled_at: None,
        }
    }

    pub fn refund_key(&self) -> String {
        format!("{}-refund", self.idempotency_key)
    }

    pub fn exchange_key(&self) -> String {
        format!("{}-exchange", self.idempotency_key)
    }
}

/// Storage abstraction so the service can be exercised in isolation.
pub trait ReturnRepository: Send + Sync {
    fn insert(&self, record: ReturnRecord) -> Result<ReturnRecord, RepositoryError>;
    fn update(&self, record: ReturnRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ReturnId) -> Result<Option<ReturnRecord>, RepositoryError>;
    /// Records newest first, optionally filtered by status.
    fn list(&self, status: Option<ReturnStatus>) -> Result<Vec<ReturnRecord>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Compact listing row for the admin queue.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnSummaryView {
    pub id: ReturnId,
    pub order_number: String,
    pub customer_email: String,
    pub status: &'static str,
    pub item_count: usize,
    pub total_value: f64,
    pub risk_score: u32,
    pub is_high_risk: bool,
    pub created_at: DateTime<Utc>,
}
