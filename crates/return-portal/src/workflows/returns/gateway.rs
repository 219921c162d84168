//! Contract for the external commerce platform.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::domain::Order;

/// Identifies a customer when pulling order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub customer_id: Option<String>,
    pub email: Option<String>,
}

impl CustomerRef {
    pub fn from_order(order: &Order) -> Self {
        Self {
            customer_id: order.customer.as_ref().map(|customer| customer.id.clone()),
            email: order.contact_email().map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    pub id: String,
    pub title: String,
    pub price: f64,
    pub available_quantity: i64,
}

impl VariantSnapshot {
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.available_quantity >= i64::from(quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub order_id: String,
    pub line_item_id: String,
    pub quantity: u32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReturn {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundLine {
    pub line_item_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub order_id: String,
    pub lines: Vec<RefundLine>,
    pub idempotency_key: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeLine {
    pub variant_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOrderRequest {
    pub original_order_id: String,
    pub email: String,
    pub lines: Vec<ExchangeLine>,
    pub idempotency_key: String,
    pub note: String,
}

/// Draft order holding replacement variants; `order_id` is set once it has been completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDraft {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReceipt {
    pub draft_order_id: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Remote operations the return engine depends on.
///
/// Implementations own transport concerns; callers wrap every call in [`bounded`].
pub trait CommerceGateway: Send + Sync {
    fn find_order(
        &self,
        order_number: &str,
    ) -> impl Future<Output = Result<Option<Order>, GatewayError>> + Send;

    fn order(&self, order_id: &str)
        -> impl Future<Output = Result<Option<Order>, GatewayError>> + Send;

    fn customer_orders(
        &self,
        customer: &CustomerRef,
    ) -> impl Future<Output = Result<Vec<Order>, GatewayError>> + Send;

    fn variant(
        &self,
        variant_id: &str,
    ) -> impl Future<Output = Result<Option<VariantSnapshot>, GatewayError>> + Send;

    fn create_return(
        &self,
        request: &ReturnRequest,
    ) -> impl Future<Output = Result<ExternalReturn, GatewayError>> + Send;

    fn create_refund(
        &self,
        request: &RefundRequest,
    ) -> impl Future<Output = Result<RefundReceipt, GatewayError>> + Send;

    /// Create a draft order for the replacement variants.
    ///
    /// A draft already carrying `request.idempotency_key` is returned instead of a new one.
    fn create_exchange_draft(
        &self,
        request: &ExchangeOrderRequest,
    ) -> impl Future<Output = Result<ExchangeDraft, GatewayError>> + Send;

    /// Turn a draft into a real order. Completing an already completed draft returns its order.
    fn complete_exchange_draft(
        &self,
        draft_id: &str,
    ) -> impl Future<Output = Result<ExchangeReceipt, GatewayError>> + Send;

    fn tag_order(
        &self,
        order_id: &str,
        tags: &[String],
        note: Option<&str>,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("commerce API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed commerce payload: {0}")]
    Malformed(String),
    #[error("commerce API rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Run a gateway call under a deadline; an elapsed deadline is a failure.
pub async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            operation,
            after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
