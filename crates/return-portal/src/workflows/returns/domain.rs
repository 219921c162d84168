use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for persisted return records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReturnId(pub String);

impl ReturnId {
    /// Time-ordered id that stays unique across restarts and instances.
    pub fn generate() -> Self {
        Self(format!("RET-{}", Uuid::now_v7()))
    }
}

/// Storefront tenant whose policy governs a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub const DEFAULT: &'static str = "default";

    pub fn default_tenant() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

/// Payment state reported by the commerce platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    Pending,
    Authorized,
    Paid,
    PartiallyPaid,
    PartiallyRefunded,
    Refunded,
    Voided,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl FinancialStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FinancialStatus::Pending => "pending",
            FinancialStatus::Authorized => "authorized",
            FinancialStatus::Paid => "paid",
            FinancialStatus::PartiallyPaid => "partially_paid",
            FinancialStatus::PartiallyRefunded => "partially_refunded",
            FinancialStatus::Refunded => "refunded",
            FinancialStatus::Voided => "voided",
            FinancialStatus::Cancelled => "cancelled",
            FinancialStatus::Unknown => "unknown",
        }
    }

    /// Statuses under which money is still held and can be returned.
    pub const fn allows_returns(self) -> bool {
        matches!(
            self,
            FinancialStatus::Paid | FinancialStatus::PartiallyPaid | FinancialStatus::PartiallyRefunded
        )
    }
}

/// Read-only order snapshot fetched from the commerce platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Customer-facing order number, e.g. `#1001`.
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub financial_status: FinancialStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub total_price: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

impl Order {
    pub fn line_item(&self, line_item_id: &str) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == line_item_id)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.is_some() || self.financial_status == FinancialStatus::Cancelled
    }

    /// Units of a line item already refunded across every refund on the order.
    pub fn refunded_quantity(&self, line_item_id: &str) -> u32 {
        self.refunds
            .iter()
            .flat_map(|refund| refund.refund_line_items.iter())
            .filter(|line| line.line_item_id == line_item_id)
            .map(|line| line.quantity)
            .sum()
    }

    pub fn remaining_quantity(&self, line_item: &LineItem) -> u32 {
        line_item
            .quantity
            .saturating_sub(self.refunded_quantity(&line_item.id))
    }

    pub fn is_fully_refunded(&self) -> bool {
        self.financial_status == FinancialStatus::Refunded
            || (!self.line_items.is_empty()
                && self
                    .line_items
                    .iter()
                    .all(|item| self.remaining_quantity(item) == 0))
    }

    /// Shipping date of the most recent fulfillment covering the line item.
    pub fn fulfilled_at(&self, line_item_id: &str) -> Option<DateTime<Utc>> {
        self.fulfillments
            .iter()
            .filter(|fulfillment| fulfillment.line_item_ids.iter().any(|id| id == line_item_id))
            .map(|fulfillment| fulfillment.created_at)
            .max()
    }

    pub fn has_refund_note(&self, marker: &str) -> bool {
        self.refunds.iter().any(|refund| {
            refund
                .note
                .as_deref()
                .map(|note| note.contains(marker))
                .unwrap_or(false)
        })
    }

    /// Case-insensitive match against the order email, falling back to the customer email.
    pub fn matches_email(&self, email: &str) -> bool {
        let candidate = email.trim();
        if candidate.is_empty() {
            return false;
        }

        self.email
            .iter()
            .chain(self.customer.iter().filter_map(|customer| customer.email.as_ref()))
            .any(|known| known.trim().eq_ignore_ascii_case(candidate))
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .or_else(|| self.customer.as_ref().and_then(|c| c.email.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub properties: Vec<LineItemProperty>,
}

impl LineItem {
    pub fn is_fulfilled(&self) -> bool {
        self.fulfillment_status
            .as_deref()
            .map(|status| status.trim().eq_ignore_ascii_case("fulfilled"))
            .unwrap_or(false)
    }
}

/// Free-form key/value attached to a line item at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemProperty {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line_item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub refund_line_items: Vec<RefundLineItem>,
    #[serde(default)]
    pub transactions: Vec<RefundTransaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundLineItem {
    pub line_item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundTransaction {
    pub amount: f64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Return vs exchange choice made per line item by the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnOption {
    Return,
    Exchange,
}

/// Original vs requested attributes for an exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeDetails {
    #[serde(default)]
    pub original_size: Option<String>,
    #[serde(default)]
    pub original_color: Option<String>,
    #[serde(default)]
    pub requested_size: Option<String>,
    #[serde(default)]
    pub requested_color: Option<String>,
}

/// Line item selection as submitted from the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLineItem {
    pub line_item_id: String,
    pub quantity: u32,
    pub option: ReturnOption,
    #[serde(default)]
    pub exchange_variant_id: Option<String>,
    #[serde(default)]
    pub exchange_details: Option<ExchangeDetails>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Inbound return/exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnSubmission {
    pub order_number: String,
    pub email: String,
    pub items: Vec<ReturnLineItem>,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub customer_note: Option<String>,
}

/// Contact details captured on the record at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerSnapshot {
    pub fn from_order(order: &Order, submitted_email: &str) -> Self {
        let customer_name = order.customer.as_ref().map(|customer| {
            [customer.first_name.as_deref(), customer.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });
        let name = customer_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| order.shipping_address.as_ref().map(Address::full_name))
            .unwrap_or_default();
        let phone = order
            .customer
            .as_ref()
            .and_then(|customer| customer.phone.clone())
            .or_else(|| {
                order
                    .shipping_address
                    .as_ref()
                    .and_then(|address| address.phone.clone())
            });

        Self {
            name,
            email: submitted_email.trim().to_ascii_lowercase(),
            phone,
        }
    }
}

/// Workflow state of a return record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Flagged,
}

impl ReturnStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Completed => "completed",
            ReturnStatus::Flagged => "flagged",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ReturnStatus::Rejected | ReturnStatus::Completed)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ReturnStatus::Pending),
            "approved" => Some(ReturnStatus::Approved),
            "rejected" => Some(ReturnStatus::Rejected),
            "completed" => Some(ReturnStatus::Completed),
            "flagged" => Some(ReturnStatus::Flagged),
            _ => None,
        }
    }
}

/// A line item carried on a persisted return record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub line_item_id: String,
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub option: ReturnOption,
    #[serde(default)]
    pub exchange_variant_id: Option<String>,
    #[serde(default)]
    pub exchange_details: Option<ExchangeDetails>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub external_return_id: Option<String>,
}

impl ReturnItem {
    pub fn value(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}
