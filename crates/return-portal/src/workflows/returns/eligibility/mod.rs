//! Return eligibility for an order and each of its line items.
//!
//! Every call site (storefront lookup, submission, admin detail) goes through
//! [`evaluate_eligibility`] so the checks cannot drift apart.

pub(crate) mod markers;
mod rules;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{FinancialStatus, Order};
use super::policy::TenantPolicy;

/// Evaluate an order snapshot against a tenant policy at `now`.
pub fn evaluate_eligibility(
    order: &Order,
    policy: &TenantPolicy,
    now: DateTime<Utc>,
) -> EligibilityReport {
    if let Err(reason) = rules::check_order(order, policy, now) {
        let ineligible_items = order
            .line_items
            .iter()
            .map(|item| IneligibleItem {
                line_item_id: item.id.clone(),
                title: item.title.clone(),
                reason: IneligibilityReason::Order(reason.clone()),
            })
            .collect();

        return EligibilityReport {
            eligible_items: Vec::new(),
            ineligible_items,
            order_level_eligible: false,
            order_level_reason: Some(reason),
        };
    }

    let mut eligible_items = Vec::new();
    let mut ineligible_items = Vec::new();
    for item in &order.line_items {
        match rules::check_item(order, item, policy, now) {
            Ok(eligible) => eligible_items.push(eligible),
            Err(reason) => ineligible_items.push(IneligibleItem {
                line_item_id: item.id.clone(),
                title: item.title.clone(),
                reason,
            }),
        }
    }

    EligibilityReport {
        eligible_items,
        ineligible_items,
        order_level_eligible: true,
        order_level_reason: None,
    }
}

/// Whole-day difference between two instants, floored.
pub(crate) fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(86_400)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible_items: Vec<EligibleItem>,
    pub ineligible_items: Vec<IneligibleItem>,
    pub order_level_eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_level_reason: Option<OrderIneligibility>,
}

impl EligibilityReport {
    pub fn eligible(&self, line_item_id: &str) -> Option<&EligibleItem> {
        self.eligible_items
            .iter()
            .find(|item| item.line_item_id == line_item_id)
    }

    pub fn ineligible(&self, line_item_id: &str) -> Option<&IneligibleItem> {
        self.ineligible_items
            .iter()
            .find(|item| item.line_item_id == line_item_id)
    }

    pub fn has_eligible_items(&self) -> bool {
        !self.eligible_items.is_empty()
    }
}

/// Line item that may be returned, with the quantity still available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleItem {
    pub line_item_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_title: Option<String>,
    pub unit_price: f64,
    pub purchased_quantity: u32,
    pub refunded_quantity: u32,
    pub returnable_quantity: u32,
    pub days_since_fulfillment: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IneligibleItem {
    pub line_item_id: String,
    pub title: String,
    pub reason: IneligibilityReason,
}

/// Order-level failure shared by every line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderIneligibility {
    InvalidFinancialStatus { status: FinancialStatus },
    Cancelled,
    FinalSale { tag: String },
    WindowExpired { days_since_order: i64, window_days: u32 },
}

impl OrderIneligibility {
    pub fn summary(&self) -> String {
        match self {
            OrderIneligibility::InvalidFinancialStatus { status } => format!(
                "order not eligible: invalid financial status ({})",
                status.label()
            ),
            OrderIneligibility::Cancelled => "order cancelled".to_string(),
            OrderIneligibility::FinalSale { tag } => {
                format!("order marked final sale (tag '{tag}')")
            }
            OrderIneligibility::WindowExpired {
                days_since_order,
                window_days,
            } => format!(
                "return window expired: order placed {days_since_order} days ago, window is {window_days} days"
            ),
        }
    }
}

/// Why a specific line item cannot be returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    Order(OrderIneligibility),
    AlreadyRefunded { purchased: u32, refunded: u32 },
    NotFulfilled,
    WindowExpired { days_since_fulfillment: i64, window_days: u32 },
    FinalSale,
    Personalized,
    Gift,
}

impl IneligibilityReason {
    pub fn summary(&self) -> String {
        match self {
            IneligibilityReason::Order(reason) => reason.summary(),
            IneligibilityReason::AlreadyRefunded {
                purchased,
                refunded,
            } => format!("already fully refunded ({refunded} of {purchased})"),
            IneligibilityReason::NotFulfilled => "item not fulfilled".to_string(),
            IneligibilityReason::WindowExpired {
                days_since_fulfillment,
                window_days,
            } => format!(
                "return window expired: fulfilled {days_since_fulfillment} days ago, window is {window_days} days"
            ),
            IneligibilityReason::FinalSale => "item marked final sale".to_string(),
            IneligibilityReason::Personalized => "personalized items cannot be returned".to_string(),
            IneligibilityReason::Gift => "gift items cannot be returned".to_string(),
        }
    }
}
