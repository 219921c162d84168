//! Fraud screening for return requests.
//!
//! Factors are independent and equally weighted: the score is the number of
//! triggered factors, and a request is high risk once the score reaches the
//! tenant's auto-flag threshold. The assessor only computes; flagging the
//! record is the workflow's job.

mod factors;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Order, ReturnLineItem, ReturnStatus};
use super::eligibility::markers::normalize;
use super::policy::TenantPolicy;

pub(crate) const HIGH_RETURN_RATE_PERCENT: f64 = 50.0;
pub(crate) const LARGE_RETURN_AMOUNT: f64 = 500.0;
pub(crate) const HIGH_VALUE_ITEM_PRICE: f64 = 300.0;
pub(crate) const NEW_ACCOUNT_DAYS: i64 = 30;
pub(crate) const EXTENDED_RETURN_DAYS: i64 = 60;

const RETURN_TAGS: &[&str] = &["return", "returned", "has-return"];
const RETURN_REQUEST_TAG_PREFIX: &str = "return-requested-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskFactor {
    #[serde(rename = "Frequent Returns")]
    FrequentReturns,
    #[serde(rename = "High Return Rate")]
    HighReturnRate,
    #[serde(rename = "High Value Return")]
    HighValueReturn,
    #[serde(rename = "Large Return Amount")]
    LargeReturnAmount,
    #[serde(rename = "Address Mismatch")]
    AddressMismatch,
    #[serde(rename = "Name Mismatch")]
    NameMismatch,
    #[serde(rename = "New Account")]
    NewAccount,
    #[serde(rename = "Extended Return Window")]
    ExtendedReturnWindow,
    #[serde(rename = "Risky Items")]
    RiskyItems,
}

impl RiskFactor {
    pub const fn label(self) -> &'static str {
        match self {
            RiskFactor::FrequentReturns => "Frequent Returns",
            RiskFactor::HighReturnRate => "High Return Rate",
            RiskFactor::HighValueReturn => "High Value Return",
            RiskFactor::LargeReturnAmount => "Large Return Amount",
            RiskFactor::AddressMismatch => "Address Mismatch",
            RiskFactor::NameMismatch => "Name Mismatch",
            RiskFactor::NewAccount => "New Account",
            RiskFactor::ExtendedReturnWindow => "Extended Return Window",
            RiskFactor::RiskyItems => "Risky Items",
        }
    }
}

/// Derived assessment; computed fresh for every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_factors: Vec<RiskFactor>,
    pub risk_details: BTreeMap<String, String>,
    pub risk_score: u32,
    pub is_high_risk: bool,
    /// Set when the screening could not run and the score defaulted to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl RiskAssessment {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn has(&self, factor: RiskFactor) -> bool {
        self.risk_factors.contains(&factor)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.risk_factors.iter().map(|factor| factor.label()).collect()
    }

    fn push(&mut self, factor: RiskFactor, detail: String) {
        if self.has(factor) {
            return;
        }
        self.risk_factors.push(factor);
        self.risk_details.insert(factor.label().to_string(), detail);
    }
}

/// Prior orders for the same customer, fetched by email or customer id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerHistory {
    pub orders: Vec<Order>,
}

impl CustomerHistory {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    fn prior<'a>(&'a self, current: &'a Order) -> impl Iterator<Item = &'a Order> + 'a {
        self.orders.iter().filter(move |order| order.id != current.id)
    }

    pub fn order_count(&self, current: &Order) -> usize {
        self.prior(current).count()
    }

    /// Prior orders carrying a refund or a return tag.
    pub fn return_count(&self, current: &Order) -> usize {
        self.prior(current)
            .filter(|order| {
                !order.refunds.is_empty() || order.tags.iter().any(|tag| is_return_tag(tag))
            })
            .count()
    }
}

/// Tags the portal writes (`return-requested-<line>`, `return-<status>`) plus plain markers.
pub(crate) fn is_return_tag(tag: &str) -> bool {
    let tag = normalize(tag);
    if RETURN_TAGS.contains(&tag.as_str()) || tag.starts_with(RETURN_REQUEST_TAG_PREFIX) {
        return true;
    }
    tag.strip_prefix("return-")
        .and_then(ReturnStatus::parse)
        .is_some()
}

/// Screen a return request. `items` are the lines being returned or exchanged.
pub fn assess_fraud_risk(
    order: &Order,
    items: &[ReturnLineItem],
    history: &CustomerHistory,
    policy: &TenantPolicy,
    now: DateTime<Utc>,
) -> RiskAssessment {
    let settings = &policy.fraud_prevention;
    if !settings.enabled {
        return RiskAssessment::clear();
    }

    let patterns = settings.patterns;
    let mut assessment = RiskAssessment::default();

    if patterns.frequent_returns {
        let returns = history.return_count(order);
        let orders = history.order_count(order);
        if let Some(detail) = factors::frequent_returns(returns, settings.max_returns_per_customer) {
            assessment.push(RiskFactor::FrequentReturns, detail);
        }
        if let Some(detail) = factors::high_return_rate(returns, orders) {
            assessment.push(RiskFactor::HighReturnRate, detail);
        }
    }

    if patterns.high_value {
        let value = factors::return_value(order, items);
        if let Some(detail) =
            factors::high_value_return(value, order.total_price, settings.max_return_value_percent)
        {
            assessment.push(RiskFactor::HighValueReturn, detail);
        }
        if let Some(detail) = factors::large_return_amount(value) {
            assessment.push(RiskFactor::LargeReturnAmount, detail);
        }
        if let Some(detail) = factors::risky_items(order) {
            assessment.push(RiskFactor::RiskyItems, detail);
        }
    }

    if patterns.address_mismatch {
        if let (Some(shipping), Some(billing)) = (&order.shipping_address, &order.billing_address) {
            if let Some(detail) = factors::address_mismatch(shipping, billing) {
                assessment.push(RiskFactor::AddressMismatch, detail);
            }
            if let Some(detail) = factors::name_mismatch(shipping, billing) {
                assessment.push(RiskFactor::NameMismatch, detail);
            }
        }
    }

    if patterns.new_account {
        let account_created = order.customer.as_ref().and_then(|customer| customer.created_at);
        if let Some(detail) = account_created
            .and_then(|created_at| factors::new_account(created_at, order.created_at))
        {
            assessment.push(RiskFactor::NewAccount, detail);
        }
    }

    if patterns.no_receipt {
        if let Some(detail) = factors::extended_return_window(order.created_at, now) {
            assessment.push(RiskFactor::ExtendedReturnWindow, detail);
        }
    }

    assessment.risk_score = assessment.risk_factors.len() as u32;
    assessment.is_high_risk = assessment.risk_score >= settings.auto_flag_threshold;
    assessment
}
