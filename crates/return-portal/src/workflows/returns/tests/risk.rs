use super::common::*;
use chrono::Duration;

use crate::workflows::returns::domain::Order;
use crate::workflows::returns::policy::{FraudPatternToggles, TenantPolicy};
use crate::workflows::returns::risk::{assess_fraud_risk, CustomerHistory, RiskFactor};

fn history_with_returns(count: usize, clean: usize) -> CustomerHistory {
    let mut orders: Vec<Order> = (0..count)
        .map(|index| returned_order(&format!("h-{index}")))
        .collect();
    orders.extend((0..clean).map(|index| {
        order_at(
            &format!("c-{index}"),
            "#900",
            fixed_now(),
            200,
            vec![line("x", 10.0, 1)],
        )
    }));
    CustomerHistory::new(orders)
}

fn small_order() -> Order {
    order_at(
        "o-1",
        "#2001",
        fixed_now(),
        5,
        vec![line("a", 40.0, 1), line("b", 60.0, 1)],
    )
}

#[test]
fn frequent_returner_alone_stays_below_threshold() {
    let order = small_order();
    let policy = TenantPolicy::default();

    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &history_with_returns(4, 6),
        &policy,
        fixed_now(),
    );

    assert!(risk.has(RiskFactor::FrequentReturns));
    assert_eq!(risk.risk_score, 1);
    assert!(!risk.is_high_risk);
}

#[test]
fn second_factor_crosses_the_threshold() {
    let mut order = small_order();
    if let Some(billing) = order.billing_address.as_mut() {
        billing.zip = Some("10001".to_string());
        billing.city = Some("New York".to_string());
    }

    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &history_with_returns(4, 6),
        &TenantPolicy::default(),
        fixed_now(),
    );

    assert!(risk.has(RiskFactor::FrequentReturns));
    assert!(risk.has(RiskFactor::AddressMismatch));
    assert_eq!(risk.risk_score, 2);
    assert!(risk.is_high_risk);
    assert!(risk.risk_details["Address Mismatch"].contains("city"));
}

#[test]
fn return_rate_uses_prior_orders_only() {
    let order = small_order();
    let mut history = history_with_returns(2, 1);
    history.orders.push(order.clone());

    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &history,
        &TenantPolicy::default(),
        fixed_now(),
    );

    assert!(risk.has(RiskFactor::HighReturnRate));
    assert!(!risk.has(RiskFactor::FrequentReturns));
}

#[test]
fn value_percent_threshold_is_strict() {
    let order = order_at(
        "o-2",
        "#2002",
        fixed_now(),
        5,
        vec![line("big", 85.0, 1), line("rest", 15.0, 1)],
    );
    let policy = TenantPolicy::default();

    let high = assess_fraud_risk(
        &order,
        &[return_line("big", 1)],
        &CustomerHistory::default(),
        &policy,
        fixed_now(),
    );
    assert!(high.has(RiskFactor::HighValueReturn));

    let lower = order_at(
        "o-3",
        "#2003",
        fixed_now(),
        5,
        vec![line("big", 79.9, 1), line("rest", 20.1, 1)],
    );
    let low = assess_fraud_risk(
        &lower,
        &[return_line("big", 1)],
        &CustomerHistory::default(),
        &policy,
        fixed_now(),
    );
    assert!(!low.has(RiskFactor::HighValueReturn));
}

#[test]
fn expensive_and_marked_items_raise_flags() {
    let order = order_at(
        "o-4",
        "#2004",
        fixed_now(),
        5,
        vec![line("coat", 320.0, 2), line("scarf", 40.0, 1)],
    );

    let risk = assess_fraud_risk(
        &order,
        &[return_line("coat", 2)],
        &CustomerHistory::default(),
        &TenantPolicy::default(),
        fixed_now(),
    );

    assert!(risk.has(RiskFactor::LargeReturnAmount));
    assert!(risk.has(RiskFactor::RiskyItems));
    assert!(risk.has(RiskFactor::HighValueReturn));
    assert_eq!(risk.risk_score, 3);
    assert_eq!(
        risk.labels(),
        vec!["High Value Return", "Large Return Amount", "Risky Items"]
    );
}

#[test]
fn new_accounts_and_stale_orders_are_flagged() {
    let mut order = small_order();
    order.created_at = fixed_now() - Duration::days(61);
    if let Some(customer) = order.customer.as_mut() {
        customer.created_at = Some(order.created_at - Duration::days(3));
    }

    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &CustomerHistory::default(),
        &TenantPolicy::default(),
        fixed_now(),
    );

    assert!(risk.has(RiskFactor::NewAccount));
    assert!(risk.has(RiskFactor::ExtendedReturnWindow));
    assert!(risk.is_high_risk);
}

#[test]
fn disabled_patterns_and_screening_contribute_nothing() {
    let mut order = small_order();
    if let Some(billing) = order.billing_address.as_mut() {
        billing.first_name = Some("Jordan".to_string());
        billing.country = Some("CA".to_string());
    }

    let mut policy = TenantPolicy::default();
    policy.fraud_prevention.patterns = FraudPatternToggles {
        address_mismatch: false,
        ..FraudPatternToggles::default()
    };
    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &CustomerHistory::default(),
        &policy,
        fixed_now(),
    );
    assert!(!risk.has(RiskFactor::AddressMismatch));
    assert!(!risk.has(RiskFactor::NameMismatch));

    policy.fraud_prevention.enabled = false;
    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &history_with_returns(5, 0),
        &policy,
        fixed_now(),
    );
    assert_eq!(risk.risk_score, 0);
    assert!(risk.risk_factors.is_empty());
}

#[test]
fn marked_lines_count_even_when_they_stay_with_the_customer() {
    let order = order_at(
        "o-5",
        "#2005",
        fixed_now(),
        5,
        vec![
            line("plain", 40.0, 1),
            with_property(line("final", 40.0, 1), "_final_sale", "true"),
        ],
    );

    let risk = assess_fraud_risk(
        &order,
        &[return_line("plain", 1)],
        &CustomerHistory::default(),
        &TenantPolicy::default(),
        fixed_now(),
    );

    assert_eq!(risk.risk_factors, vec![RiskFactor::RiskyItems]);
    assert!(risk.risk_details["Risky Items"].starts_with("1 order item"));
}

#[test]
fn only_return_tags_mark_past_orders_as_returned() {
    let tagged = |id: &str, tags: &[&str]| {
        let mut order = order_at(id, "#901", fixed_now(), 200, vec![line("x", 10.0, 1)]);
        order.tags = tags.iter().map(|tag| tag.to_string()).collect();
        order
    };
    let mut orders: Vec<Order> = (0..3)
        .map(|index| tagged(&format!("t-{index}"), &["returning-customer", "Returned Gift Card"]))
        .collect();
    let current = small_order();

    let history = CustomerHistory::new(orders.clone());
    assert_eq!(history.return_count(&current), 0);
    let risk = assess_fraud_risk(
        &current,
        &[return_line("a", 1)],
        &history,
        &TenantPolicy::default(),
        fixed_now(),
    );
    assert!(!risk.has(RiskFactor::FrequentReturns));
    assert!(!risk.has(RiskFactor::HighReturnRate));

    orders.push(tagged("t-requested", &["return-requested-x"]));
    orders.push(tagged("t-approved", &["Return Approved"]));
    orders.push(tagged("t-plain", &["returned"]));
    assert_eq!(CustomerHistory::new(orders).return_count(&current), 3);
}
