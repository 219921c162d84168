use super::common::*;
use chrono::Duration;

use crate::workflows::returns::domain::{FinancialStatus, Refund, RefundLineItem};
use crate::workflows::returns::eligibility::{
    evaluate_eligibility, IneligibilityReason, OrderIneligibility,
};
use crate::workflows::returns::policy::{FraudPreventionSettings, TenantPolicy};
use crate::workflows::returns::risk::{assess_fraud_risk, CustomerHistory};

#[test]
fn recent_fulfilled_item_is_eligible_with_no_risk() {
    let now = fixed_now();
    let order = order_at(
        "o-1",
        "#1001",
        now,
        10,
        vec![line("a", 50.0, 1), line("b", 50.0, 1)],
    );
    let policy = TenantPolicy::default();

    let report = evaluate_eligibility(&order, &policy, now);

    assert!(report.order_level_eligible);
    let item = report.eligible("a").expect("item a eligible");
    assert_eq!(item.days_since_fulfillment, 9);
    assert_eq!(item.returnable_quantity, 1);

    let risk = assess_fraud_risk(
        &order,
        &[return_line("a", 1)],
        &CustomerHistory::default(),
        &policy,
        now,
    );
    assert_eq!(risk.risk_score, 0);
    assert!(!risk.is_high_risk);
}

#[test]
fn expired_order_reports_age_and_window() {
    let now = fixed_now();
    let order = order_at("o-2", "#1002", now, 95, vec![line("a", 50.0, 1)]);

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);

    assert!(!report.order_level_eligible);
    let reason = report.order_level_reason.expect("reason present").summary();
    assert!(reason.contains("95"), "{reason}");
    assert!(reason.contains("30"), "{reason}");
    assert!(report.eligible_items.is_empty());
    assert_eq!(report.ineligible_items.len(), 1);
}

#[test]
fn window_boundary_is_inclusive() {
    let now = fixed_now();
    let mut order = order_at("o-3", "#1003", now, 30, vec![line("a", 50.0, 1)]);
    order.fulfillments[0].created_at = order.created_at;

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);
    assert!(report.order_level_eligible);
    assert!(report.eligible("a").is_some());

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now + Duration::days(1));
    assert!(matches!(
        report.order_level_reason,
        Some(OrderIneligibility::WindowExpired {
            days_since_order: 31,
            window_days: 30
        })
    ));
}

#[test]
fn invalid_financial_status_blocks_every_item() {
    let now = fixed_now();
    for status in [
        FinancialStatus::Pending,
        FinancialStatus::Refunded,
        FinancialStatus::Voided,
        FinancialStatus::Unknown,
    ] {
        let mut order = order_at("o-4", "#1004", now, 3, vec![line("a", 20.0, 1), line("b", 5.0, 2)]);
        order.financial_status = status;

        let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);

        assert!(!report.order_level_eligible);
        assert!(report.eligible_items.is_empty());
        assert_eq!(report.ineligible_items.len(), 2);
        assert!(report.ineligible_items.iter().all(|item| matches!(
            item.reason,
            IneligibilityReason::Order(OrderIneligibility::InvalidFinancialStatus { .. })
        )));
    }
}

#[test]
fn cancelled_orders_are_not_returnable() {
    let now = fixed_now();
    let mut order = order_at("o-5", "#1005", now, 3, vec![line("a", 20.0, 1)]);
    order.cancelled_at = Some(now - Duration::days(1));

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);
    assert_eq!(report.order_level_reason, Some(OrderIneligibility::Cancelled));
}

#[test]
fn localized_and_tenant_tags_mark_final_sale() {
    let now = fixed_now();
    let mut order = order_at("o-6", "#1006", now, 3, vec![line("a", 20.0, 1)]);
    order.tags = vec!["VIP".to_string(), "Venta Final".to_string()];

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);
    assert!(matches!(
        report.order_level_reason,
        Some(OrderIneligibility::FinalSale { ref tag }) if tag == "Venta Final"
    ));

    order.tags = vec!["clearance".to_string()];
    assert!(evaluate_eligibility(&order, &TenantPolicy::default(), now).order_level_eligible);

    let policy = TenantPolicy {
        no_return_tags: vec!["Clearance".to_string()],
        ..TenantPolicy::default()
    };
    assert!(!evaluate_eligibility(&order, &policy, now).order_level_eligible);
}

#[test]
fn item_level_reasons_are_reported_per_line() {
    let now = fixed_now();
    let mut order = order_at(
        "o-7",
        "#1007",
        now,
        5,
        vec![
            line("ok", 30.0, 1),
            line("refunded", 30.0, 2),
            unfulfilled(line("pending", 30.0, 1)),
            with_property(line("final", 30.0, 1), "_final_sale", "true"),
            with_property(line("engraved", 30.0, 1), "Engraving", "C.L."),
            with_property(line("gift", 30.0, 1), "gift", "yes"),
        ],
    );
    order.refunds.push(Refund {
        id: "r-1".to_string(),
        created_at: now - Duration::days(1),
        note: None,
        refund_line_items: vec![RefundLineItem {
            line_item_id: "refunded".to_string(),
            quantity: 2,
            subtotal: 60.0,
        }],
        transactions: Vec::new(),
    });

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);

    assert!(report.order_level_eligible);
    assert_eq!(report.eligible_items.len(), 1);
    assert!(report.eligible("ok").is_some());

    let reason = |id: &str| report.ineligible(id).expect("ineligible").reason.clone();
    assert_eq!(
        reason("refunded"),
        IneligibilityReason::AlreadyRefunded {
            purchased: 2,
            refunded: 2
        }
    );
    assert_eq!(reason("pending"), IneligibilityReason::NotFulfilled);
    assert_eq!(reason("final"), IneligibilityReason::FinalSale);
    assert_eq!(reason("engraved"), IneligibilityReason::Personalized);
    assert_eq!(reason("gift"), IneligibilityReason::Gift);
    assert_eq!(
        reason("refunded").summary(),
        "already fully refunded (2 of 2)"
    );
}

#[test]
fn partially_refunded_lines_keep_the_remaining_quantity() {
    let now = fixed_now();
    let mut order = order_at("o-8", "#1008", now, 5, vec![line("a", 10.0, 3)]);
    order.financial_status = FinancialStatus::PartiallyRefunded;
    order.refunds.push(Refund {
        id: "r-2".to_string(),
        created_at: now - Duration::days(1),
        note: None,
        refund_line_items: vec![RefundLineItem {
            line_item_id: "a".to_string(),
            quantity: 1,
            subtotal: 10.0,
        }],
        transactions: Vec::new(),
    });

    let report = evaluate_eligibility(&order, &TenantPolicy::default(), now);
    let item = report.eligible("a").expect("still eligible");
    assert_eq!(item.refunded_quantity, 1);
    assert_eq!(item.returnable_quantity, 2);
}

#[test]
fn late_fulfillment_restarts_the_item_window() {
    let now = fixed_now();
    let mut order = order_at("o-9", "#1009", now, 25, vec![line("a", 10.0, 1)]);
    order.fulfillments[0].created_at = now - Duration::days(2);
    let policy = TenantPolicy {
        return_window_days: 30,
        fraud_prevention: FraudPreventionSettings::default(),
        ..TenantPolicy::default()
    };

    let report = evaluate_eligibility(&order, &policy, now);
    assert_eq!(report.eligible("a").map(|item| item.days_since_fulfillment), Some(2));
}
