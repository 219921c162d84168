use chrono::{DateTime, Utc};

use super::super::domain::{LineItem, Order};
use super::super::policy::TenantPolicy;
use super::markers::{item_marker, matching_no_return_tag, ItemMarker};
use super::{whole_days_between, EligibleItem, IneligibilityReason, OrderIneligibility};

pub(super) fn check_order(
    order: &Order,
    policy: &TenantPolicy,
    now: DateTime<Utc>,
) -> Result<(), OrderIneligibility> {
    if !order.financial_status.allows_returns() {
        return Err(OrderIneligibility::InvalidFinancialStatus {
            status: order.financial_status,
        });
    }

    if order.is_cancelled() {
        return Err(OrderIneligibility::Cancelled);
    }

    if let Some(tag) = matching_no_return_tag(&order.tags, &policy.no_return_tags) {
        return Err(OrderIneligibility::FinalSale {
            tag: tag.to_string(),
        });
    }

    let days_since_order = whole_days_between(order.created_at, now);
    if days_since_order > i64::from(policy.return_window_days) {
        return Err(OrderIneligibility::WindowExpired {
            days_since_order,
            window_days: policy.return_window_days,
        });
    }

    Ok(())
}

pub(super) fn check_item(
    order: &Order,
    item: &LineItem,
    policy: &TenantPolicy,
    now: DateTime<Utc>,
) -> Result<EligibleItem, IneligibilityReason> {
    let refunded = order.refunded_quantity(&item.id);
    if refunded >= item.quantity {
        return Err(IneligibilityReason::AlreadyRefunded {
            purchased: item.quantity,
            refunded,
        });
    }

    if !item.is_fulfilled() {
        return Err(IneligibilityReason::NotFulfilled);
    }

    // Fulfillments can postdate the order; measure from the shipment that carried the item.
    let fulfilled_at = order.fulfilled_at(&item.id).unwrap_or(order.created_at);
    let days_since_fulfillment = whole_days_between(fulfilled_at, now);
    if days_since_fulfillment > i64::from(policy.return_window_days) {
        return Err(IneligibilityReason::WindowExpired {
            days_since_fulfillment,
            window_days: policy.return_window_days,
        });
    }

    match item_marker(item) {
        Some(ItemMarker::FinalSale) => return Err(IneligibilityReason::FinalSale),
        Some(ItemMarker::Personalized) => return Err(IneligibilityReason::Personalized),
        Some(ItemMarker::Gift) => return Err(IneligibilityReason::Gift),
        None => {}
    }

    Ok(EligibleItem {
        line_item_id: item.id.clone(),
        title: item.title.clone(),
        variant_title: item.variant_title.clone(),
        unit_price: item.price,
        purchased_quantity: item.quantity,
        refunded_quantity: refunded,
        returnable_quantity: item.quantity - refunded,
        days_since_fulfillment,
    })
}
