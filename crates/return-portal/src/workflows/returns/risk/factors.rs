use chrono::{DateTime, Utc};

use super::super::domain::{Address, Order, ReturnLineItem};
use super::super::eligibility::markers::item_marker;
use super::super::eligibility::whole_days_between;
use super::{
    EXTENDED_RETURN_DAYS, HIGH_RETURN_RATE_PERCENT, HIGH_VALUE_ITEM_PRICE, LARGE_RETURN_AMOUNT,
    NEW_ACCOUNT_DAYS,
};

pub(super) fn return_value(order: &Order, items: &[ReturnLineItem]) -> f64 {
    items
        .iter()
        .filter_map(|requested| {
            order
                .line_item(&requested.line_item_id)
                .map(|line| line.price * f64::from(requested.quantity))
        })
        .sum()
}

pub(super) fn frequent_returns(returns: usize, max_returns: u32) -> Option<String> {
    (returns >= max_returns as usize).then(|| {
        format!("customer has {returns} previous returns (limit {max_returns})")
    })
}

pub(super) fn high_return_rate(returns: usize, orders: usize) -> Option<String> {
    if orders == 0 {
        return None;
    }
    let rate = returns as f64 / orders as f64 * 100.0;
    (rate > HIGH_RETURN_RATE_PERCENT)
        .then(|| format!("{rate:.1}% of {orders} previous orders were returned"))
}

pub(super) fn high_value_return(value: f64, order_total: f64, max_percent: f64) -> Option<String> {
    if order_total <= 0.0 {
        return None;
    }
    let percent = value / order_total * 100.0;
    (percent > max_percent).then(|| {
        format!("return is {percent:.1}% of the order total (limit {max_percent:.0}%)")
    })
}

pub(super) fn large_return_amount(value: f64) -> Option<String> {
    (value > LARGE_RETURN_AMOUNT)
        .then(|| format!("return amount {value:.2} exceeds {LARGE_RETURN_AMOUNT:.0}"))
}

fn field(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_lowercase()
}

pub(super) fn address_mismatch(shipping: &Address, billing: &Address) -> Option<String> {
    let fields = [
        ("address", &shipping.address1, &billing.address1),
        ("city", &shipping.city, &billing.city),
        ("zip", &shipping.zip, &billing.zip),
        ("country", &shipping.country, &billing.country),
        ("province", &shipping.province, &billing.province),
    ];

    let differing: Vec<&str> = fields
        .iter()
        .filter(|(_, left, right)| field(left) != field(right))
        .map(|(name, _, _)| *name)
        .collect();

    (!differing.is_empty()).then(|| {
        format!(
            "shipping and billing addresses differ on {}",
            differing.join(", ")
        )
    })
}

pub(super) fn name_mismatch(shipping: &Address, billing: &Address) -> Option<String> {
    let shipping_name = shipping.full_name().to_lowercase();
    let billing_name = billing.full_name().to_lowercase();
    if shipping_name.is_empty() || billing_name.is_empty() || shipping_name == billing_name {
        return None;
    }
    Some(format!(
        "shipping name '{}' differs from billing name '{}'",
        shipping.full_name(),
        billing.full_name()
    ))
}

pub(super) fn new_account(
    account_created: DateTime<Utc>,
    order_created: DateTime<Utc>,
) -> Option<String> {
    let age_days = whole_days_between(account_created, order_created);
    (age_days < NEW_ACCOUNT_DAYS)
        .then(|| format!("account was {age_days} days old when the order was placed"))
}

pub(super) fn extended_return_window(
    order_created: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<String> {
    let days = whole_days_between(order_created, now);
    (days > EXTENDED_RETURN_DAYS).then(|| {
        format!("requested {days} days after purchase (soft limit {EXTENDED_RETURN_DAYS})")
    })
}

/// Counts every line on the order, not only the requested ones.
pub(super) fn risky_items(order: &Order) -> Option<String> {
    let risky = order
        .line_items
        .iter()
        .filter(|line| item_marker(line).is_some() || line.price > HIGH_VALUE_ITEM_PRICE)
        .count();

    (risky > 0).then(|| {
        format!("{risky} order item(s) are final sale, customized, gift, or priced above {HIGH_VALUE_ITEM_PRICE:.0}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_value_percent_boundary() {
        assert!(high_value_return(850.0, 1000.0, 80.0).is_some());
        assert!(high_value_return(799.0, 1000.0, 80.0).is_none());
        assert!(high_value_return(800.0, 1000.0, 80.0).is_none());
        assert!(high_value_return(10.0, 0.0, 80.0).is_none());
    }

    #[test]
    fn return_rate_needs_history() {
        assert!(high_return_rate(0, 0).is_none());
        assert!(high_return_rate(5, 10).is_none());
        assert!(high_return_rate(6, 10).is_some());
    }

    #[test]
    fn address_comparison_ignores_case_and_whitespace() {
        let shipping = Address {
            address1: Some("12 Main St".to_string()),
            city: Some("Des Moines".to_string()),
            zip: Some("50309".to_string()),
            country: Some("US".to_string()),
            province: Some("IA".to_string()),
            ..Address::default()
        };
        let mut billing = shipping.clone();
        billing.city = Some(" des moines ".to_string());
        assert!(address_mismatch(&shipping, &billing).is_none());

        billing.zip = Some("50310".to_string());
        let detail = address_mismatch(&shipping, &billing).expect("zip differs");
        assert!(detail.contains("zip"));
    }

    #[test]
    fn names_only_compared_when_both_present() {
        let shipping = Address {
            first_name: Some("Ana".to_string()),
            last_name: Some("Ruiz".to_string()),
            ..Address::default()
        };
        let billing = Address::default();
        assert!(name_mismatch(&shipping, &billing).is_none());

        let billing = Address {
            first_name: Some("Mark".to_string()),
            last_name: Some("Stone".to_string()),
            ..Address::default()
        };
        assert!(name_mismatch(&shipping, &billing).is_some());
    }
}
