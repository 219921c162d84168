use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::commerce::InMemoryCommerceGateway;
use crate::workflows::returns::domain::{
    Address, Customer, FinancialStatus, Fulfillment, LineItem, LineItemProperty, Order, Refund,
    RefundLineItem, ReturnId, ReturnLineItem, ReturnOption, ReturnStatus, ReturnSubmission,
};
use crate::workflows::returns::policy::{StaticPolicyResolver, TenantPolicy};
use crate::workflows::returns::repository::{RepositoryError, ReturnRecord, ReturnRepository};
use crate::workflows::returns::ReturnPortalService;

pub(super) const EMAIL: &str = "casey@example.com";

pub(super) fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z")
        .expect("valid instant")
        .with_timezone(&Utc)
}

pub(super) fn line(id: &str, price: f64, quantity: u32) -> LineItem {
    LineItem {
        id: id.to_string(),
        title: format!("Item {id}"),
        variant_id: Some(format!("var-{id}")),
        variant_title: Some("M / Black".to_string()),
        price,
        quantity,
        fulfillment_status: Some("fulfilled".to_string()),
        properties: Vec::new(),
    }
}

pub(super) fn with_property(mut item: LineItem, name: &str, value: &str) -> LineItem {
    item.properties.push(LineItemProperty {
        name: name.to_string(),
        value: value.to_string(),
    });
    item
}

pub(super) fn unfulfilled(mut item: LineItem) -> LineItem {
    item.fulfillment_status = None;
    item
}

pub(super) fn address() -> Address {
    Address {
        first_name: Some("Casey".to_string()),
        last_name: Some("Lin".to_string()),
        address1: Some("400 Pine St".to_string()),
        city: Some("Seattle".to_string()),
        province: Some("WA".to_string()),
        zip: Some("98101".to_string()),
        country: Some("US".to_string()),
        ..Address::default()
    }
}

/// Paid order placed `days_ago` before `now`, every fulfilled line shipped a day later.
pub(super) fn order_at(
    id: &str,
    name: &str,
    now: DateTime<Utc>,
    days_ago: i64,
    lines: Vec<LineItem>,
) -> Order {
    let created_at = now - Duration::days(days_ago);
    let shipped: Vec<String> = lines
        .iter()
        .filter(|item| item.is_fulfilled())
        .map(|item| item.id.clone())
        .collect();
    let total_price = lines
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum();

    Order {
        id: id.to_string(),
        name: name.to_string(),
        email: Some(EMAIL.to_string()),
        financial_status: FinancialStatus::Paid,
        created_at,
        cancelled_at: None,
        total_price,
        tags: Vec::new(),
        line_items: lines,
        fulfillments: if shipped.is_empty() {
            Vec::new()
        } else {
            vec![Fulfillment {
                id: format!("ful-{id}"),
                created_at: created_at + Duration::days(1),
                line_item_ids: shipped,
            }]
        },
        refunds: Vec::new(),
        shipping_address: Some(address()),
        billing_address: Some(address()),
        customer: Some(Customer {
            id: "cust-77".to_string(),
            email: Some(EMAIL.to_string()),
            first_name: Some("Casey".to_string()),
            last_name: Some("Lin".to_string()),
            phone: None,
            created_at: Some(created_at - Duration::days(365)),
        }),
    }
}

pub(super) fn recent_order(id: &str, name: &str, lines: Vec<LineItem>) -> Order {
    order_at(id, name, Utc::now(), 10, lines)
}

/// Earlier order for the same customer that was refunded.
pub(super) fn returned_order(id: &str) -> Order {
    let mut order = order_at(id, &format!("#{id}"), Utc::now(), 120, vec![line("old", 40.0, 1)]);
    order.refunds.push(Refund {
        id: format!("refund-{id}"),
        created_at: order.created_at + Duration::days(5),
        note: None,
        refund_line_items: vec![RefundLineItem {
            line_item_id: "old".to_string(),
            quantity: 1,
            subtotal: 40.0,
        }],
        transactions: Vec::new(),
    });
    order
}

pub(super) fn return_line(id: &str, quantity: u32) -> ReturnLineItem {
    ReturnLineItem {
        line_item_id: id.to_string(),
        quantity,
        option: ReturnOption::Return,
        exchange_variant_id: None,
        exchange_details: None,
        reason: Some("did not fit".to_string()),
    }
}

pub(super) fn exchange_line(id: &str, quantity: u32, variant_id: &str) -> ReturnLineItem {
    ReturnLineItem {
        option: ReturnOption::Exchange,
        exchange_variant_id: Some(variant_id.to_string()),
        ..return_line(id, quantity)
    }
}

pub(super) fn submission(order_number: &str, items: Vec<ReturnLineItem>) -> ReturnSubmission {
    ReturnSubmission {
        order_number: order_number.to_string(),
        email: EMAIL.to_uppercase(),
        items,
        photos: Vec::new(),
        customer_note: None,
    }
}

pub(super) type TestService = ReturnPortalService<MemoryRepository, InMemoryCommerceGateway>;

pub(super) fn build_service(
    gateway: InMemoryCommerceGateway,
    policy: TenantPolicy,
) -> (Arc<TestService>, Arc<MemoryRepository>, Arc<InMemoryCommerceGateway>) {
    let repository = Arc::new(MemoryRepository::default());
    let gateway = Arc::new(gateway);
    let service = ReturnPortalService::new(
        repository.clone(),
        gateway.clone(),
        Arc::new(StaticPolicyResolver::new(policy)),
    );
    (Arc::new(service), repository, gateway)
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<ReturnId, ReturnRecord>>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &ReturnId) -> ReturnRecord {
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .expect("record stored")
    }

    pub(super) fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

impl ReturnRepository for MemoryRepository {
    fn insert(&self, record: ReturnRecord) -> Result<ReturnRecord, RepositoryError> {
        let mut guard = self.records.lock().unwrap();
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ReturnRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().unwrap();
        if !guard.contains_key(&record.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ReturnId) -> Result<Option<ReturnRecord>, RepositoryError> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    fn list(&self, status: Option<ReturnStatus>) -> Result<Vec<ReturnRecord>, RepositoryError> {
        let mut records: Vec<ReturnRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

pub(super) struct UnavailableRepository;

impl ReturnRepository for UnavailableRepository {
    fn insert(&self, _record: ReturnRecord) -> Result<ReturnRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn update(&self, _record: ReturnRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn fetch(&self, _id: &ReturnId) -> Result<Option<ReturnRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }

    fn list(&self, _status: Option<ReturnStatus>) -> Result<Vec<ReturnRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }
}
