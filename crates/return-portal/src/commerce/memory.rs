//! In-process commerce platform used by the demo server and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};

use crate::workflows::returns::domain::{
    Address, Customer, FinancialStatus, Fulfillment, LineItem, LineItemProperty, Order, Refund,
    RefundLineItem, RefundTransaction,
};
use crate::workflows::returns::gateway::{
    CommerceGateway, CustomerRef, ExchangeDraft, ExchangeOrderRequest, ExchangeReceipt,
    ExternalReturn, GatewayError, RefundReceipt, RefundRequest, ReturnRequest, VariantSnapshot,
};

#[derive(Debug, Default)]
struct Catalog {
    orders: HashMap<String, Order>,
    variants: HashMap<String, VariantSnapshot>,
    returns: Vec<ReturnRequest>,
    refunds: HashMap<String, RefundReceipt>,
    drafts: HashMap<String, ExchangeDraft>,
    draft_keys: HashMap<String, String>,
    failing_return_lines: HashSet<String>,
    history_failure: Option<GatewayError>,
    refund_failure: Option<GatewayError>,
    completion_failure: Option<GatewayError>,
    sequence: u64,
}

impl Catalog {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{}", self.sequence)
    }
}

/// Orders and variants held in memory, with switchable failures.
#[derive(Debug, Default)]
pub struct InMemoryCommerceGateway {
    catalog: Mutex<Catalog>,
}

impl InMemoryCommerceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_order(self, order: Order) -> Self {
        self.insert_order(order);
        self
    }

    pub fn with_variant(self, variant: VariantSnapshot) -> Self {
        self.catalog().variants.insert(variant.id.clone(), variant);
        self
    }

    pub fn insert_order(&self, order: Order) {
        self.catalog().orders.insert(order.id.clone(), order);
    }

    /// Make `create_return` fail for one line item.
    pub fn fail_returns_for(&self, line_item_id: &str) {
        self.catalog()
            .failing_return_lines
            .insert(line_item_id.to_string());
    }

    pub fn fail_history(&self, error: Option<GatewayError>) {
        self.catalog().history_failure = error;
    }

    pub fn fail_refunds(&self, error: Option<GatewayError>) {
        self.catalog().refund_failure = error;
    }

    /// Make `complete_exchange_draft` fail until cleared.
    pub fn fail_exchange_completion(&self, error: Option<GatewayError>) {
        self.catalog().completion_failure = error;
    }

    pub fn stored_order(&self, order_id: &str) -> Option<Order> {
        self.catalog().orders.get(order_id).cloned()
    }

    pub fn created_returns(&self) -> Vec<ReturnRequest> {
        self.catalog().returns.clone()
    }

    pub fn refund_count(&self) -> usize {
        self.catalog().refunds.len()
    }

    /// Completed exchange orders.
    pub fn exchange_count(&self) -> usize {
        self.catalog()
            .drafts
            .values()
            .filter(|draft| draft.order_id.is_some())
            .count()
    }

    pub fn draft_count(&self) -> usize {
        self.catalog().drafts.len()
    }

    pub fn variant_stock(&self, variant_id: &str) -> Option<i64> {
        self.catalog()
            .variants
            .get(variant_id)
            .map(|variant| variant.available_quantity)
    }

    /// A small catalog for local runs: order #1001 is returnable, #1002 is final sale.
    pub fn demo() -> Self {
        let now = Utc::now();
        let customer = Customer {
            id: "cust-1".to_string(),
            email: Some("jamie@example.com".to_string()),
            first_name: Some("Jamie".to_string()),
            last_name: Some("Rivera".to_string()),
            phone: None,
            created_at: Some(now - Duration::days(400)),
        };
        let address = Address {
            first_name: Some("Jamie".to_string()),
            last_name: Some("Rivera".to_string()),
            address1: Some("12 Harbor St".to_string()),
            city: Some("Portland".to_string()),
            province: Some("OR".to_string()),
            zip: Some("97201".to_string()),
            country: Some("US".to_string()),
            ..Address::default()
        };
        let placed = now - Duration::days(10);
        let shipped = now - Duration::days(8);

        let returnable = Order {
            id: "gid-1001".to_string(),
            name: "#1001".to_string(),
            email: customer.email.clone(),
            financial_status: FinancialStatus::Paid,
            created_at: placed,
            cancelled_at: None,
            total_price: 180.0,
            tags: Vec::new(),
            line_items: vec![
                demo_line("li-1", "Merino Sweater", "M / Navy", 120.0, 1, Vec::new()),
                demo_line("li-2", "Wool Socks", "One size", 20.0, 3, Vec::new()),
            ],
            fulfillments: vec![Fulfillment {
                id: "ful-1001".to_string(),
                created_at: shipped,
                line_item_ids: vec!["li-1".to_string(), "li-2".to_string()],
            }],
            refunds: Vec::new(),
            shipping_address: Some(address.clone()),
            billing_address: Some(address.clone()),
            customer: Some(customer.clone()),
        };

        let final_sale = Order {
            id: "gid-1002".to_string(),
            name: "#1002".to_string(),
            tags: vec!["final-sale".to_string()],
            line_items: vec![demo_line(
                "li-3",
                "Clearance Jacket",
                "L / Olive",
                60.0,
                1,
                vec![LineItemProperty {
                    name: "_final_sale".to_string(),
                    value: "true".to_string(),
                }],
            )],
            fulfillments: vec![Fulfillment {
                id: "ful-1002".to_string(),
                created_at: shipped,
                line_item_ids: vec!["li-3".to_string()],
            }],
            total_price: 60.0,
            ..returnable.clone()
        };

        Self::new()
            .with_order(returnable)
            .with_order(final_sale)
            .with_variant(VariantSnapshot {
                id: "var-navy-l".to_string(),
                title: "L / Navy".to_string(),
                price: 120.0,
                available_quantity: 4,
            })
            .with_variant(VariantSnapshot {
                id: "var-navy-s".to_string(),
                title: "S / Navy".to_string(),
                price: 120.0,
                available_quantity: 0,
            })
    }
}

fn demo_line(
    id: &str,
    title: &str,
    variant_title: &str,
    price: f64,
    quantity: u32,
    properties: Vec<LineItemProperty>,
) -> LineItem {
    LineItem {
        id: id.to_string(),
        title: title.to_string(),
        variant_id: Some(format!("var-{id}")),
        variant_title: Some(variant_title.to_string()),
        price,
        quantity,
        fulfillment_status: Some("fulfilled".to_string()),
        properties,
    }
}

fn not_found(what: &str) -> GatewayError {
    GatewayError::Api {
        status: 404,
        message: format!("{what} not found"),
    }
}

impl CommerceGateway for InMemoryCommerceGateway {
    async fn find_order(&self, order_number: &str) -> Result<Option<Order>, GatewayError> {
        let number = order_number.trim().trim_start_matches('#');
        Ok(self
            .catalog()
            .orders
            .values()
            .find(|order| order.name.trim_start_matches('#') == number)
            .cloned())
    }

    async fn order(&self, order_id: &str) -> Result<Option<Order>, GatewayError> {
        Ok(self.stored_order(order_id))
    }

    async fn customer_orders(&self, customer: &CustomerRef) -> Result<Vec<Order>, GatewayError> {
        let catalog = self.catalog();
        if let Some(err) = catalog.history_failure.clone() {
            return Err(err);
        }

        Ok(catalog
            .orders
            .values()
            .filter(|order| {
                let by_id = customer.customer_id.as_deref().is_some_and(|id| {
                    order.customer.as_ref().map(|c| c.id.as_str()) == Some(id)
                });
                let by_email = customer
                    .email
                    .as_deref()
                    .is_some_and(|email| order.matches_email(email));
                by_id || by_email
            })
            .cloned()
            .collect())
    }

    async fn variant(&self, variant_id: &str) -> Result<Option<VariantSnapshot>, GatewayError> {
        Ok(self.catalog().variants.get(variant_id).cloned())
    }

    async fn create_return(&self, request: &ReturnRequest) -> Result<ExternalReturn, GatewayError> {
        let mut catalog = self.catalog();
        if catalog.failing_return_lines.contains(&request.line_item_id) {
            return Err(GatewayError::Api {
                status: 422,
                message: format!("line item {} cannot be returned", request.line_item_id),
            });
        }
        if !catalog.orders.contains_key(&request.order_id) {
            return Err(not_found("order"));
        }

        catalog.returns.push(request.clone());
        let id = catalog.next_id("ext-return");
        Ok(ExternalReturn { id })
    }

    async fn create_refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        let mut catalog = self.catalog();
        if let Some(err) = catalog.refund_failure.clone() {
            return Err(err);
        }
        if let Some(existing) = catalog.refunds.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        let id = catalog.next_id("refund");
        let order = catalog
            .orders
            .get_mut(&request.order_id)
            .ok_or_else(|| not_found("order"))?;

        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let price = order
                .line_item(&line.line_item_id)
                .map(|item| item.price)
                .ok_or_else(|| not_found("line item"))?;
            lines.push(RefundLineItem {
                line_item_id: line.line_item_id.clone(),
                quantity: line.quantity,
                subtotal: price * f64::from(line.quantity),
            });
        }
        let amount: f64 = lines.iter().map(|line| line.subtotal).sum();

        order.refunds.push(Refund {
            id: id.clone(),
            created_at: Utc::now(),
            note: Some(request.note.clone()),
            refund_line_items: lines,
            transactions: vec![RefundTransaction {
                amount,
                status: Some("success".to_string()),
            }],
        });
        if order.is_fully_refunded() {
            order.financial_status = FinancialStatus::Refunded;
        } else {
            order.financial_status = FinancialStatus::PartiallyRefunded;
        }

        let receipt = RefundReceipt { id, amount };
        catalog
            .refunds
            .insert(request.idempotency_key.clone(), receipt.clone());
        Ok(receipt)
    }

    async fn create_exchange_draft(
        &self,
        request: &ExchangeOrderRequest,
    ) -> Result<ExchangeDraft, GatewayError> {
        let mut catalog = self.catalog();
        let existing = catalog
            .draft_keys
            .get(&request.idempotency_key)
            .and_then(|draft_id| catalog.drafts.get(draft_id))
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        for line in &request.lines {
            let variant = catalog
                .variants
                .get(&line.variant_id)
                .ok_or_else(|| not_found("variant"))?;
            if !variant.can_fulfill(line.quantity) {
                return Err(GatewayError::Api {
                    status: 422,
                    message: format!("variant {} is out of stock", variant.id),
                });
            }
        }
        for line in &request.lines {
            if let Some(variant) = catalog.variants.get_mut(&line.variant_id) {
                variant.available_quantity -= i64::from(line.quantity);
            }
        }

        let draft = ExchangeDraft {
            id: catalog.next_id("draft"),
            order_id: None,
        };
        catalog
            .draft_keys
            .insert(request.idempotency_key.clone(), draft.id.clone());
        catalog.drafts.insert(draft.id.clone(), draft.clone());
        Ok(draft)
    }

    async fn complete_exchange_draft(&self, draft_id: &str) -> Result<ExchangeReceipt, GatewayError> {
        let mut catalog = self.catalog();
        if let Some(err) = catalog.completion_failure.clone() {
            return Err(err);
        }

        let completed = catalog
            .drafts
            .get(draft_id)
            .ok_or_else(|| not_found("draft order"))?
            .order_id
            .clone();
        let order_id = match completed {
            Some(order_id) => order_id,
            None => catalog.next_id("exchange-order"),
        };
        if let Some(draft) = catalog.drafts.get_mut(draft_id) {
            draft.order_id = Some(order_id.clone());
        }

        Ok(ExchangeReceipt {
            draft_order_id: draft_id.to_string(),
            order_id: Some(order_id),
        })
    }

    async fn tag_order(
        &self,
        order_id: &str,
        tags: &[String],
        _note: Option<&str>,
    ) -> Result<(), GatewayError> {
        let mut catalog = self.catalog();
        let order = catalog
            .orders
            .get_mut(order_id)
            .ok_or_else(|| not_found("order"))?;
        order.tags = super::merge_tags(&order.tags, tags);
        Ok(())
    }
}
