//! Admin REST payloads and their mapping onto the domain order snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::workflows::returns::domain::{
    Address, Customer, FinancialStatus, Fulfillment, LineItem, LineItemProperty, Order, Refund,
    RefundLineItem, RefundTransaction,
};
use crate::workflows::returns::gateway::{ExchangeDraft, VariantSnapshot};

/// Numeric ids arrive as JSON numbers; the domain keeps them as strings.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(value) => value.to_string(),
        Raw::Text(value) => value,
    })
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value.to_string()),
        Some(Raw::Text(value)) => Some(value),
        None => None,
    })
}

/// Money amounts are decimal strings ("19.99"); numbers are tolerated.
fn money<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(Raw::Number(value)) => Ok(value),
        Some(Raw::Text(value)) if value.trim().is_empty() => Ok(0.0),
        Some(Raw::Text(value)) => value
            .trim()
            .parse::<f64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid amount '{value}'"))),
    }
}

/// Order tags are a single comma separated string.
pub(crate) fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderEnvelope {
    pub order: OrderPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersEnvelope {
    #[serde(default)]
    pub orders: Vec<OrderPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VariantEnvelope {
    pub variant: VariantPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub financial_status: Option<FinancialStatus>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "money")]
    pub total_price: f64,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub line_items: Vec<LineItemPayload>,
    #[serde(default)]
    pub fulfillments: Vec<FulfillmentPayload>,
    #[serde(default)]
    pub refunds: Vec<RefundPayload>,
    #[serde(default)]
    pub shipping_address: Option<AddressPayload>,
    #[serde(default)]
    pub billing_address: Option<AddressPayload>,
    #[serde(default)]
    pub customer: Option<CustomerPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LineItemPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub variant_id: Option<String>,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default, deserialize_with = "money")]
    pub price: f64,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PropertyPayload {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FulfillmentPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<LineItemRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LineItemRef {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub refund_line_items: Vec<RefundLinePayload>,
    #[serde(default)]
    pub transactions: Vec<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RefundLinePayload {
    #[serde(deserialize_with = "id_string")]
    pub line_item_id: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default, deserialize_with = "money")]
    pub subtotal: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionPayload {
    #[serde(default, deserialize_with = "money")]
    pub amount: f64,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddressPayload {
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

#[derive(Debug, Deserialize)]
pub(crate) struct CustomerPayload {
    #[serde(deserialize_with = "id_string")]
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

#[derive(Debug, Deserialize)]
pub(crate) struct VariantPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "money")]
    pub price: f64,
    #[serde(default)]
    pub inventory_quantity: i64,
}

impl OrderPayload {
    pub(crate) fn into_domain(self) -> Order {
        Order {
            id: self.id,
            name: self.name,
            email: self.email.filter(|email| !email.trim().is_empty()),
            financial_status: self.financial_status.unwrap_or(FinancialStatus::Unknown),
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
            total_price: self.total_price,
            tags: split_tags(&self.tags),
            line_items: self.line_items.into_iter().map(LineItemPayload::into_domain).collect(),
            fulfillments: self
                .fulfillments
                .into_iter()
                .map(|fulfillment| Fulfillment {
                    id: fulfillment.id,
                    created_at: fulfillment.created_at,
                    line_item_ids: fulfillment.line_items.into_iter().map(|item| item.id).collect(),
                })
                .collect(),
            refunds: self.refunds.into_iter().map(RefundPayload::into_domain).collect(),
            shipping_address: self.shipping_address.map(AddressPayload::into_domain),
            billing_address: self.billing_address.map(AddressPayload::into_domain),
            customer: self.customer.map(|customer| Customer {
                id: customer.id,
                email: customer.email,
                first_name: customer.first_name,
                last_name: customer.last_name,
                phone: customer.phone,
                created_at: customer.created_at,
            }),
        }
    }
}

impl LineItemPayload {
    fn into_domain(self) -> LineItem {
        LineItem {
            id: self.id,
            title: self.title,
            variant_id: self.variant_id,
            variant_title: self.variant_title,
            price: self.price,
            quantity: self.quantity,
            fulfillment_status: self.fulfillment_status,
            properties: self
                .properties
                .into_iter()
                .map(|property| LineItemProperty {
                    name: property.name,
                    value: match property.value {
                        serde_json::Value::String(text) => text,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    },
                })
                .collect(),
        }
    }
}

impl RefundPayload {
    fn into_domain(self) -> Refund {
        Refund {
            id: self.id,
            created_at: self.created_at,
            note: self.note,
            refund_line_items: self
                .refund_line_items
                .into_iter()
                .map(|line| RefundLineItem {
                    line_item_id: line.line_item_id,
                    quantity: line.quantity,
                    subtotal: line.subtotal,
                })
                .collect(),
            transactions: self
                .transactions
                .into_iter()
                .map(|transaction| RefundTransaction {
                    amount: transaction.amount,
                    status: transaction.status,
                })
                .collect(),
        }
    }
}

impl AddressPayload {
    fn into_domain(self) -> Address {
        Address {
            first_name: self.first_name,
            last_name: self.last_name,
            address1: self.address1,
            address2: self.address2,
            city: self.city,
            province: self.province,
            zip: self.zip,
            country: self.country,
            phone: self.phone,
        }
    }
}

impl VariantPayload {
    pub(crate) fn into_domain(self) -> VariantSnapshot {
        VariantSnapshot {
            id: self.id,
            title: self.title,
            price: self.price,
            available_quantity: self.inventory_quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundBody<'a> {
    pub refund: RefundDraft<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundDraft<'a> {
    pub note: &'a str,
    pub notify: bool,
    pub refund_line_items: Vec<RefundLineDraft<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundLineDraft<'a> {
    pub line_item_id: &'a str,
    pub quantity: u32,
    pub restock_type: &'static str,
}

/// Suggested transactions from the refund calculation endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct CalculatedRefundEnvelope {
    pub refund: CalculatedRefund,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalculatedRefund {
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedRefundEnvelope {
    pub refund: CreatedRefund,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedRefund {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub transactions: Vec<TransactionPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftOrderEnvelope {
    pub draft_order: DraftOrderPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftOrdersEnvelope {
    #[serde(default)]
    pub draft_orders: Vec<DraftOrderPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DraftOrderPayload {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub tags: String,
}

impl DraftOrderPayload {
    pub fn has_tag(&self, wanted: &str) -> bool {
        split_tags(&self.tags)
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(wanted))
    }

    pub fn into_domain(self) -> ExchangeDraft {
        ExchangeDraft {
            id: self.id,
            order_id: self.order_id,
        }
    }
}

/// Turn calculated suggestions into transactions the create endpoint accepts.
pub(crate) fn refund_transactions(calculated: CalculatedRefund) -> Vec<serde_json::Value> {
    calculated
        .transactions
        .into_iter()
        .map(|mut transaction| {
            if let Some(object) = transaction.as_object_mut() {
                object.insert("kind".to_string(), serde_json::Value::from("refund"));
                object.remove("maximum_refundable");
            }
            transaction
        })
        .collect()
}
