//! Commerce platform adapters implementing [`CommerceGateway`].

mod http;
pub mod memory;
mod payload;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::CommerceConfig;
use crate::workflows::returns::domain::{Order, ReturnStatus};
use crate::workflows::returns::gateway::{
    CommerceGateway, CustomerRef, ExchangeDraft, ExchangeOrderRequest, ExchangeReceipt,
    ExternalReturn, GatewayError, RefundReceipt, RefundRequest, ReturnRequest, VariantSnapshot,
};

pub use memory::InMemoryCommerceGateway;

use self::http::{check_response, malformed, transport};
use self::payload::{
    refund_transactions, CalculatedRefundEnvelope, CreatedRefundEnvelope, DraftOrderEnvelope,
    DraftOrderPayload, DraftOrdersEnvelope, OrderEnvelope, OrdersEnvelope, RefundBody,
    RefundDraft, RefundLineDraft, VariantEnvelope,
};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const HISTORY_PAGE_SIZE: &str = "250";
const STATUS_TAG_PREFIX: &str = "return-";

/// Admin REST API client.
#[derive(Debug, Clone)]
pub struct RestCommerceGateway {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl RestCommerceGateway {
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("return-portal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    pub fn from_config(config: &CommerceConfig) -> Result<Option<Self>, GatewayError> {
        match config.api_url.as_deref() {
            Some(url) => Self::new(url, &config.access_token, config.timeout).map(Some),
            None => Ok(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, GatewayError> {
        debug!(path, "commerce GET");
        let resp = self
            .http
            .get(self.url(path))
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .query(query)
            .send()
            .await
            .map_err(transport)?;
        check_response(resp).await?.json::<T>().await.map_err(malformed)
    }

    /// GET that treats 404 as an absent resource.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, GatewayError> {
        match self.get_json::<T>(path, &[]).await {
            Ok(value) => Ok(Some(value)),
            Err(GatewayError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, GatewayError> {
        debug!(%method, path, "commerce write");
        let resp = self
            .http
            .request(method, self.url(path))
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_response(resp).await?.json::<T>().await.map_err(malformed)
    }

    /// Draft orders cannot be filtered by tag, so recent drafts are scanned for the key.
    async fn find_exchange_draft(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<DraftOrderPayload>, GatewayError> {
        let envelope: DraftOrdersEnvelope = self
            .get_json("draft_orders.json", &[("limit", HISTORY_PAGE_SIZE)])
            .await?;
        Ok(envelope
            .draft_orders
            .into_iter()
            .find(|draft| draft.has_tag(idempotency_key)))
    }

    async fn replace_tags(
        &self,
        order_id: &str,
        tags: Vec<String>,
        note: Option<&str>,
    ) -> Result<(), GatewayError> {
        let mut order = json!({ "id": order_id, "tags": tags.join(", ") });
        if let Some(note) = note {
            order["note_attributes"] = json!([{ "name": "return_status", "value": note }]);
        }
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PUT,
                &format!("orders/{order_id}.json"),
                &json!({ "order": order }),
            )
            .await?;
        Ok(())
    }
}

/// Add `added` to `existing`, replacing any previous return status tag.
pub(crate) fn merge_tags(existing: &[String], added: &[String]) -> Vec<String> {
    let replaces_status = added.iter().any(|tag| is_status_tag(tag));
    let mut merged: Vec<String> = existing
        .iter()
        .filter(|tag| !(replaces_status && is_status_tag(tag)))
        .cloned()
        .collect();
    for tag in added {
        if !merged.iter().any(|known| known.eq_ignore_ascii_case(tag)) {
            merged.push(tag.clone());
        }
    }
    merged
}

fn is_status_tag(tag: &str) -> bool {
    tag.trim()
        .strip_prefix(STATUS_TAG_PREFIX)
        .and_then(ReturnStatus::parse)
        .is_some()
}

impl CommerceGateway for RestCommerceGateway {
    async fn find_order(&self, order_number: &str) -> Result<Option<Order>, GatewayError> {
        let number = order_number.trim().trim_start_matches('#');
        let name = format!("#{number}");
        let envelope: OrdersEnvelope = self
            .get_json("orders.json", &[("name", name.as_str()), ("status", "any")])
            .await?;
        Ok(envelope
            .orders
            .into_iter()
            .map(|payload| payload.into_domain())
            .find(|order| order.name.trim_start_matches('#') == number))
    }

    async fn order(&self, order_id: &str) -> Result<Option<Order>, GatewayError> {
        let envelope: Option<OrderEnvelope> =
            self.get_optional(&format!("orders/{order_id}.json")).await?;
        Ok(envelope.map(|envelope| envelope.order.into_domain()))
    }

    async fn customer_orders(&self, customer: &CustomerRef) -> Result<Vec<Order>, GatewayError> {
        let envelope: OrdersEnvelope = match (&customer.customer_id, &customer.email) {
            (Some(id), _) => {
                self.get_json(
                    &format!("customers/{id}/orders.json"),
                    &[("status", "any"), ("limit", HISTORY_PAGE_SIZE)],
                )
                .await?
            }
            (None, Some(email)) => {
                self.get_json(
                    "orders.json",
                    &[
                        ("email", email.as_str()),
                        ("status", "any"),
                        ("limit", HISTORY_PAGE_SIZE),
                    ],
                )
                .await?
            }
            (None, None) => return Ok(Vec::new()),
        };
        Ok(envelope
            .orders
            .into_iter()
            .map(|payload| payload.into_domain())
            .collect())
    }

    async fn variant(&self, variant_id: &str) -> Result<Option<VariantSnapshot>, GatewayError> {
        let envelope: Option<VariantEnvelope> =
            self.get_optional(&format!("variants/{variant_id}.json")).await?;
        Ok(envelope.map(|envelope| envelope.variant.into_domain()))
    }

    /// The REST API has no return resource; requests are recorded as order tags.
    async fn create_return(&self, request: &ReturnRequest) -> Result<ExternalReturn, GatewayError> {
        let order = self
            .order(&request.order_id)
            .await?
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                message: format!("order {} not found", request.order_id),
            })?;
        let tag = format!("return-requested-{}", request.line_item_id);
        let tags = merge_tags(&order.tags, std::slice::from_ref(&tag));
        self.replace_tags(&request.order_id, tags, None).await?;

        Ok(ExternalReturn {
            id: format!("{}:{}", request.order_id, request.line_item_id),
        })
    }

    async fn create_refund(&self, request: &RefundRequest) -> Result<RefundReceipt, GatewayError> {
        let path = format!("orders/{}/refunds", request.order_id);
        let lines: Vec<RefundLineDraft<'_>> = request
            .lines
            .iter()
            .map(|line| RefundLineDraft {
                line_item_id: &line.line_item_id,
                quantity: line.quantity,
                restock_type: "return",
            })
            .collect();

        let calculation = RefundBody {
            refund: RefundDraft {
                note: &request.note,
                notify: false,
                refund_line_items: lines,
                transactions: Vec::new(),
            },
        };
        let calculation = serde_json::to_value(&calculation)
            .map_err(|err| GatewayError::Malformed(err.to_string()))?;
        let calculated: CalculatedRefundEnvelope = self
            .send_json(
                reqwest::Method::POST,
                &format!("{path}/calculate.json"),
                &calculation,
            )
            .await?;

        let mut body = calculation;
        body["refund"]["notify"] = json!(true);
        body["refund"]["transactions"] = json!(refund_transactions(calculated.refund));
        let created: CreatedRefundEnvelope = self
            .send_json(reqwest::Method::POST, &format!("{path}.json"), &body)
            .await?;

        Ok(RefundReceipt {
            amount: created.refund.transactions.iter().map(|tx| tx.amount).sum(),
            id: created.refund.id,
        })
    }

    async fn create_exchange_draft(
        &self,
        request: &ExchangeOrderRequest,
    ) -> Result<ExchangeDraft, GatewayError> {
        if let Some(existing) = self.find_exchange_draft(&request.idempotency_key).await? {
            debug!(draft_id = %existing.id, "reusing exchange draft");
            return Ok(existing.into_domain());
        }

        let line_items: Vec<serde_json::Value> = request
            .lines
            .iter()
            .map(|line| {
                json!({
                    "variant_id": line.variant_id,
                    "quantity": line.quantity,
                    "applied_discount": {
                        "title": "Exchange",
                        "value_type": "percentage",
                        "value": "100.0",
                    },
                })
            })
            .collect();
        let body = json!({
            "draft_order": {
                "line_items": line_items,
                "email": request.email,
                "note": request.note,
                "tags": format!("exchange, {}", request.idempotency_key),
                "shipping_line": { "title": "Exchange shipping", "price": "0.00" },
            }
        });

        let draft: DraftOrderEnvelope = self
            .send_json(reqwest::Method::POST, "draft_orders.json", &body)
            .await?;
        Ok(draft.draft_order.into_domain())
    }

    async fn complete_exchange_draft(&self, draft_id: &str) -> Result<ExchangeReceipt, GatewayError> {
        let current: Option<DraftOrderEnvelope> =
            self.get_optional(&format!("draft_orders/{draft_id}.json")).await?;
        let current = current.ok_or_else(|| GatewayError::Api {
            status: 404,
            message: format!("draft order {draft_id} not found"),
        })?;
        if let Some(order_id) = current.draft_order.order_id {
            return Ok(ExchangeReceipt {
                draft_order_id: draft_id.to_string(),
                order_id: Some(order_id),
            });
        }

        let completed: DraftOrderEnvelope = self
            .send_json(
                reqwest::Method::PUT,
                &format!("draft_orders/{draft_id}/complete.json"),
                &json!({}),
            )
            .await?;
        Ok(ExchangeReceipt {
            draft_order_id: draft_id.to_string(),
            order_id: completed.draft_order.order_id,
        })
    }

    async fn tag_order(
        &self,
        order_id: &str,
        tags: &[String],
        note: Option<&str>,
    ) -> Result<(), GatewayError> {
        let order = self.order(order_id).await?.ok_or_else(|| GatewayError::Api {
            status: 404,
            message: format!("order {order_id} not found"),
        })?;
        self.replace_tags(order_id, merge_tags(&order.tags, tags), note)
            .await
    }
}
