use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use super::domain::{
    CustomerSnapshot, Order, ReturnId, ReturnItem, ReturnLineItem, ReturnOption, ReturnStatus,
    ReturnSubmission, TenantId,
};
use super::eligibility::{evaluate_eligibility, EligibilityReport, EligibleItem, IneligibleItem};
use super::error::{ErrorKind, ReturnServiceError};
use super::gateway::{
    bounded, CommerceGateway, CustomerRef, ExchangeLine, ExchangeOrderRequest, GatewayError,
    RefundLine, RefundRequest, ReturnRequest, VariantSnapshot,
};
use super::policy::{PolicyResolver, TenantPolicy};
use super::repository::{RepositoryError, ReturnRecord, ReturnRepository, SettlementIntent};
use super::risk::{assess_fraud_risk, CustomerHistory, RiskAssessment};
use super::workflow::{
    auto_action, transition, HistoryKind, RejectionReason, Transition, WorkflowAction,
};

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const SYSTEM_ACTOR: &str = "system";

/// Runtime knobs for the service.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub upstream_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

/// Service composing the policy resolver, commerce gateway, evaluators, and repository.
pub struct ReturnPortalService<R, G> {
    repository: Arc<R>,
    gateway: Arc<G>,
    policies: Arc<dyn PolicyResolver>,
    settings: ServiceSettings,
}

/// Storefront view of an order and what can be returned from it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLookup {
    pub order_id: String,
    pub order_number: String,
    pub customer: CustomerSnapshot,
    pub eligibility: EligibilityReport,
    pub allow_exchanges: bool,
    pub require_photos: bool,
    pub return_window_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl BatchStatus {
    pub fn from_outcomes(outcomes: &[ItemOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|outcome| outcome.succeeded).count();
        if succeeded == 0 {
            BatchStatus::Failed
        } else if succeeded == outcomes.len() {
            BatchStatus::Success
        } else {
            BatchStatus::PartialSuccess
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-line result of a submission batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub line_item_id: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_return_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemFailure>,
}

impl ItemOutcome {
    fn success(line_item_id: &str, external_return_id: String) -> Self {
        Self {
            line_item_id: line_item_id.to_string(),
            succeeded: true,
            external_return_id: Some(external_return_id),
            error: None,
        }
    }

    fn failure(line_item_id: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            line_item_id: line_item_id.to_string(),
            succeeded: false,
            external_return_id: None,
            error: Some(ItemFailure {
                kind,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub record: ReturnRecord,
    pub status: BatchStatus,
    pub items: Vec<ItemOutcome>,
}

impl SubmissionOutcome {
    pub fn requires_review(&self) -> bool {
        self.record.status == ReturnStatus::Flagged
    }
}

struct Candidate<'a> {
    index: usize,
    request: &'a ReturnLineItem,
    eligible: &'a EligibleItem,
}

impl<R, G> ReturnPortalService<R, G>
where
    R: ReturnRepository + 'static,
    G: CommerceGateway + 'static,
{
    pub fn new(repository: Arc<R>, gateway: Arc<G>, policies: Arc<dyn PolicyResolver>) -> Self {
        Self {
            repository,
            gateway,
            policies,
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn policy(&self, tenant: &TenantId) -> TenantPolicy {
        self.policies.policy(tenant)
    }

    /// Resolve an order for the storefront and preview its eligibility.
    pub async fn lookup_order(
        &self,
        tenant: &TenantId,
        order_number: &str,
        email: &str,
    ) -> Result<OrderLookup, ReturnServiceError> {
        let policy = self.policy(tenant);
        let order = self.load_order(order_number, email).await?;
        let eligibility = evaluate_eligibility(&order, &policy, Utc::now());

        Ok(OrderLookup {
            order_id: order.id.clone(),
            order_number: order.name.clone(),
            customer: CustomerSnapshot::from_order(&order, email),
            eligibility,
            allow_exchanges: policy.allow_exchanges,
            require_photos: policy.require_photos,
            return_window_days: policy.return_window_days,
        })
    }

    /// Validate, screen, and persist a return request.
    pub async fn submit_return(
        &self,
        tenant: &TenantId,
        submission: ReturnSubmission,
    ) -> Result<SubmissionOutcome, ReturnServiceError> {
        let policy = self.policy(tenant);
        validate_submission(&submission, &policy)?;
        let return_id = ReturnId::generate();

        let order = self
            .load_order(&submission.order_number, &submission.email)
            .await?;
        validate_quantities(&order, &submission.items)?;

        let now = Utc::now();
        let report = evaluate_eligibility(&order, &policy, now);
        if let Some(reason) = report.order_level_reason.clone() {
            info!(order = %order.name, reason = %reason.summary(), "order not eligible for return");
            return Err(ReturnServiceError::OrderNotEligible(reason));
        }

        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; submission.items.len()];
        let mut candidates = Vec::new();
        let mut rejected: Vec<IneligibleItem> = Vec::new();
        for (index, request) in submission.items.iter().enumerate() {
            match report.eligible(&request.line_item_id) {
                Some(eligible) => candidates.push(Candidate {
                    index,
                    request,
                    eligible,
                }),
                None => {
                    if let Some(ineligible) = report.ineligible(&request.line_item_id) {
                        outcomes[index] = Some(ItemOutcome::failure(
                            &request.line_item_id,
                            ErrorKind::ItemNotReturnable,
                            ineligible.reason.summary(),
                        ));
                        rejected.push(ineligible.clone());
                    }
                }
            }
        }

        if candidates.is_empty() {
            return Err(ReturnServiceError::ItemsNotReturnable(rejected));
        }

        let mut last_upstream: Option<GatewayError> = None;
        let candidates = self
            .reserve_exchanges(candidates, &mut outcomes, &mut last_upstream)
            .await;
        if candidates.is_empty() {
            return Err(match last_upstream {
                Some(err) => ReturnServiceError::Upstream(err),
                None => ReturnServiceError::Conflict(
                    "requested exchange variants are unavailable".to_string(),
                ),
            });
        }

        let mut items = Vec::new();
        let mut accepted: Vec<ReturnLineItem> = Vec::new();
        for candidate in &candidates {
            let request = ReturnRequest {
                order_id: order.id.clone(),
                line_item_id: candidate.request.line_item_id.clone(),
                quantity: candidate.request.quantity,
                reason: candidate.request.reason.clone(),
            };
            let created = bounded(
                "create_return",
                self.settings.upstream_timeout,
                self.gateway.create_return(&request),
            )
            .await;

            match created {
                Ok(external) => {
                    outcomes[candidate.index] = Some(ItemOutcome::success(
                        &candidate.request.line_item_id,
                        external.id.clone(),
                    ));
                    items.push(return_item(candidate, external.id));
                    accepted.push(candidate.request.clone());
                }
                Err(err) => {
                    error!(
                        order = %order.name,
                        line_item_id = %candidate.request.line_item_id,
                        error = %err,
                        "failed to create return for line item"
                    );
                    outcomes[candidate.index] = Some(ItemOutcome::failure(
                        &candidate.request.line_item_id,
                        ErrorKind::UpstreamServiceError,
                        err.to_string(),
                    ));
                    last_upstream = Some(err);
                }
            }
        }

        if items.is_empty() {
            let err = last_upstream.unwrap_or_else(|| {
                GatewayError::Transport("no return could be created".to_string())
            });
            return Err(ReturnServiceError::Upstream(err));
        }

        // Screen only the lines the record will hold.
        let assessment = self.screen(&order, &accepted, &policy, now).await;

        let mut record = ReturnRecord {
            id: return_id,
            tenant_id: tenant.clone(),
            order_id: order.id.clone(),
            order_number: order.name.clone(),
            customer: CustomerSnapshot::from_order(&order, &submission.email),
            items,
            status: ReturnStatus::Pending,
            admin_notes: String::new(),
            customer_note: submission.customer_note.clone(),
            photos: submission.photos.clone(),
            rejection: None,
            risk: assessment,
            created_at: now,
            updated_at: now,
            status_changed_at: now,
            history: Vec::new(),
            settlement: None,
        };
        let requester = record.customer.email.clone();
        record.record_event(
            HistoryKind::Created,
            "Return requested".to_string(),
            &requester,
            submission.customer_note.as_deref(),
            now,
        );

        if let Some(action) = auto_action(&record.risk, &policy) {
            let note = (action == WorkflowAction::Flag).then(|| {
                format!(
                    "Risk score {}: {}",
                    record.risk.risk_score,
                    record.risk.labels().join(", ")
                )
            });
            record.apply(&action, SYSTEM_ACTOR, note.as_deref(), now)?;
        }

        let stored = self.repository.insert(record).map_err(|err| {
            error!(
                order = %order.name,
                error = %err,
                "return created upstream but the local record could not be stored"
            );
            err
        })?;

        info!(
            return_id = %stored.id.0,
            order = %stored.order_number,
            status = stored.status.label(),
            risk_score = stored.risk.risk_score,
            "return submitted"
        );
        self.mirror_status(&stored).await;

        let items: Vec<ItemOutcome> = outcomes.into_iter().flatten().collect();
        Ok(SubmissionOutcome {
            status: BatchStatus::from_outcomes(&items),
            items,
            record: stored,
        })
    }

    pub async fn approve(
        &self,
        id: &ReturnId,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<ReturnRecord, ReturnServiceError> {
        self.transition_record(id, WorkflowAction::Approve, actor, notes)
            .await
    }

    pub async fn flag(
        &self,
        id: &ReturnId,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<ReturnRecord, ReturnServiceError> {
        self.transition_record(id, WorkflowAction::Flag, actor, notes)
            .await
    }

    pub async fn reject(
        &self,
        id: &ReturnId,
        actor: &str,
        reason: RejectionReason,
        notes: Option<&str>,
    ) -> Result<ReturnRecord, ReturnServiceError> {
        self.transition_record(id, WorkflowAction::Reject(reason), actor, notes)
            .await
    }

    /// Settle an approved return: refund returned items, ship exchanges, then mark completed.
    ///
    /// The settlement intent is stored before any remote call; on failure the record
    /// stays approved and a retry reuses the same idempotency keys.
    pub async fn complete(
        &self,
        id: &ReturnId,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<ReturnRecord, ReturnServiceError> {
        let mut record = self.fetch_record(id)?;
        if transition(record.status, &WorkflowAction::Complete)? == Transition::Unchanged {
            return Ok(record);
        }

        let now = Utc::now();
        if record.settlement.is_none() {
            record.settlement = Some(SettlementIntent::new(&record.id, now));
            self.repository.update(record.clone())?;
        }

        if let Err(err) = self.settle(&mut record).await {
            error!(
                return_id = %record.id.0,
                order = %record.order_number,
                error = %err,
                "settlement failed, return stays approved"
            );
            let message = err.to_string();
            if let Some(intent) = record.settlement.as_mut() {
                intent.attempts += 1;
                intent.last_error = Some(message.clone());
            }
            record.record_event(
                HistoryKind::SettlementFailed,
                "Refund or exchange failed".to_string(),
                actor,
                Some(&message),
                Utc::now(),
            );
            self.repository.update(record)?;
            return Err(err);
        }

        let now = Utc::now();
        if let Some(intent) = record.settlement.as_mut() {
            intent.attempts += 1;
            intent.last_error = None;
            intent.settled_at = Some(now);
        }
        record.apply(&WorkflowAction::Complete, actor, notes, now)?;
        self.repository.update(record.clone())?;

        info!(return_id = %record.id.0, actor, "return completed");
        self.mirror_status(&record).await;
        Ok(record)
    }

    pub fn get(&self, id: &ReturnId) -> Result<ReturnRecord, ReturnServiceError> {
        self.fetch_record(id)
    }

    pub fn list(&self, status: Option<ReturnStatus>) -> Result<Vec<ReturnRecord>, ReturnServiceError> {
        Ok(self.repository.list(status)?)
    }

    async fn load_order(&self, order_number: &str, email: &str) -> Result<Order, ReturnServiceError> {
        let order_number = order_number.trim();
        if order_number.is_empty() {
            return Err(ReturnServiceError::BadRequest(
                "order number is required".to_string(),
            ));
        }
        if email.trim().is_empty() {
            return Err(ReturnServiceError::BadRequest("email is required".to_string()));
        }

        let order = bounded(
            "find_order",
            self.settings.upstream_timeout,
            self.gateway.find_order(order_number),
        )
        .await
        .map_err(|err| {
            error!(order = order_number, error = %err, "order lookup failed");
            err
        })?
        .ok_or_else(|| ReturnServiceError::NotFound(format!("order {order_number}")))?;

        if !order.matches_email(email) {
            warn!(order = order_number, "order lookup with mismatched email");
            return Err(ReturnServiceError::Forbidden);
        }

        Ok(order)
    }

    /// Check stock for exchange targets concurrently, dropping lines that cannot ship.
    async fn reserve_exchanges<'a>(
        &self,
        candidates: Vec<Candidate<'a>>,
        outcomes: &mut [Option<ItemOutcome>],
        last_upstream: &mut Option<GatewayError>,
    ) -> Vec<Candidate<'a>> {
        let variant_ids: HashSet<String> = candidates
            .iter()
            .filter(|candidate| candidate.request.option == ReturnOption::Exchange)
            .filter_map(|candidate| candidate.request.exchange_variant_id.clone())
            .collect();

        let lookups = variant_ids.into_iter().map(|variant_id| async move {
            let result = bounded(
                "variant",
                self.settings.upstream_timeout,
                self.gateway.variant(&variant_id),
            )
            .await;
            (variant_id, result)
        });
        let variants: HashMap<String, Result<Option<VariantSnapshot>, GatewayError>> =
            join_all(lookups).await.into_iter().collect();

        let mut reserved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(variant_id) = candidate
                .request
                .exchange_variant_id
                .as_deref()
                .filter(|_| candidate.request.option == ReturnOption::Exchange)
            else {
                reserved.push(candidate);
                continue;
            };

            let line_item_id = &candidate.request.line_item_id;
            match variants.get(variant_id) {
                Some(Ok(Some(variant))) if variant.can_fulfill(candidate.request.quantity) => {
                    reserved.push(candidate);
                }
                Some(Ok(Some(variant))) => {
                    outcomes[candidate.index] = Some(ItemOutcome::failure(
                        line_item_id,
                        ErrorKind::Conflict,
                        format!("exchange variant {} is out of stock", variant.title),
                    ));
                }
                Some(Ok(None)) | None => {
                    outcomes[candidate.index] = Some(ItemOutcome::failure(
                        line_item_id,
                        ErrorKind::NotFound,
                        format!("exchange variant {variant_id} not found"),
                    ));
                }
                Some(Err(err)) => {
                    error!(variant_id, error = %err, "variant lookup failed");
                    outcomes[candidate.index] = Some(ItemOutcome::failure(
                        line_item_id,
                        ErrorKind::UpstreamServiceError,
                        err.to_string(),
                    ));
                    *last_upstream = Some(err.clone());
                }
            }
        }
        reserved
    }

    /// Fraud screening that degrades to a recorded skip when history is unavailable.
    async fn screen(
        &self,
        order: &Order,
        selected: &[ReturnLineItem],
        policy: &TenantPolicy,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        if !policy.fraud_prevention.enabled {
            return RiskAssessment::clear();
        }

        let customer = CustomerRef::from_order(order);
        let history = if customer.is_empty() {
            CustomerHistory::default()
        } else {
            match bounded(
                "customer_orders",
                self.settings.upstream_timeout,
                self.gateway.customer_orders(&customer),
            )
            .await
            {
                Ok(orders) => CustomerHistory::new(orders),
                Err(err) => {
                    warn!(
                        order = %order.name,
                        error = %err,
                        "customer history unavailable, fraud screening skipped"
                    );
                    return RiskAssessment::skipped(format!("customer history unavailable: {err}"));
                }
            }
        };

        assess_fraud_risk(order, selected, &history, policy, now)
    }

    async fn settle(&self, record: &mut ReturnRecord) -> Result<(), ReturnServiceError> {
        let mut intent = record
            .settlement
            .clone()
            .unwrap_or_else(|| SettlementIntent::new(&record.id, Utc::now()));

        let order = bounded(
            "order",
            self.settings.upstream_timeout,
            self.gateway.order(&record.order_id),
        )
        .await?
        .ok_or_else(|| ReturnServiceError::NotFound(format!("order {}", record.order_number)))?;

        if intent.refund_id.is_none() {
            let refund_key = intent.refund_key();
            if order.has_refund_note(&refund_key) {
                intent.refund_id = Some(format!("reconciled:{refund_key}"));
            } else if !order.is_fully_refunded() {
                let lines = refundable_lines(&order, &record.items);
                if !lines.is_empty() {
                    let request = RefundRequest {
                        order_id: order.id.clone(),
                        lines,
                        note: format!("Return {} [{refund_key}]", record.id.0),
                        idempotency_key: refund_key,
                    };
                    let receipt = bounded(
                        "create_refund",
                        self.settings.upstream_timeout,
                        self.gateway.create_refund(&request),
                    )
                    .await?;
                    info!(return_id = %record.id.0, refund_id = %receipt.id, amount = receipt.amount, "refund created");
                    intent.refund_id = Some(receipt.id);
                }
            }
            record.settlement = Some(intent.clone());
        }

        if intent.exchange_order_id.is_none() {
            let lines: Vec<ExchangeLine> = record
                .items
                .iter()
                .filter(|item| item.option == ReturnOption::Exchange)
                .filter_map(|item| {
                    item.exchange_variant_id.clone().map(|variant_id| ExchangeLine {
                        variant_id,
                        quantity: item.quantity,
                    })
                })
                .collect();

            if !lines.is_empty() {
                let draft_id = match intent.exchange_draft_id.clone() {
                    Some(draft_id) => draft_id,
                    None => {
                        let exchange_key = intent.exchange_key();
                        let request = ExchangeOrderRequest {
                            original_order_id: order.id.clone(),
                            email: record.customer.email.clone(),
                            lines,
                            note: format!("Exchange for return {} [{exchange_key}]", record.id.0),
                            idempotency_key: exchange_key,
                        };
                        let draft = bounded(
                            "create_exchange_draft",
                            self.settings.upstream_timeout,
                            self.gateway.create_exchange_draft(&request),
                        )
                        .await?;
                        info!(return_id = %record.id.0, draft_id = %draft.id, "exchange draft created");

                        // A retry must complete this draft rather than open another one.
                        intent.exchange_draft_id = Some(draft.id.clone());
                        record.settlement = Some(intent.clone());
                        self.repository.update(record.clone())?;
                        draft.id
                    }
                };

                let receipt = bounded(
                    "complete_exchange_draft",
                    self.settings.upstream_timeout,
                    self.gateway.complete_exchange_draft(&draft_id),
                )
                .await?;
                intent.exchange_order_id = Some(receipt.order_id.unwrap_or(receipt.draft_order_id));
                record.settlement = Some(intent);
            }
        }

        Ok(())
    }

    async fn transition_record(
        &self,
        id: &ReturnId,
        action: WorkflowAction,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<ReturnRecord, ReturnServiceError> {
        let mut record = self.fetch_record(id)?;
        match record.apply(&action, actor, notes, Utc::now())? {
            Transition::Unchanged => Ok(record),
            Transition::Moved { from, to } => {
                self.repository.update(record.clone())?;
                info!(
                    return_id = %record.id.0,
                    from = from.label(),
                    to = to.label(),
                    actor,
                    "return transitioned"
                );
                self.mirror_status(&record).await;
                Ok(record)
            }
        }
    }

    fn fetch_record(&self, id: &ReturnId) -> Result<ReturnRecord, ReturnServiceError> {
        self.repository
            .fetch(id)?
            .ok_or_else(|| RepositoryError::NotFound.into())
    }

    /// Mirror workflow status onto the order's tags; display-only, never the source of truth.
    async fn mirror_status(&self, record: &ReturnRecord) {
        let tags = [format!("return-{}", record.status.label())];
        let note = format!("Return {} {}", record.id.0, record.status.label());
        let mirrored = bounded(
            "tag_order",
            self.settings.upstream_timeout,
            self.gateway.tag_order(&record.order_id, &tags, Some(&note)),
        )
        .await;

        if let Err(err) = mirrored {
            warn!(
                return_id = %record.id.0,
                order_id = %record.order_id,
                error = %err,
                "failed to mirror return status onto order tags"
            );
        }
    }
}

fn return_item(candidate: &Candidate<'_>, external_return_id: String) -> ReturnItem {
    let request = candidate.request;
    ReturnItem {
        line_item_id: request.line_item_id.clone(),
        title: candidate.eligible.title.clone(),
        variant_title: candidate.eligible.variant_title.clone(),
        quantity: request.quantity,
        unit_price: candidate.eligible.unit_price,
        option: request.option,
        exchange_variant_id: request.exchange_variant_id.clone(),
        exchange_details: request.exchange_details.clone(),
        reason: request.reason.clone(),
        external_return_id: Some(external_return_id),
    }
}

/// Fulfilled, not-yet-refunded quantities for the `return` items on a record.
fn refundable_lines(order: &Order, items: &[ReturnItem]) -> Vec<RefundLine> {
    items
        .iter()
        .filter(|item| item.option == ReturnOption::Return)
        .filter_map(|item| {
            let line = order.line_item(&item.line_item_id)?;
            if !line.is_fulfilled() {
                return None;
            }
            let quantity = item.quantity.min(order.remaining_quantity(line));
            (quantity > 0).then(|| RefundLine {
                line_item_id: item.line_item_id.clone(),
                quantity,
            })
        })
        .collect()
}

fn validate_submission(
    submission: &ReturnSubmission,
    policy: &TenantPolicy,
) -> Result<(), ReturnServiceError> {
    if submission.items.is_empty() {
        return Err(ReturnServiceError::BadRequest(
            "at least one item must be selected".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for item in &submission.items {
        if item.line_item_id.trim().is_empty() {
            return Err(ReturnServiceError::BadRequest(
                "line item id is required".to_string(),
            ));
        }
        if !seen.insert(item.line_item_id.as_str()) {
            return Err(ReturnServiceError::BadRequest(format!(
                "line item {} selected more than once",
                item.line_item_id
            )));
        }
        if item.quantity == 0 {
            return Err(ReturnServiceError::BadRequest(format!(
                "quantity for line item {} must be at least 1",
                item.line_item_id
            )));
        }
        if item.option == ReturnOption::Exchange {
            if !policy.allow_exchanges {
                return Err(ReturnServiceError::BadRequest(
                    "exchanges are not offered by this store".to_string(),
                ));
            }
            let has_variant = item
                .exchange_variant_id
                .as_deref()
                .map(|variant| !variant.trim().is_empty())
                .unwrap_or(false);
            if !has_variant {
                return Err(ReturnServiceError::BadRequest(format!(
                    "exchange for line item {} requires a target variant",
                    item.line_item_id
                )));
            }
        }
    }

    if policy.require_photos && submission.photos.is_empty() {
        return Err(ReturnServiceError::BadRequest(
            "photos are required for returns".to_string(),
        ));
    }

    Ok(())
}

/// Quantity range check that runs before eligibility evaluation.
fn validate_quantities(order: &Order, items: &[ReturnLineItem]) -> Result<(), ReturnServiceError> {
    for item in items {
        let line = order
            .line_item(&item.line_item_id)
            .ok_or_else(|| ReturnServiceError::NotFound(format!("line item {}", item.line_item_id)))?;
        let remaining = order.remaining_quantity(line);
        if item.quantity > remaining {
            return Err(ReturnServiceError::BadRequest(format!(
                "requested {} of line item {} but only {remaining} can be returned",
                item.quantity, item.line_item_id
            )));
        }
    }
    Ok(())
}
