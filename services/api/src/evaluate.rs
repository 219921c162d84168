use chrono::{DateTime, Utc};
use clap::Args;
use return_portal::error::AppError;
use return_portal::workflows::returns::{
    assess_fraud_risk, auto_action, evaluate_eligibility, CustomerHistory, EligibilityReport,
    Order, ReturnLineItem, ReturnOption, RiskAssessment, TenantPolicy,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Order snapshot JSON file
    #[arg(long)]
    pub(crate) order: PathBuf,
    /// Tenant policy JSON file (defaults apply when omitted)
    #[arg(long)]
    pub(crate) policy: Option<PathBuf>,
    /// Requested return items JSON file (defaults to every eligible item)
    #[arg(long)]
    pub(crate) items: Option<PathBuf>,
    /// Prior orders for the same customer, used by fraud screening
    #[arg(long)]
    pub(crate) history: Option<PathBuf>,
    /// Evaluation instant (RFC 3339); defaults to now
    #[arg(long, value_parser = parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationView {
    pub(crate) order_number: String,
    pub(crate) evaluated_at: DateTime<Utc>,
    pub(crate) eligibility: EligibilityReport,
    pub(crate) risk: RiskAssessment,
    pub(crate) automatic_action: Option<&'static str>,
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as RFC 3339 ({err})"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let order: Order = read_json(&args.order)?;
    let policy = match &args.policy {
        Some(path) => read_json::<TenantPolicy>(path)?.sanitized(),
        None => TenantPolicy::default(),
    };
    let items = args
        .items
        .as_ref()
        .map(|path| read_json::<Vec<ReturnLineItem>>(path))
        .transpose()?;
    let history: Vec<Order> = match &args.history {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let view = evaluate_snapshot(
        order,
        &policy,
        items,
        history,
        args.now.unwrap_or_else(Utc::now),
    );
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub(crate) fn evaluate_snapshot(
    order: Order,
    policy: &TenantPolicy,
    items: Option<Vec<ReturnLineItem>>,
    history: Vec<Order>,
    now: DateTime<Utc>,
) -> EvaluationView {
    let eligibility = evaluate_eligibility(&order, policy, now);
    let items = items.unwrap_or_else(|| {
        eligibility
            .eligible_items
            .iter()
            .map(|item| ReturnLineItem {
                line_item_id: item.line_item_id.clone(),
                quantity: item.returnable_quantity,
                option: ReturnOption::Return,
                exchange_variant_id: None,
                exchange_details: None,
                reason: None,
            })
            .collect()
    });

    let risk = if policy.fraud_prevention.enabled && !items.is_empty() {
        assess_fraud_risk(&order, &items, &CustomerHistory::new(history), policy, now)
    } else {
        RiskAssessment::clear()
    };
    let automatic_action = eligibility
        .has_eligible_items()
        .then(|| auto_action(&risk, policy))
        .flatten()
        .map(|action| action.label());

    EvaluationView {
        order_number: order.name,
        evaluated_at: now,
        eligibility,
        risk,
        automatic_action,
    }
}
