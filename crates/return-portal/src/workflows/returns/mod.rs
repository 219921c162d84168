//! Return and exchange intake: eligibility, fraud screening, and the admin workflow.
//!
//! Storefront calls resolve the tenant policy, evaluate the order, screen the request,
//! and persist a [`ReturnRecord`]. Admin calls move records through the workflow and
//! settle approved returns against the commerce platform.

pub mod domain;
pub mod eligibility;
pub mod error;
pub mod gateway;
pub mod policy;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use domain::{
    Address, Customer, CustomerSnapshot, ExchangeDetails, FinancialStatus, Fulfillment, LineItem,
    LineItemProperty, Order, Refund, RefundLineItem, RefundTransaction, ReturnId, ReturnItem,
    ReturnLineItem, ReturnOption, ReturnStatus, ReturnSubmission, TenantId,
};
pub use eligibility::{
    evaluate_eligibility, EligibilityReport, EligibleItem, IneligibilityReason, IneligibleItem,
    OrderIneligibility,
};
pub use error::{ErrorKind, ReturnServiceError};
pub use gateway::{CommerceGateway, CustomerRef, GatewayError, VariantSnapshot};
pub use policy::{
    FraudPatternToggles, FraudPreventionSettings, PolicyLoadError, PolicyResolver,
    StaticPolicyResolver, TenantPolicy,
};
pub use repository::{
    RepositoryError, ReturnRecord, ReturnRepository, ReturnSummaryView, SettlementIntent,
};
pub use risk::{assess_fraud_risk, CustomerHistory, RiskAssessment, RiskFactor};
pub use router::{returns_router, ReturnsState};
pub use service::{
    BatchStatus, ItemFailure, ItemOutcome, OrderLookup, ReturnPortalService, ServiceSettings,
    SubmissionOutcome,
};
pub use workflow::{
    auto_action, transition, HistoryEntry, HistoryKind, RejectionReason, Transition,
    WorkflowAction, WorkflowError,
};
