use serde::{Deserialize, Serialize};

use super::eligibility::{IneligibleItem, OrderIneligibility};
use super::gateway::GatewayError;
use super::repository::RepositoryError;
use super::workflow::WorkflowError;

/// Coarse error classification shared by the service, batch outcomes, and HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Forbidden,
    OrderNotEligible,
    ItemNotReturnable,
    Conflict,
    FraudDetected,
    UpstreamServiceError,
    TooManyRequests,
    InternalError,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::OrderNotEligible => "order_not_eligible",
            ErrorKind::ItemNotReturnable => "item_not_returnable",
            ErrorKind::Conflict => "conflict",
            ErrorKind::FraudDetected => "fraud_detected",
            ErrorKind::UpstreamServiceError => "upstream_service_error",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

/// Error raised by the return portal service.
#[derive(Debug, thiserror::Error)]
pub enum ReturnServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("email does not match the order")]
    Forbidden,
    #[error("{}", .0.summary())]
    OrderNotEligible(OrderIneligibility),
    #[error("no requested items can be returned")]
    ItemsNotReturnable(Vec<IneligibleItem>),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Upstream(#[from] GatewayError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ReturnServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReturnServiceError::BadRequest(_) => ErrorKind::BadRequest,
            ReturnServiceError::NotFound(_) => ErrorKind::NotFound,
            ReturnServiceError::Forbidden => ErrorKind::Forbidden,
            ReturnServiceError::OrderNotEligible(_) => ErrorKind::OrderNotEligible,
            ReturnServiceError::ItemsNotReturnable(_) => ErrorKind::ItemNotReturnable,
            ReturnServiceError::Conflict(_) => ErrorKind::Conflict,
            ReturnServiceError::Upstream(_) => ErrorKind::UpstreamServiceError,
            ReturnServiceError::Workflow(WorkflowError::MissingRejectionDetail) => {
                ErrorKind::BadRequest
            }
            ReturnServiceError::Workflow(WorkflowError::InvalidTransition { .. }) => {
                ErrorKind::Conflict
            }
            ReturnServiceError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            ReturnServiceError::Repository(RepositoryError::Conflict) => ErrorKind::Conflict,
            ReturnServiceError::Repository(RepositoryError::Unavailable(_)) => {
                ErrorKind::InternalError
            }
        }
    }

    /// Message safe to show a shopper; upstream detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::UpstreamServiceError => {
                "the store is temporarily unavailable, please try again later".to_string()
            }
            ErrorKind::InternalError => "unexpected error, please try again later".to_string(),
            _ => self.to_string(),
        }
    }
}
