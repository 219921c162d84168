use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::domain::ReturnStatus;
use super::policy::TenantPolicy;
use super::repository::ReturnRecord;
use super::risk::RiskAssessment;

/// Admin or system action driving the return state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Approve,
    Flag,
    Reject(RejectionReason),
    Complete,
}

impl WorkflowAction {
    pub fn label(&self) -> &'static str {
        match self {
            WorkflowAction::Approve => "approve",
            WorkflowAction::Flag => "flag",
            WorkflowAction::Reject(_) => "reject",
            WorkflowAction::Complete => "complete",
        }
    }

    fn target(&self) -> ReturnStatus {
        match self {
            WorkflowAction::Approve => ReturnStatus::Approved,
            WorkflowAction::Flag => ReturnStatus::Flagged,
            WorkflowAction::Reject(_) => ReturnStatus::Rejected,
            WorkflowAction::Complete => ReturnStatus::Completed,
        }
    }
}

/// Enumerated rejection reasons offered to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "code", content = "detail")]
pub enum RejectionReason {
    OutsideReturnWindow,
    ItemNotEligible,
    ItemDamaged,
    ItemUsed,
    MissingItems,
    SuspectedFraud,
    Other(String),
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::OutsideReturnWindow => "outside the return window".to_string(),
            RejectionReason::ItemNotEligible => "item not eligible for return".to_string(),
            RejectionReason::ItemDamaged => "item returned damaged".to_string(),
            RejectionReason::ItemUsed => "item shows signs of use".to_string(),
            RejectionReason::MissingItems => "returned package was missing items".to_string(),
            RejectionReason::SuspectedFraud => "suspected fraud".to_string(),
            RejectionReason::Other(detail) => detail.trim().to_string(),
        }
    }
}

/// Result of applying an action to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: ReturnStatus, to: ReturnStatus },
    /// The record already sat in the action's target state.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("cannot {action} a return that is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },
    #[error("rejections with reason 'other' require a description")]
    MissingRejectionDetail,
}

/// Decide the state change for `action` without touching any record.
pub fn transition(current: ReturnStatus, action: &WorkflowAction) -> Result<Transition, WorkflowError> {
    if let WorkflowAction::Reject(RejectionReason::Other(detail)) = action {
        if detail.trim().is_empty() {
            return Err(WorkflowError::MissingRejectionDetail);
        }
    }

    let target = action.target();
    if current == target {
        return Ok(Transition::Unchanged);
    }

    let allowed = matches!(
        (current, target),
        (ReturnStatus::Pending, ReturnStatus::Approved)
            | (ReturnStatus::Flagged, ReturnStatus::Approved)
            | (ReturnStatus::Pending, ReturnStatus::Flagged)
            | (ReturnStatus::Pending, ReturnStatus::Rejected)
            | (ReturnStatus::Flagged, ReturnStatus::Rejected)
            | (ReturnStatus::Approved, ReturnStatus::Completed)
    );

    if allowed {
        Ok(Transition::Moved {
            from: current,
            to: target,
        })
    } else {
        Err(WorkflowError::InvalidTransition {
            from: current.label(),
            action: action.label(),
        })
    }
}

/// Automatic action taken right after submission, if any.
///
/// A skipped fraud check leaves the record pending so a human sees it.
pub fn auto_action(assessment: &RiskAssessment, policy: &TenantPolicy) -> Option<WorkflowAction> {
    if assessment.skipped.is_some() {
        return None;
    }
    if assessment.is_high_risk && !policy.auto_approve_returns {
        Some(WorkflowAction::Flag)
    } else {
        Some(WorkflowAction::Approve)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Created,
    Approved,
    Flagged,
    Rejected,
    Completed,
    SettlementFailed,
}

/// One append-only audit entry on a return record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Append a timestamped note; existing notes are never overwritten.
pub(crate) fn append_note(existing: &mut String, note: &str, now: DateTime<Utc>) {
    let note = note.trim();
    if note.is_empty() {
        return;
    }
    if !existing.is_empty() {
        existing.push('\n');
    }
    existing.push('[');
    existing.push_str(&now.to_rfc3339_opts(SecondsFormat::Secs, true));
    existing.push_str("] ");
    existing.push_str(note);
}

impl ReturnRecord {
    /// Apply a workflow action, recording history and notes. No-op when already in the target state.
    pub fn apply(
        &mut self,
        action: &WorkflowAction,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Transition, WorkflowError> {
        let outcome = transition(self.status, action)?;
        let Transition::Moved { to, .. } = outcome else {
            return Ok(outcome);
        };

        let (kind, title) = match action {
            WorkflowAction::Approve => (HistoryKind::Approved, "Return approved".to_string()),
            WorkflowAction::Flag => (HistoryKind::Flagged, "Flagged for review".to_string()),
            WorkflowAction::Reject(reason) => (
                HistoryKind::Rejected,
                format!("Return rejected: {}", reason.summary()),
            ),
            WorkflowAction::Complete => (HistoryKind::Completed, "Return completed".to_string()),
        };

        if let WorkflowAction::Reject(reason) = action {
            self.rejection = Some(reason.clone());
        }

        self.status = to;
        self.status_changed_at = now;
        self.record_event(kind, title, actor, notes, now);
        Ok(outcome)
    }

    pub(crate) fn record_event(
        &mut self,
        kind: HistoryKind,
        title: String,
        actor: &str,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let notes = notes.map(str::trim).filter(|note| !note.is_empty());
        if let Some(note) = notes {
            append_note(&mut self.admin_notes, note, now);
        }
        self.history.push(HistoryEntry {
            kind,
            title,
            timestamp: now,
            user: actor.to_string(),
            notes: notes.map(str::to_string),
        });
        self.updated_at = now;
    }
}
