//! Managed resource conditions
//!
//! Every managed resource reports two conditions, in the same shape Crossplane
//! uses so that `kubectl get` printer columns and tooling agree:
//! - `Ready`: whether the external resource is usable (`Available`,
//!   `Unavailable`, `Creating`, `Deleting`)
//! - `Synced`: whether the last reconcile pass succeeded (`ReconcileSuccess`,
//!   `ReconcileError`)

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type
///
/// Types written by other tooling decode as `Other`, so foreign conditions
/// survive a round trip through the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ConditionType {
    /// The external resource is ready for use
    Ready,
    /// The managed resource is in sync with the external resource
    Synced,
    Other(String),
}

impl ConditionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "Ready",
            Self::Synced => "Synced",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ConditionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Ready" => Self::Ready,
            "Synced" => Self::Synced,
            _ => Self::Other(value),
        }
    }
}

impl From<ConditionType> for String {
    fn from(value: ConditionType) -> Self {
        value.as_str().to_string()
    }
}

/// Condition status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
    /// Not yet determined
    Unknown,
}

/// Reason a condition has its current status
///
/// Unlisted reasons (`ReconcilePaused` and friends) are kept as `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum ConditionReason {
    /// External resource is available
    Available,
    /// External resource is not available
    Unavailable,
    /// External resource is being created
    Creating,
    /// External resource is being deleted
    Deleting,
    /// Last reconcile pass succeeded
    ReconcileSuccess,
    /// Last reconcile pass failed
    ReconcileError,
    Other(String),
}

impl ConditionReason {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "Available",
            Self::Unavailable => "Unavailable",
            Self::Creating => "Creating",
            Self::Deleting => "Deleting",
            Self::ReconcileSuccess => "ReconcileSuccess",
            Self::ReconcileError => "ReconcileError",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ConditionReason {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Available" => Self::Available,
            "Unavailable" => Self::Unavailable,
            "Creating" => Self::Creating,
            "Deleting" => Self::Deleting,
            "ReconcileSuccess" => Self::ReconcileSuccess,
            "ReconcileError" => Self::ReconcileError,
            _ => Self::Other(value),
        }
    }
}

impl From<ConditionReason> for String {
    fn from(value: ConditionReason) -> Self {
        value.as_str().to_string()
    }
}

/// A single observation of a managed resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub type_: ConditionType,

    /// Condition status
    pub status: ConditionStatus,

    /// Last time the status changed
    pub last_transition_time: DateTime<Utc>,

    /// Machine readable reason
    #[schemars(with = "String")]
    pub reason: ConditionReason,

    /// Human readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn new(type_: ConditionType, status: ConditionStatus, reason: ConditionReason) -> Self {
        Self {
            type_,
            status,
            last_transition_time: Utc::now(),
            reason,
            message: None,
        }
    }

    /// `Ready=True`, the external resource is available
    pub fn available() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, ConditionReason::Available)
    }

    /// `Ready=False`, the external resource exists but is not available
    pub fn unavailable() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Unavailable)
    }

    /// `Ready=False`, the external resource is being created
    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Creating)
    }

    /// `Ready=False`, the external resource is being deleted
    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Deleting)
    }

    /// `Synced=True`
    pub fn reconcile_success() -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::True, ConditionReason::ReconcileSuccess)
    }

    /// `Synced=False` carrying the error message
    pub fn reconcile_error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(ConditionType::Synced, ConditionStatus::False, ConditionReason::ReconcileError)
        }
    }

    /// Equal apart from the transition time
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Replaces the condition of the same type, keeping the existing one (and its
/// transition time) when nothing but the timestamp would change.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.equivalent(&condition) => {}
        Some(existing) => *existing = condition,
        None => conditions.push(condition),
    }
}

/// Looks up the condition of the given type
pub fn get_condition(conditions: &[Condition], type_: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}
