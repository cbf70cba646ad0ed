//! # Event Kinds
//!
//! The closed set of event kinds that may travel over the bus, together with
//! the static priority classification table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Every event kind the bus accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // =========================================================================
    // EVOLUTION SYSTEM
    // =========================================================================
    /// A mutation was proposed and awaits assessment.
    #[serde(rename = "mutation.proposed")]
    MutationProposed,
    /// A mutation was applied (the "change-applied" event).
    #[serde(rename = "mutation.applied")]
    MutationApplied,
    /// A previously applied mutation was reverted.
    #[serde(rename = "mutation.rolled_back")]
    MutationRolledBack,
    /// An agent received a new configuration.
    #[serde(rename = "agent.configured")]
    AgentConfigured,
    /// Performance data for a workflow run was recorded.
    #[serde(rename = "performance.recorded")]
    PerformanceRecorded,

    // =========================================================================
    // WORKFLOW SYSTEM
    // =========================================================================
    /// A workflow run started.
    #[serde(rename = "workflow.started")]
    WorkflowStarted,
    /// A workflow run completed successfully.
    #[serde(rename = "workflow.completed")]
    WorkflowCompleted,
    /// A workflow run failed.
    #[serde(rename = "workflow.failed")]
    WorkflowFailed,
    /// Workflow parameters were adjusted.
    #[serde(rename = "workflow.updated")]
    WorkflowUpdated,

    // =========================================================================
    // CROSS-CUTTING (optimization group)
    // =========================================================================
    /// A monitored metric crossed its threshold.
    #[serde(rename = "threshold.exceeded")]
    ThresholdExceeded,
    /// An optimization was suggested.
    #[serde(rename = "optimization.suggested")]
    OptimizationSuggested,
    /// Self-healing started.
    #[serde(rename = "healing.started")]
    HealingStarted,
    /// Self-healing finished.
    #[serde(rename = "healing.completed")]
    HealingCompleted,
}

/// Delivery priority derived from the event kind.
///
/// Metadata only: nothing in the bus orders or throttles by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl EventType {
    /// All event kinds.
    pub const ALL: [EventType; 13] = [
        EventType::MutationProposed,
        EventType::MutationApplied,
        EventType::MutationRolledBack,
        EventType::AgentConfigured,
        EventType::PerformanceRecorded,
        EventType::WorkflowStarted,
        EventType::WorkflowCompleted,
        EventType::WorkflowFailed,
        EventType::WorkflowUpdated,
        EventType::ThresholdExceeded,
        EventType::OptimizationSuggested,
        EventType::HealingStarted,
        EventType::HealingCompleted,
    ];

    /// Kinds that are also delivered to the optimization group, whatever
    /// their target.
    pub const OPTIMIZATION_GROUP: [EventType; 3] = [
        EventType::ThresholdExceeded,
        EventType::OptimizationSuggested,
        EventType::HealingStarted,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MutationProposed => "mutation.proposed",
            Self::MutationApplied => "mutation.applied",
            Self::MutationRolledBack => "mutation.rolled_back",
            Self::AgentConfigured => "agent.configured",
            Self::PerformanceRecorded => "performance.recorded",
            Self::WorkflowStarted => "workflow.started",
            Self::WorkflowCompleted => "workflow.completed",
            Self::WorkflowFailed => "workflow.failed",
            Self::WorkflowUpdated => "workflow.updated",
            Self::ThresholdExceeded => "threshold.exceeded",
            Self::OptimizationSuggested => "optimization.suggested",
            Self::HealingStarted => "healing.started",
            Self::HealingCompleted => "healing.completed",
        }
    }

    /// Static priority classification.
    #[must_use]
    pub fn priority(&self) -> Priority {
        match self {
            Self::ThresholdExceeded | Self::HealingStarted => Priority::Critical,
            Self::MutationApplied
            | Self::MutationRolledBack
            | Self::WorkflowFailed
            | Self::HealingCompleted => Priority::High,
            Self::MutationProposed | Self::WorkflowCompleted | Self::OptimizationSuggested => {
                Priority::Medium
            }
            Self::WorkflowStarted
            | Self::WorkflowUpdated
            | Self::AgentConfigured
            | Self::PerformanceRecorded => Priority::Low,
        }
    }

    /// Whether the optimization group also receives this kind.
    #[must_use]
    pub fn is_optimization_relevant(&self) -> bool {
        Self::OPTIMIZATION_GROUP.contains(self)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownEventType(s.to_string()))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => f.write_str("critical"),
            Self::High => f.write_str("high"),
            Self::Medium => f.write_str("medium"),
            Self::Low => f.write_str("low"),
        }
    }
}
