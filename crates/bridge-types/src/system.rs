//! # System Identifiers
//!
//! The two independently deployed systems the bridge connects, and the
//! routing target that may address one of them or both.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;

/// Wire name of the broadcast target.
pub const BROADCAST_TARGET: &str = "both";

/// An external system owning events on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemId {
    /// System A: the workflow execution engine.
    Workflow,
    /// System B: the mutation and agent engine.
    Evolution,
}

impl SystemId {
    /// Every known system, in a stable order.
    pub const ALL: [SystemId; 2] = [SystemId::Workflow, SystemId::Evolution];

    /// Wire name of the system.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Evolution => "evolution",
        }
    }

    /// The system on the other side of the bridge.
    #[must_use]
    pub fn counterpart(&self) -> SystemId {
        match self {
            Self::Workflow => Self::Evolution,
            Self::Evolution => Self::Workflow,
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(Self::Workflow),
            "evolution" => Ok(Self::Evolution),
            BROADCAST_TARGET => Err(ValidationError::BroadcastSource),
            other => Err(ValidationError::UnknownSystem(other.to_string())),
        }
    }
}

/// Routing target of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Target {
    /// Deliver to subscribers of a single system.
    System(SystemId),
    /// Deliver to subscribers of every system.
    Both,
}

impl Target {
    /// Wire name of the target.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System(system) => system.as_str(),
            Self::Both => BROADCAST_TARGET,
        }
    }

    /// Whether this target addresses the given system.
    #[must_use]
    pub fn includes(&self, system: SystemId) -> bool {
        match self {
            Self::System(s) => *s == system,
            Self::Both => true,
        }
    }
}

impl From<SystemId> for Target {
    fn from(system: SystemId) -> Self {
        Self::System(system)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == BROADCAST_TARGET {
            return Ok(Self::Both);
        }
        match s {
            "workflow" => Ok(Self::System(SystemId::Workflow)),
            "evolution" => Ok(Self::System(SystemId::Evolution)),
            other => Err(ValidationError::UnknownTarget(other.to_string())),
        }
    }
}

impl TryFrom<String> for Target {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.as_str().to_string()
    }
}
