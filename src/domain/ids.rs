//! Domain identifier types with validation
//!
//! This module provides the hierarchy and entity-kind enums that route every
//! operation, and a newtype for the actor stamped into audit fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record hierarchy
///
/// Cabinet and other records are flat: line items hang directly off the
/// parent. Inpatient records are two-level: an aggregate parent owns child
/// records, and line items hang off the children.
///
/// # Examples
///
/// ```
/// use medsync::domain::ids::Hierarchy;
/// use std::str::FromStr;
///
/// let hierarchy = Hierarchy::from_str("inpatient").unwrap();
/// assert!(hierarchy.is_nested());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hierarchy {
    /// Cabinet replenishment exports
    Cabinet,
    /// Other (non-cabinet, non-inpatient) exports
    Other,
    /// Inpatient aggregate and child exports
    Inpatient,
}

impl Hierarchy {
    /// Lower-case name used in topics, logs and the CLI
    pub fn as_str(self) -> &'static str {
        match self {
            Hierarchy::Cabinet => "cabinet",
            Hierarchy::Other => "other",
            Hierarchy::Inpatient => "inpatient",
        }
    }

    /// Whether parents own child records rather than line items
    pub fn is_nested(self) -> bool {
        matches!(self, Hierarchy::Inpatient)
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hierarchy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cabinet" => Ok(Hierarchy::Cabinet),
            "other" => Ok(Hierarchy::Other),
            "inpatient" => Ok(Hierarchy::Inpatient),
            other => Err(format!(
                "Unknown hierarchy '{other}'. Must be one of: cabinet, other, inpatient"
            )),
        }
    }
}

/// Persisted entity kind, one table each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Cabinet replenishment parent
    Cabinet,
    /// Other export parent
    Other,
    /// Inpatient aggregate parent
    InpatientParent,
    /// Inpatient child record
    InpatientChild,
    /// Cabinet medicine line item
    CabinetLineItem,
    /// Other-export medicine line item
    OtherLineItem,
    /// Inpatient medicine line item
    InpatientLineItem,
}

impl EntityKind {
    /// Backing table name
    pub fn table_name(self) -> &'static str {
        match self {
            EntityKind::Cabinet => "cabinet_records",
            EntityKind::Other => "other_records",
            EntityKind::InpatientParent => "inpatient_records",
            EntityKind::InpatientChild => "inpatient_child_records",
            EntityKind::CabinetLineItem => "cabinet_line_items",
            EntityKind::OtherLineItem => "other_line_items",
            EntityKind::InpatientLineItem => "inpatient_line_items",
        }
    }

    /// Whether rows of this kind must reference a parent
    pub fn requires_parent(self) -> bool {
        !matches!(
            self,
            EntityKind::Cabinet | EntityKind::Other | EntityKind::InpatientParent
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Actor stamped into audit fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Creates a new ActorId
    ///
    /// # Errors
    ///
    /// Returns an error if the id is blank
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Actor ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the actor id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ActorId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ActorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
