//! Error and issue types for rig synthesis.
//!
//! Two families live here:
//!
//! - [`RigError`]: fatal errors. Structural ones (cycle, missing origin) abort a
//!   run before anything is mutated; per-bone ones (invalid IK chain length) are
//!   collected by the stage that produced them.
//! - [`Issue`]: non-fatal findings produced by hierarchy validation, each with a
//!   stable code and a [`Severity`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for rig pipeline operations.
pub type RigResult<T> = Result<T, RigError>;

/// Fatal errors raised by the rig pipeline.
#[derive(Debug, Error)]
pub enum RigError {
    /// The object hierarchy contains a parent cycle.
    #[error("hierarchy contains a parent cycle through: {}", objects.join(" -> "))]
    Cycle { objects: Vec<String> },

    /// A mirrored group exists but no symmetric origin was supplied.
    #[error("mirrored group(s) {} require a symmetric origin object", groups.join(", "))]
    MissingOrigin { groups: Vec<String> },

    /// IK chain length is zero or exceeds the ancestor depth of the bone.
    #[error("IK chain length {requested} on bone '{bone}' exceeds available ancestor depth {available}")]
    InvalidChainLength {
        bone: String,
        requested: u32,
        available: u32,
    },

    /// Validation found blocking issues.
    #[error("hierarchy validation failed with {} blocking issue(s)", issues.len())]
    ValidationFailed { issues: Vec<Issue> },

    /// Referenced object is not part of the scene.
    #[error("unknown object '{id}'")]
    UnknownObject { id: String },

    /// Referenced bone is not part of the skeleton.
    #[error("unknown bone '{name}'")]
    UnknownBone { name: String },

    /// Proxy handle does not refer to an open widget edit session.
    #[error("no widget edit session for proxy handle {handle}")]
    UnknownProxy { handle: u64 },

    /// Two groups produced the same bone name.
    #[error("bone name '{name}' is produced by more than one group")]
    DuplicateBoneName { name: String },

    /// A source mesh could not be copied into the combined mesh.
    #[error("malformed mesh on object '{object}': {reason}")]
    MalformedMesh { object: String, reason: String },

    /// An operation needed a skeleton but none was built yet.
    #[error("no skeleton has been built for this document")]
    NoSkeleton,

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RigError {
    /// Returns the stable error code (e.g. "RIG_001").
    pub fn code(&self) -> &'static str {
        match self {
            RigError::Cycle { .. } => "RIG_001",
            RigError::MissingOrigin { .. } => "RIG_002",
            RigError::InvalidChainLength { .. } => "RIG_003",
            RigError::ValidationFailed { .. } => "RIG_004",
            RigError::UnknownObject { .. } => "RIG_005",
            RigError::UnknownBone { .. } => "RIG_006",
            RigError::UnknownProxy { .. } => "RIG_007",
            RigError::DuplicateBoneName { .. } => "RIG_008",
            RigError::MalformedMesh { .. } => "RIG_009",
            RigError::NoSkeleton => "RIG_010",
            RigError::Json(_) => "RIG_011",
            RigError::Io(_) => "RIG_012",
        }
    }

    /// Returns true for errors that abort the whole run rather than one bone.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RigError::Cycle { .. } | RigError::MissingOrigin { .. } | RigError::ValidationFailed { .. }
        )
    }

    pub(crate) fn unknown_bone(name: impl Into<String>) -> Self {
        RigError::UnknownBone { name: name.into() }
    }

    pub(crate) fn malformed_mesh(object: impl Into<String>, reason: impl Into<String>) -> Self {
        RigError::MalformedMesh {
            object: object.into(),
            reason: reason.into(),
        }
    }
}

/// Codes for hierarchy validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// I001: Parent cycle in the object hierarchy
    Cycle,
    /// I002: Mirrored group present without a symmetric origin
    MissingOrigin,
    /// I003: Two groups share a name at the same bone depth
    DuplicateGroupName,
    /// I004: Piston cylinder or rod has no partner
    MissingPistonPartner,
    /// I005: More than one cylinder or rod for a piston id
    DuplicatePistonPart,
    /// I006: Hinge group without a hinge pivot member
    ///
    /// Raised for a `Hinge_`-named group none of whose members is a
    /// `Hinge_` object. The bone head then falls back to the member
    /// centroid. A `Hinge_` object always pivots its own group, so it can
    /// never sit outside one.
    OrphanHinge,
    /// I007: Group members disagree on their parent group
    IncoherentGroup,
    /// I008: Requested root object does not exist
    UnknownRoot,
}

impl IssueCode {
    /// Returns the issue code string (e.g., "I001").
    pub fn code(&self) -> &'static str {
        match self {
            IssueCode::Cycle => "I001",
            IssueCode::MissingOrigin => "I002",
            IssueCode::DuplicateGroupName => "I003",
            IssueCode::MissingPistonPartner => "I004",
            IssueCode::DuplicatePistonPart => "I005",
            IssueCode::OrphanHinge => "I006",
            IssueCode::IncoherentGroup => "I007",
            IssueCode::UnknownRoot => "I008",
        }
    }

    /// Default severity for this code.
    pub fn severity(&self) -> Severity {
        match self {
            IssueCode::Cycle
            | IssueCode::MissingOrigin
            | IssueCode::DuplicateGroupName
            | IssueCode::UnknownRoot => Severity::Blocking,
            IssueCode::MissingPistonPartner | IssueCode::DuplicatePistonPart => Severity::Error,
            IssueCode::OrphanHinge | IssueCode::IncoherentGroup => Severity::Warning,
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How an issue affects a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; the build is unaffected.
    Warning,
    /// The affected feature is skipped; unrelated bones still build.
    Error,
    /// The build refuses to run.
    Blocking,
}

/// A validation finding with code, message and the group/object/id it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// The issue code.
    pub code: IssueCode,
    /// Severity, derived from the code.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Group name, object id or piston id the issue refers to.
    pub subject: String,
}

impl Issue {
    /// Creates a new issue with the code's default severity.
    pub fn new(code: IssueCode, message: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            message: message.into(),
            subject: subject.into(),
        }
    }

    /// Returns true if this issue prevents a build.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (at {})", self.code, self.message, self.subject)
    }
}
