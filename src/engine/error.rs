//! Error types for workflow transactions.

use thiserror::Error;

use crate::Credits;
use crate::model::{ProjectId, RedemptionId, Status, UserId};

/// Top-level error returned by the [`Engine`](super::Engine) operations.
///
/// Every variant is recoverable: nothing was written when an error is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    InvalidState(#[from] InvalidStateError),

    #[error("{0}")]
    InsufficientCredits(#[from] InsufficientCreditsError),

    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("redemption {0} not found")]
    RedemptionNotFound(RedemptionId),

    #[error("user {0} not found")]
    UnknownUser(UserId),

    #[error("user {0} is not a student")]
    NotAStudent(UserId),

    #[error("generated id {0} is already in use")]
    DuplicateId(String),

    #[error("crediting {credits} to {user} would overflow balance {balance}")]
    BalanceOverflow {
        user: UserId,
        balance: Credits,
        credits: Credits,
    },
}

/// Malformed caller input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("description is {len} units long, at most {max} allowed")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("'{0}' is not a GitHub repository URL")]
    InvalidGithubLink(String),

    #[error("update changes no field")]
    EmptyUpdate,

    #[error("approval requires a positive credit award")]
    NonPositiveCredits,

    #[error("denial requires comments")]
    MissingComments,
}

/// The decision being attempted when an [`InvalidStateError`] occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionTarget {
    Project,
    Redemption,
}

/// A decision was attempted on an entity that is no longer pending.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{target:?} {id} is already {status}")]
pub struct InvalidStateError {
    pub target: DecisionTarget,
    pub id: String,
    pub status: Status,
}

/// A redemption costs more than the student's available balance.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("user {user} has {available} credits, {required} required")]
pub struct InsufficientCreditsError {
    pub user: UserId,
    pub available: Credits,
    pub required: Credits,
}

/// A seeded catalog that breaks a store invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate id {0}")]
    DuplicateId(String),

    #[error("{entity} belongs to unknown user {owner}")]
    UnknownOwner { entity: String, owner: UserId },

    #[error("{entity} belongs to {owner}, who is not a student")]
    OwnerNotStudent { entity: String, owner: UserId },

    #[error("project {0} awards credits inconsistently with its status")]
    AwardMismatch(ProjectId),

    #[error("redemption {0} costs a different amount than its type")]
    CostMismatch(RedemptionId),
}
