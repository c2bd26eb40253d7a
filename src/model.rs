//! Core domain types for the credit exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Credits;

/// User identifier.
pub type UserId = String;

/// Project identifier.
pub type ProjectId = String;

/// Redemption request identifier.
pub type RedemptionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Student,
    Faculty,
}

/// Review status shared by projects and redemption requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Pending,
    Approved,
    Denied,
}

impl Status {
    pub fn is_pending(self) -> bool {
        self == Status::Pending
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Pending => "Pending",
            Status::Approved => "Approved",
            Status::Denied => "Denied",
        })
    }
}

/// A faculty decision. Only the two terminal statuses can be chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Denied,
}

impl From<Decision> for Status {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => Status::Approved,
            Decision::Denied => Status::Denied,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Status::from(*self).fmt(f)
    }
}

/// The academic flexibility a student can spend credits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RedemptionType {
    AlternativeAssessment,
    FlexibleTutorial,
}

impl RedemptionType {
    /// Price of this redemption, fixed per type.
    pub const fn credits_cost(self) -> Credits {
        match self {
            RedemptionType::AlternativeAssessment => Credits::new(10),
            RedemptionType::FlexibleTutorial => Credits::new(5),
        }
    }
}

impl fmt::Display for RedemptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedemptionType::AlternativeAssessment => "Alternative Assessment",
            RedemptionType::FlexibleTutorial => "Flexible Tutorial",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub credits: Credits,
}

impl User {
    pub fn student(id: impl Into<UserId>, name: impl Into<String>, credits: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Student,
            credits: Credits::new(credits),
        }
    }

    pub fn faculty(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: Role::Faculty,
            credits: Credits::ZERO,
        }
    }
}

/// A student project awaiting or past faculty review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub student_id: UserId,
    pub title: String,
    pub description: String,
    pub github_link: String,
    /// Opaque reference to an uploaded screenshot.
    pub screenshot: Option<String>,
    pub status: Status,
    /// Non-zero exactly when the project is approved.
    pub credits_awarded: Credits,
    pub submitted_at: DateTime<Utc>,
    pub faculty_comments: Option<String>,
}

/// A request to spend credits on academic flexibility.
///
/// The cost is debited from the student when the request is created and
/// refunded only if the request is denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionRequest {
    pub id: RedemptionId,
    pub student_id: UserId,
    pub kind: RedemptionType,
    pub credits_cost: Credits,
    pub status: Status,
    pub requested_at: DateTime<Utc>,
}

/// Student-supplied fields of a new project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectFields {
    pub title: String,
    pub description: String,
    pub github_link: String,
    pub screenshot: Option<String>,
}

/// Faculty edit of a project's descriptive fields. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub github_link: Option<String>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.github_link.is_none()
    }
}

/// An operation requested of the engine, as read from a command stream.
#[derive(Debug, Clone)]
pub enum Command {
    SubmitProject {
        student: UserId,
        fields: ProjectFields,
    },
    DecideProject {
        project: ProjectId,
        decision: Decision,
        credits: Credits,
        comments: Option<String>,
    },
    BulkDecideProjects {
        projects: Vec<ProjectId>,
        decision: Decision,
        credits: Credits,
    },
    UpdateProject {
        project: ProjectId,
        update: ProjectUpdate,
    },
    SubmitRedemption {
        student: UserId,
        kind: RedemptionType,
    },
    DecideRedemption {
        redemption: RedemptionId,
        decision: Decision,
    },
}
