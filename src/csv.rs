use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::Credits;
use crate::engine::EntityStore;
use crate::model::{
    Command, Decision, Project, ProjectFields, ProjectUpdate, RedemptionType, Role, User, UserId,
};

/// Errors that can occur when reading command rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open command file: {0}")]
    Open(csv::Error),

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: unrecognized {field} '{value}'")]
    UnrecognizedValue {
        line: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    actor: Option<UserId>,
    /// Project or redemption id; `;`-separated project ids for a bulk decision.
    target: Option<String>,
    decision: Option<String>,
    credits: Option<u32>,
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    comments: Option<String>,
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    user: &'a str,
    name: &'a str,
    role: Role,
    credits: Credits,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Project ID")]
    id: &'a str,
    #[serde(rename = "Submission Date")]
    submitted: String,
    #[serde(rename = "Student Name")]
    student: &'a str,
    #[serde(rename = "Project Title")]
    title: &'a str,
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Credits Awarded")]
    credits: Credits,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "GitHub Link")]
    link: &'a str,
}

fn required<T>(
    value: Option<T>,
    line: usize,
    op: &str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        op: op.to_string(),
        field,
    })
}

fn parse_decision(value: Option<String>, line: usize, op: &str) -> Result<Decision, CsvError> {
    let value = required(value, line, op, "decision")?;
    match value.to_ascii_lowercase().as_str() {
        "approved" | "approve" => Ok(Decision::Approved),
        "denied" | "deny" => Ok(Decision::Denied),
        _ => Err(CsvError::UnrecognizedValue {
            line,
            field: "decision",
            value,
        }),
    }
}

fn parse_kind(value: Option<String>, line: usize, op: &str) -> Result<RedemptionType, CsvError> {
    let value = required(value, line, op, "kind")?;
    match value.to_ascii_lowercase().as_str() {
        "alternative_assessment" => Ok(RedemptionType::AlternativeAssessment),
        "flexible_tutorial" => Ok(RedemptionType::FlexibleTutorial),
        _ => Err(CsvError::UnrecognizedValue {
            line,
            field: "kind",
            value,
        }),
    }
}

fn parse_row(line: usize, row: InputRow) -> Result<Command, CsvError> {
    let op = row.op.as_str();
    match op {
        "submit_project" => Ok(Command::SubmitProject {
            student: required(row.actor, line, op, "actor")?,
            fields: ProjectFields {
                title: row.title.unwrap_or_default(),
                description: row.description.unwrap_or_default(),
                github_link: row.link.unwrap_or_default(),
                screenshot: None,
            },
        }),
        "decide_project" => Ok(Command::DecideProject {
            project: required(row.target, line, op, "target")?,
            decision: parse_decision(row.decision, line, op)?,
            credits: Credits::new(row.credits.unwrap_or_default()),
            comments: row.comments,
        }),
        "bulk_decide" => Ok(Command::BulkDecideProjects {
            projects: required(row.target, line, op, "target")?
                .split(';')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            decision: parse_decision(row.decision, line, op)?,
            credits: Credits::new(row.credits.unwrap_or_default()),
        }),
        "update_project" => Ok(Command::UpdateProject {
            project: required(row.target, line, op, "target")?,
            update: ProjectUpdate {
                title: row.title,
                description: row.description,
                github_link: row.link,
            },
        }),
        "submit_redemption" => Ok(Command::SubmitRedemption {
            student: required(row.actor, line, op, "actor")?,
            kind: parse_kind(row.kind, line, op)?,
        }),
        "decide_redemption" => Ok(Command::DecideRedemption {
            redemption: required(row.target, line, op, "target")?,
            decision: parse_decision(row.decision, line, op)?,
        }),
        other => Err(CsvError::UnrecognizedOp {
            line,
            op: other.to_string(),
        }),
    }
}

/// Read commands from a csv file
pub fn read_commands(
    path: &Path,
) -> Result<impl Iterator<Item = Result<Command, CsvError>> + use<>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(CsvError::Open)?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        }))
}

/// Write user balances in csv format
pub fn write_balances<'a>(
    writer: impl io::Write,
    users: impl IntoIterator<Item = &'a User>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for user in users {
        writer.serialize(BalanceRow {
            user: &user.id,
            name: &user.name,
            role: user.role,
            credits: user.credits,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a project export. Students missing from the store are shown as `N/A`.
pub fn write_project_export<'a>(
    writer: impl io::Write,
    store: &EntityStore,
    projects: impl IntoIterator<Item = &'a Project>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for project in projects {
        let student = store
            .user(&project.student_id)
            .map(|u| u.name.as_str())
            .unwrap_or("N/A");
        writer.serialize(ExportRow {
            id: &project.id,
            submitted: project.submitted_at.format("%Y-%m-%d").to_string(),
            student,
            title: &project.title,
            status: project.status.to_string(),
            credits: project.credits_awarded,
            description: &project.description,
            link: &project.github_link,
        })?;
    }
    writer.flush()?;
    Ok(())
}
