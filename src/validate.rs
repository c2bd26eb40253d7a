//! Input checks for project submissions and edits.

use regex::Regex;
use std::sync::LazyLock;

use crate::engine::ValidationError;
use crate::model::{ProjectFields, ProjectUpdate};

/// Longest accepted project description, in UTF-16 code units.
pub const MAX_DESCRIPTION_LEN: usize = 500;

static GITHUB_REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://)?(www\.)?github\.com/[a-zA-Z0-9-]+/[a-zA-Z0-9._-]+/?$")
        .expect("github url pattern is valid")
});

pub fn title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::MissingField("title"));
    }
    Ok(())
}

pub fn description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        return Err(ValidationError::MissingField("description"));
    }
    let len = description.encode_utf16().count();
    if len > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(())
}

pub fn github_link(link: &str) -> Result<(), ValidationError> {
    if link.trim().is_empty() {
        return Err(ValidationError::MissingField("github_link"));
    }
    if !GITHUB_REPO_URL.is_match(link) {
        return Err(ValidationError::InvalidGithubLink(link.to_string()));
    }
    Ok(())
}

/// Check every field of a new submission, reporting the first failure.
pub fn project_fields(fields: &ProjectFields) -> Result<(), ValidationError> {
    title(&fields.title)?;
    description(&fields.description)?;
    github_link(&fields.github_link)
}

/// Check the fields present in an edit.
pub fn project_update(update: &ProjectUpdate) -> Result<(), ValidationError> {
    if update.is_empty() {
        return Err(ValidationError::EmptyUpdate);
    }
    if let Some(t) = &update.title {
        title(t)?;
    }
    if let Some(d) = &update.description {
        description(d)?;
    }
    if let Some(l) = &update.github_link {
        github_link(l)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, description: &str, link: &str) -> ProjectFields {
        ProjectFields {
            title: title.to_string(),
            description: description.to_string(),
            github_link: link.to_string(),
            screenshot: None,
        }
    }

    #[test]
    fn accepts_well_formed_submission() {
        let f = fields("Parser", "A tiny parser", "https://github.com/alice/parser");
        assert!(project_fields(&f).is_ok());
    }

    #[test]
    fn github_link_variants() {
        for ok in [
            "https://github.com/alice/parser",
            "http://www.github.com/alice/parser/",
            "github.com/alice-b/my.repo_v2",
        ] {
            assert!(github_link(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in [
            "https://gitlab.com/alice/parser",
            "https://github.com/alice",
            "https://github.com/alice/parser/tree/main",
            "ftp://github.com/alice/parser",
        ] {
            assert!(
                matches!(github_link(bad), Err(ValidationError::InvalidGithubLink(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn blank_fields_are_missing() {
        let f = fields("   ", "desc", "https://github.com/a/b");
        assert!(matches!(
            project_fields(&f),
            Err(ValidationError::MissingField("title"))
        ));
        let f = fields("t", "", "https://github.com/a/b");
        assert!(matches!(
            project_fields(&f),
            Err(ValidationError::MissingField("description"))
        ));
        let f = fields("t", "d", "");
        assert!(matches!(
            project_fields(&f),
            Err(ValidationError::MissingField("github_link"))
        ));
    }

    #[test]
    fn description_length_is_bounded() {
        let at_limit = "x".repeat(MAX_DESCRIPTION_LEN);
        assert!(description(&at_limit).is_ok());

        let over = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(matches!(
            description(&over),
            Err(ValidationError::DescriptionTooLong { len: 501, max: 500 })
        ));
    }

    #[test]
    fn description_length_counts_utf16_units() {
        let accented = "é".repeat(MAX_DESCRIPTION_LEN);
        assert!(description(&accented).is_ok());

        // each emoji is a surrogate pair
        let emoji = "🦀".repeat(MAX_DESCRIPTION_LEN / 2);
        assert!(description(&emoji).is_ok());
        assert_eq!(
            description(&format!("{emoji}🦀")),
            Err(ValidationError::DescriptionTooLong { len: 502, max: 500 })
        );
    }

    #[test]
    fn update_checks_only_present_fields() {
        let update = ProjectUpdate {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        assert!(project_update(&update).is_ok());

        let update = ProjectUpdate {
            github_link: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            project_update(&update),
            Err(ValidationError::InvalidGithubLink(_))
        ));

        assert!(matches!(
            project_update(&ProjectUpdate::default()),
            Err(ValidationError::EmptyUpdate)
        ));
    }
}
