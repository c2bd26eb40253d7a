//! Demo catalog the exchange starts from.

use chrono::{DateTime, Utc};

use crate::Credits;
use crate::engine::{Catalog, CatalogError, EntityStore};
use crate::model::{Project, RedemptionRequest, RedemptionType, Status, User};

fn at(unix_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs, 0).unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn project(
    id: &str,
    student: &str,
    title: &str,
    description: &str,
    repo: &str,
    status: Status,
    awarded: u32,
    submitted_at: i64,
    comments: Option<&str>,
) -> Project {
    Project {
        id: id.to_string(),
        student_id: student.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        github_link: format!("https://github.com/{repo}"),
        screenshot: None,
        status,
        credits_awarded: Credits::new(awarded),
        submitted_at: at(submitted_at),
        faculty_comments: comments.map(str::to_string),
    }
}

fn redemption(
    id: &str,
    student: &str,
    kind: RedemptionType,
    status: Status,
    requested_at: i64,
) -> RedemptionRequest {
    RedemptionRequest {
        id: id.to_string(),
        student_id: student.to_string(),
        kind,
        credits_cost: kind.credits_cost(),
        status,
        requested_at: at(requested_at),
    }
}

/// Three students, one faculty member, and a mix of decided and pending work.
pub fn demo_catalog() -> Catalog {
    Catalog {
        users: vec![
            User::student("student1", "Alice Johnson", 25),
            User::student("student2", "Ben Carter", 10),
            User::student("student3", "Chloe Kim", 40),
            User::faculty("faculty1", "Dr. Evelyn Reed"),
        ],
        projects: vec![
            project(
                "p-101",
                "student1",
                "Weather Dashboard",
                "Forecast dashboard backed by a public weather API.",
                "alicej/weather-dashboard",
                Status::Approved,
                15,
                1_725_000_000,
                Some("Clean code, good tests."),
            ),
            project(
                "p-102",
                "student1",
                "Recipe Finder API",
                "REST API that matches recipes to pantry contents.",
                "alicej/recipe-finder",
                Status::Pending,
                0,
                1_725_600_000,
                None,
            ),
            project(
                "p-103",
                "student2",
                "Chess Engine",
                "Minimax chess engine with alpha-beta pruning.",
                "bencarter/chess-engine",
                Status::Pending,
                0,
                1_725_700_000,
                None,
            ),
            project(
                "p-104",
                "student3",
                "Portfolio Site",
                "Personal portfolio built from a template.",
                "chloek/portfolio",
                Status::Denied,
                0,
                1_724_900_000,
                Some("Needs more original work."),
            ),
            project(
                "p-105",
                "student3",
                "Inventory Tracker",
                "Inventory tracker for the campus makerspace.",
                "chloek/inventory-tracker",
                Status::Approved,
                20,
                1_724_800_000,
                None,
            ),
        ],
        redemptions: vec![
            redemption(
                "r-201",
                "student3",
                RedemptionType::AlternativeAssessment,
                Status::Pending,
                1_725_800_000,
            ),
            redemption(
                "r-202",
                "student1",
                RedemptionType::FlexibleTutorial,
                Status::Approved,
                1_725_100_000,
            ),
        ],
    }
}

/// Store loaded with [`demo_catalog`].
pub fn demo_store() -> Result<EntityStore, CatalogError> {
    EntityStore::from_catalog(demo_catalog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_catalog_is_consistent() {
        let store = demo_store().unwrap();
        assert_eq!(store.users().count(), 4);
        assert_eq!(store.projects().count(), 5);
        assert_eq!(store.redemptions().count(), 2);
        assert_eq!(store.pending_redemption_cost(), Credits::new(10));
    }

    #[test]
    fn demo_ids_do_not_collide_with_generated_ids() {
        let store = demo_store().unwrap();
        assert!(!store.contains_id("proj1"));
        assert!(!store.contains_id("redeem1"));
    }
}
