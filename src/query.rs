//! Read projections for the review screens: filtering, search, sorting and paging.

use std::cmp::Ordering;

use crate::engine::EntityStore;
use crate::model::{Project, RedemptionRequest, Role, Status, User, UserId};

/// Rows per page of the review list.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest submission first.
    #[default]
    DateDesc,
    DateAsc,
    StudentAsc,
    StudentDesc,
}

/// Which projects to list and in what order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectQuery {
    /// `None` lists every status.
    pub status: Option<Status>,
    pub student: Option<UserId>,
    /// Case-insensitive match on project title or student name.
    pub search: Option<String>,
    pub sort: SortOrder,
}

impl Default for ProjectQuery {
    fn default() -> Self {
        Self {
            status: Some(Status::Pending),
            student: None,
            search: None,
            sort: SortOrder::default(),
        }
    }
}

impl ProjectQuery {
    pub fn all() -> Self {
        Self {
            status: None,
            ..Default::default()
        }
    }
}

fn student_name<'a>(store: &'a EntityStore, id: &str) -> &'a str {
    store.user(id).map(|u| u.name.as_str()).unwrap_or("")
}

pub fn projects<'a>(store: &'a EntityStore, query: &ProjectQuery) -> Vec<&'a Project> {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut found: Vec<&Project> = store
        .projects()
        .filter(|p| query.status.is_none_or(|s| p.status == s))
        .filter(|p| query.student.as_ref().is_none_or(|s| &p.student_id == s))
        .filter(|p| match &search {
            None => true,
            Some(needle) => {
                p.title.to_lowercase().contains(needle)
                    || student_name(store, &p.student_id)
                        .to_lowercase()
                        .contains(needle)
            }
        })
        .collect();

    let newest_first =
        |a: &Project, b: &Project| b.submitted_at.cmp(&a.submitted_at).then(a.id.cmp(&b.id));
    let by_name = |a: &Project, b: &Project| -> Ordering {
        student_name(store, &a.student_id).cmp(student_name(store, &b.student_id))
    };
    found.sort_by(|&a, &b| match query.sort {
        SortOrder::DateDesc => newest_first(a, b),
        SortOrder::DateAsc => newest_first(b, a),
        SortOrder::StudentAsc => by_name(a, b).then_with(|| newest_first(a, b)),
        SortOrder::StudentDesc => by_name(b, a).then_with(|| newest_first(a, b)),
    });
    found
}

/// One page of a list.
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based.
    pub page: usize,
    pub total_pages: usize,
}

/// Slice `items` into [`PAGE_SIZE`] pages. Pages start at 1; page 0 is treated as 1.
pub fn paginate<T>(items: &[T], page: usize) -> Page<'_, T> {
    let page = page.max(1);
    let total_pages = items.len().div_ceil(PAGE_SIZE);
    let start = (page - 1).saturating_mul(PAGE_SIZE).min(items.len());
    let end = (start + PAGE_SIZE).min(items.len());
    Page {
        items: &items[start..end],
        page,
        total_pages,
    }
}

/// Redemption requests with the given status, newest first.
pub fn redemptions_by_status(store: &EntityStore, status: Status) -> Vec<&RedemptionRequest> {
    let mut found: Vec<_> = store.redemptions().filter(|r| r.status == status).collect();
    found.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(a.id.cmp(&b.id)));
    found
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingCounts {
    pub projects: usize,
    pub redemptions: usize,
}

pub fn pending_counts(store: &EntityStore) -> PendingCounts {
    PendingCounts {
        projects: store.projects().filter(|p| p.status.is_pending()).count(),
        redemptions: store
            .redemptions()
            .filter(|r| r.status.is_pending())
            .count(),
    }
}

/// Every student, by name.
pub fn students(store: &EntityStore) -> Vec<&User> {
    let mut found: Vec<_> = store.users().filter(|u| u.role == Role::Student).collect();
    found.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    found
}

/// Students whose name contains `query`, ignoring case. A blank query finds nobody.
pub fn search_students<'a>(store: &'a EntityStore, query: &str) -> Vec<&'a User> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    students(store)
        .into_iter()
        .filter(|u| u.name.to_lowercase().contains(&needle))
        .collect()
}

/// A student's own projects, newest first.
pub fn student_projects<'a>(store: &'a EntityStore, student: &str) -> Vec<&'a Project> {
    projects(
        store,
        &ProjectQuery {
            student: Some(student.to_string()),
            ..ProjectQuery::all()
        },
    )
}

/// A student's own redemption requests, newest first.
pub fn student_redemptions<'a>(
    store: &'a EntityStore,
    student: &str,
) -> Vec<&'a RedemptionRequest> {
    let mut found: Vec<_> = store
        .redemptions()
        .filter(|r| r.student_id == student)
        .collect();
    found.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(a.id.cmp(&b.id)));
    found
}
