use std::collections::{HashMap, HashSet};
use tokio::sync::broadcast;

use super::error::{CatalogError, EngineError, InsufficientCreditsError};
use crate::Credits;
use crate::model::{
    Project, ProjectId, ProjectUpdate, RedemptionId, RedemptionRequest, Role, Status, User,
    UserId,
};

const EVENT_CAPACITY: usize = 256;

/// A change applied to the store, broadcast to subscribers after it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ProjectCreated(ProjectId),
    ProjectDecided { project: ProjectId, status: Status },
    ProjectUpdated(ProjectId),
    RedemptionCreated(RedemptionId),
    RedemptionDecided { redemption: RedemptionId, status: Status },
    BalanceChanged { user: UserId, delta: i64, balance: Credits },
}

/// Initial contents of a store.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub redemptions: Vec<RedemptionRequest>,
}

/// Users, projects and redemption requests keyed by id.
///
/// Reads are public. Writes are crate-private so that only the engine can
/// move balances or statuses.
#[derive(Debug)]
pub struct EntityStore {
    users: HashMap<UserId, User>,
    projects: HashMap<ProjectId, Project>,
    redemptions: HashMap<RedemptionId, RedemptionRequest>,
    events: broadcast::Sender<StoreEvent>,
}

impl EntityStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            users: HashMap::new(),
            projects: HashMap::new(),
            redemptions: HashMap::new(),
            events,
        }
    }

    /// Build a store from a catalog, rejecting anything that breaks an invariant:
    /// - ids are unique across all entities
    /// - projects and redemptions belong to known students
    /// - a project awards credits exactly when approved
    /// - a redemption costs what its type costs
    pub fn from_catalog(catalog: Catalog) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let ids = catalog
            .users
            .iter()
            .map(|u| &u.id)
            .chain(catalog.projects.iter().map(|p| &p.id))
            .chain(catalog.redemptions.iter().map(|r| &r.id));
        for id in ids {
            if !seen.insert(id.as_str()) {
                return Err(CatalogError::DuplicateId(id.clone()));
            }
        }

        let mut store = Self::new();
        store.users = catalog
            .users
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        for project in &catalog.projects {
            store.check_owner(&project.id, &project.student_id)?;
            let approved = project.status == Status::Approved;
            if approved == project.credits_awarded.is_zero() {
                return Err(CatalogError::AwardMismatch(project.id.clone()));
            }
        }
        for redemption in &catalog.redemptions {
            store.check_owner(&redemption.id, &redemption.student_id)?;
            if redemption.credits_cost != redemption.kind.credits_cost() {
                return Err(CatalogError::CostMismatch(redemption.id.clone()));
            }
        }

        store.projects = catalog
            .projects
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        store.redemptions = catalog
            .redemptions
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();
        Ok(store)
    }

    fn check_owner(&self, entity: &str, owner: &str) -> Result<(), CatalogError> {
        match self.users.get(owner) {
            None => Err(CatalogError::UnknownOwner {
                entity: entity.to_string(),
                owner: owner.to_string(),
            }),
            Some(user) if user.role != Role::Student => Err(CatalogError::OwnerNotStudent {
                entity: entity.to_string(),
                owner: owner.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Receive every change applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> + '_ {
        self.users.values()
    }

    pub fn project(&self, id: &str) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> + '_ {
        self.projects.values()
    }

    pub fn redemption(&self, id: &str) -> Option<&RedemptionRequest> {
        self.redemptions.get(id)
    }

    pub fn redemptions(&self) -> impl Iterator<Item = &RedemptionRequest> + '_ {
        self.redemptions.values()
    }

    /// Whether any entity already uses `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.users.contains_key(id)
            || self.projects.contains_key(id)
            || self.redemptions.contains_key(id)
    }

    /// Sum of every user's balance.
    pub fn total_balance(&self) -> Credits {
        self.users.values().map(|u| u.credits).sum()
    }

    /// Credits currently on hold for pending redemptions.
    pub fn pending_redemption_cost(&self) -> Credits {
        self.redemptions
            .values()
            .filter(|r| r.status.is_pending())
            .map(|r| r.credits_cost)
            .sum()
    }

    /// Balance `user` would hold after being credited `amount`.
    pub(crate) fn balance_after_credit(
        &self,
        user: &str,
        amount: Credits,
    ) -> Result<Credits, EngineError> {
        let account = self
            .users
            .get(user)
            .ok_or_else(|| EngineError::UnknownUser(user.to_string()))?;
        account
            .credits
            .checked_add(amount)
            .ok_or_else(|| EngineError::BalanceOverflow {
                user: user.to_string(),
                balance: account.credits,
                credits: amount,
            })
    }

    /// Balance `user` would hold after being debited `amount`.
    pub(crate) fn balance_after_debit(
        &self,
        user: &str,
        amount: Credits,
    ) -> Result<Credits, EngineError> {
        let account = self
            .users
            .get(user)
            .ok_or_else(|| EngineError::UnknownUser(user.to_string()))?;
        let balance = account
            .credits
            .checked_sub(amount)
            .ok_or_else(|| InsufficientCreditsError {
                user: user.to_string(),
                available: account.credits,
                required: amount,
            })?;
        Ok(balance)
    }

    fn emit(&self, event: StoreEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Writers, reserved for the engine.
impl EntityStore {
    /// Add `amount` to a user's balance, returning the new balance. Nothing changes on error.
    pub(crate) fn credit(&mut self, user: &str, amount: Credits) -> Result<Credits, EngineError> {
        let balance = self.balance_after_credit(user, amount)?;
        if let Some(account) = self.users.get_mut(user) {
            account.credits = balance;
        }
        self.emit(StoreEvent::BalanceChanged {
            user: user.to_string(),
            delta: i64::from(amount.get()),
            balance,
        });
        Ok(balance)
    }

    /// Remove `amount` from a user's balance. Nothing changes on error.
    pub(crate) fn debit(&mut self, user: &str, amount: Credits) -> Result<Credits, EngineError> {
        let balance = self.balance_after_debit(user, amount)?;
        if let Some(account) = self.users.get_mut(user) {
            account.credits = balance;
        }
        self.emit(StoreEvent::BalanceChanged {
            user: user.to_string(),
            delta: -i64::from(amount.get()),
            balance,
        });
        Ok(balance)
    }

    pub(crate) fn insert_project(&mut self, project: Project) {
        let id = project.id.clone();
        self.projects.insert(id.clone(), project);
        self.emit(StoreEvent::ProjectCreated(id));
    }

    pub(crate) fn insert_redemption(&mut self, redemption: RedemptionRequest) {
        let id = redemption.id.clone();
        self.redemptions.insert(id.clone(), redemption);
        self.emit(StoreEvent::RedemptionCreated(id));
    }

    /// Move a project to a terminal status. Returns false if the project is unknown.
    pub(crate) fn record_project_decision(
        &mut self,
        id: &str,
        status: Status,
        award: Credits,
        comments: Option<String>,
    ) -> bool {
        let Some(project) = self.projects.get_mut(id) else {
            return false;
        };
        project.status = status;
        project.credits_awarded = award;
        project.faculty_comments = comments;
        self.emit(StoreEvent::ProjectDecided {
            project: id.to_string(),
            status,
        });
        true
    }

    pub(crate) fn record_redemption_decision(&mut self, id: &str, status: Status) -> bool {
        let Some(redemption) = self.redemptions.get_mut(id) else {
            return false;
        };
        redemption.status = status;
        self.emit(StoreEvent::RedemptionDecided {
            redemption: id.to_string(),
            status,
        });
        true
    }

    pub(crate) fn update_project(&mut self, id: &str, update: ProjectUpdate) -> Option<&Project> {
        let project = self.projects.get_mut(id)?;
        if let Some(title) = update.title {
            project.title = title;
        }
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(link) = update.github_link {
            project.github_link = link;
        }
        self.emit(StoreEvent::ProjectUpdated(id.to_string()));
        self.projects.get(id)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RedemptionType;
    use chrono::Utc;

    fn project(id: &str, student: &str, status: Status, award: u32) -> Project {
        Project {
            id: id.to_string(),
            student_id: student.to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            github_link: "https://github.com/a/b".to_string(),
            screenshot: None,
            status,
            credits_awarded: Credits::new(award),
            submitted_at: Utc::now(),
            faculty_comments: None,
        }
    }

    fn redemption(id: &str, student: &str, kind: RedemptionType, cost: u32) -> RedemptionRequest {
        RedemptionRequest {
            id: id.to_string(),
            student_id: student.to_string(),
            kind,
            credits_cost: Credits::new(cost),
            status: Status::Pending,
            requested_at: Utc::now(),
        }
    }

    fn catalog() -> Catalog {
        Catalog {
            users: vec![
                User::student("s1", "Alice", 20),
                User::faculty("f1", "Dr. Reed"),
            ],
            projects: vec![
                project("p1", "s1", Status::Pending, 0),
                project("p2", "s1", Status::Approved, 10),
            ],
            redemptions: vec![redemption("r1", "s1", RedemptionType::FlexibleTutorial, 5)],
        }
    }

    #[test]
    fn empty_store() {
        let store = EntityStore::new();
        assert_eq!(store.users().count(), 0);
        assert_eq!(store.total_balance(), Credits::ZERO);
    }

    #[test]
    fn from_catalog_indexes_entities() {
        let store = EntityStore::from_catalog(catalog()).unwrap();
        assert_eq!(store.user("s1").unwrap().name, "Alice");
        assert_eq!(store.projects().count(), 2);
        assert!(store.redemption("r1").is_some());
        assert!(store.contains_id("p2"));
        assert!(!store.contains_id("p3"));
        assert_eq!(store.pending_redemption_cost(), Credits::new(5));
    }

    #[test]
    fn from_catalog_rejects_duplicate_ids() {
        let mut c = catalog();
        c.projects.push(project("s1", "s1", Status::Pending, 0));
        assert_eq!(
            EntityStore::from_catalog(c).unwrap_err(),
            CatalogError::DuplicateId("s1".to_string())
        );
    }

    #[test]
    fn from_catalog_rejects_dangling_and_faculty_owners() {
        let mut c = catalog();
        c.projects.push(project("p3", "ghost", Status::Pending, 0));
        assert!(matches!(
            EntityStore::from_catalog(c),
            Err(CatalogError::UnknownOwner { .. })
        ));

        let mut c = catalog();
        c.redemptions
            .push(redemption("r2", "f1", RedemptionType::FlexibleTutorial, 5));
        assert!(matches!(
            EntityStore::from_catalog(c),
            Err(CatalogError::OwnerNotStudent { .. })
        ));
    }

    #[test]
    fn from_catalog_rejects_inconsistent_awards_and_costs() {
        let mut c = catalog();
        c.projects.push(project("p3", "s1", Status::Approved, 0));
        assert_eq!(
            EntityStore::from_catalog(c).unwrap_err(),
            CatalogError::AwardMismatch("p3".to_string())
        );

        let mut c = catalog();
        c.projects.push(project("p3", "s1", Status::Denied, 4));
        assert!(matches!(
            EntityStore::from_catalog(c),
            Err(CatalogError::AwardMismatch(_))
        ));

        let mut c = catalog();
        c.redemptions
            .push(redemption("r2", "s1", RedemptionType::AlternativeAssessment, 3));
        assert_eq!(
            EntityStore::from_catalog(c).unwrap_err(),
            CatalogError::CostMismatch("r2".to_string())
        );
    }

    #[test]
    fn debit_refuses_overdraft_without_writing() {
        let mut store = EntityStore::from_catalog(catalog()).unwrap();
        let err = store.debit("s1", Credits::new(21)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCredits(_)));
        assert_eq!(store.user("s1").unwrap().credits, Credits::new(20));

        assert_eq!(store.debit("s1", Credits::new(20)).unwrap(), Credits::ZERO);
    }

    #[test]
    fn balance_writes_are_broadcast() {
        let mut store = EntityStore::from_catalog(catalog()).unwrap();
        let mut events = store.subscribe();

        store.credit("s1", Credits::new(5)).unwrap();
        store.debit("s1", Credits::new(3)).unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::BalanceChanged {
                user: "s1".to_string(),
                delta: 5,
                balance: Credits::new(25)
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::BalanceChanged {
                user: "s1".to_string(),
                delta: -3,
                balance: Credits::new(22)
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn credit_unknown_user_fails() {
        let mut store = EntityStore::new();
        assert!(matches!(
            store.credit("ghost", Credits::new(1)),
            Err(EngineError::UnknownUser(_))
        ));
    }

    #[test]
    fn credit_refuses_overflow_without_writing() {
        let mut store = EntityStore::from_catalog(catalog()).unwrap();
        store.credit("s1", Credits::new(u32::MAX - 25)).unwrap();
        let mut events = store.subscribe();

        let err = store.credit("s1", Credits::new(10)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BalanceOverflow { balance, credits, .. }
                if balance == Credits::new(u32::MAX - 5) && credits == Credits::new(10)
        ));
        assert_eq!(store.user("s1").unwrap().credits, Credits::new(u32::MAX - 5));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn update_project_replaces_present_fields_only() {
        let mut store = EntityStore::from_catalog(catalog()).unwrap();
        let updated = store
            .update_project(
                "p1",
                ProjectUpdate {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description, "d");
    }
}
