//! Workflow engine.
//!
//! The engine owns the entity store and applies the exchange's transactions:
//! project submission and review, redemption requests and their review, and
//! bulk review of projects. Every transaction validates against the current
//! store before writing, so a failed transaction leaves no trace.
//! Also supports an async stream of commands.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Credits;
use crate::clock::{Clock, EntityKind, IdGenerator, SequentialIds, SystemClock};
use crate::model::{
    Command, Decision, Project, ProjectFields, ProjectId, ProjectUpdate, RedemptionRequest,
    RedemptionType, Role, Status, User, UserId,
};
use crate::notify::{LogSink, NotificationKind, NotificationSink};
use crate::validate;

mod store;
pub use store::{Catalog, EntityStore, StoreEvent};

mod error;
pub use error::{
    CatalogError, DecisionTarget, EngineError, InsufficientCreditsError, InvalidStateError,
    ValidationError,
};

mod shared;
pub use shared::SharedEngine;

/// Result of a bulk decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    /// Projects moved out of `Pending` by this call.
    pub decided_count: usize,
    /// Requested ids that were unknown or already decided, or whose owner could
    /// not be credited.
    pub skipped_count: usize,
}

/// A validated bulk decision, not yet applied.
#[derive(Debug, Clone)]
pub struct BulkPlan {
    decision: Decision,
    credits: Credits,
    candidates: Vec<ProjectId>,
    requested: usize,
}

impl BulkPlan {
    pub fn candidates(&self) -> &[ProjectId] {
        &self.candidates
    }
}

/// The workflow engine.
///
/// Methods that write take `&mut self`, so at most one transaction runs at a
/// time. Use [`SharedEngine`] to share an engine between tasks.
pub struct Engine {
    store: EntityStore,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// Public API
impl Engine {
    pub fn new(store: EntityStore) -> Self {
        Self {
            store,
            notifier: Arc::new(LogSink),
            clock: Arc::new(SystemClock),
            ids: Arc::new(SequentialIds::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Read-only view of the current state.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Run the engine over the given command stream.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a failed command must not stop the engine; it has already been logged
            let _ = self.apply(command);
        }
    }

    /// Apply a single command on top of the current state.
    pub fn apply(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::SubmitProject { student, fields } => {
                self.submit_project(&student, fields)?;
            }
            Command::DecideProject {
                project,
                decision,
                credits,
                comments,
            } => {
                self.decide_project(&project, decision, credits, comments)?;
            }
            Command::BulkDecideProjects {
                projects,
                decision,
                credits,
            } => {
                self.bulk_decide_projects(&projects, decision, credits)?;
            }
            Command::UpdateProject { project, update } => {
                self.update_project(&project, update)?;
            }
            Command::SubmitRedemption { student, kind } => {
                self.submit_redemption(&student, kind)?;
            }
            Command::DecideRedemption {
                redemption,
                decision,
            } => {
                self.decide_redemption(&redemption, decision)?;
            }
        }
        Ok(())
    }

    /// Create a new pending project owned by `student`.
    pub fn submit_project(
        &mut self,
        student: &str,
        fields: ProjectFields,
    ) -> Result<Project, EngineError> {
        let result = self.apply_submit_project(student, fields);
        Self::log_result("project submission", student, None, &result);
        match &result {
            Ok(_) => self.notify("Project submitted successfully!", NotificationKind::Success),
            Err(e) => self.report_failure(e),
        }
        result
    }

    /// Approve or deny a pending project.
    ///
    /// `credits` must be positive when approving and is ignored when denying.
    /// Denial requires non-blank `comments`.
    pub fn decide_project(
        &mut self,
        project: &str,
        decision: Decision,
        credits: Credits,
        comments: Option<String>,
    ) -> Result<(), EngineError> {
        let result = self.apply_decide_project(project, decision, credits, comments);
        Self::log_result("project decision", project, Some(credits), &result);
        match &result {
            Ok(Some(message)) => self.notify(message, decision_kind(decision)),
            Ok(None) => {}
            Err(e) => self.report_failure(e),
        }
        result.map(|_| ())
    }

    /// Apply one decision to many projects.
    ///
    /// Unknown and already-decided ids are skipped. Approved credits are
    /// summed per student and written once per student.
    pub fn bulk_decide_projects(
        &mut self,
        projects: &[ProjectId],
        decision: Decision,
        credits: Credits,
    ) -> Result<BulkOutcome, EngineError> {
        let plan = self.plan_bulk_decision(projects, decision, credits);
        if let Err(e) = &plan {
            self.report_failure(e);
        }
        Ok(self.commit_bulk_decision(plan?))
    }

    /// Validate a bulk decision and pick the projects it would apply to.
    pub fn plan_bulk_decision(
        &self,
        projects: &[ProjectId],
        decision: Decision,
        credits: Credits,
    ) -> Result<BulkPlan, EngineError> {
        if decision == Decision::Approved && credits.is_zero() {
            return Err(ValidationError::NonPositiveCredits.into());
        }

        let mut seen = HashSet::new();
        let candidates = projects
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .filter(|id| {
                self.store
                    .project(id)
                    .is_some_and(|p| p.status.is_pending())
            })
            .cloned()
            .collect();

        Ok(BulkPlan {
            decision,
            credits,
            candidates,
            requested: seen.len(),
        })
    }

    /// Apply a planned bulk decision.
    ///
    /// Candidates are checked again, so a plan made before another writer ran
    /// still never decides a project twice.
    pub fn commit_bulk_decision(&mut self, plan: BulkPlan) -> BulkOutcome {
        let BulkPlan {
            decision,
            credits,
            candidates,
            requested,
        } = plan;
        let award = match decision {
            Decision::Approved => credits,
            Decision::Denied => Credits::ZERO,
        };

        let mut decided = Vec::with_capacity(candidates.len());
        let mut by_student: BTreeMap<UserId, Vec<ProjectId>> = BTreeMap::new();
        for id in candidates {
            let Some(project) = self.store.project(&id) else {
                continue;
            };
            if !project.status.is_pending() {
                continue;
            }
            match decision {
                Decision::Approved => by_student
                    .entry(project.student_id.clone())
                    .or_default()
                    .push(id),
                Decision::Denied => decided.push(id),
            }
        }

        // one balance write per student; a student whose grant cannot land keeps
        // their projects pending
        let mut students = 0;
        for (student, projects) in by_student {
            let grant = u32::try_from(projects.len())
                .ok()
                .and_then(|count| award.times(count));
            let credited = match grant {
                Some(grant) => self.store.credit(&student, grant),
                None => Err(EngineError::BalanceOverflow {
                    balance: self
                        .store
                        .user(&student)
                        .map(|u| u.credits)
                        .unwrap_or_default(),
                    user: student.clone(),
                    credits: award,
                }),
            };
            match credited {
                Ok(_) => {
                    students += 1;
                    decided.extend(projects);
                }
                Err(e) => {
                    warn!(
                        user = %student,
                        projects = projects.len(),
                        reason = %e,
                        "bulk approval skipped"
                    );
                }
            }
        }

        for id in &decided {
            self.store
                .record_project_decision(id, decision.into(), award, None);
        }

        let outcome = BulkOutcome {
            decided_count: decided.len(),
            skipped_count: requested - decided.len(),
        };
        info!(
            decision = %decision,
            credits = %award,
            decided = outcome.decided_count,
            skipped = outcome.skipped_count,
            students,
            "bulk decision applied"
        );

        if outcome.decided_count > 0 {
            let verb = match decision {
                Decision::Approved => "approved",
                Decision::Denied => "denied",
            };
            let message = format!("{} projects {verb}.", outcome.decided_count);
            self.notify(&message, decision_kind(decision));
        }
        outcome
    }

    /// Edit a project's title, description or link. No credits move.
    pub fn update_project(
        &mut self,
        project: &str,
        update: ProjectUpdate,
    ) -> Result<Project, EngineError> {
        let result = self.apply_update_project(project, update);
        Self::log_result("project update", project, None, &result);
        match &result {
            Ok(_) => self.notify("Project details updated.", NotificationKind::Success),
            Err(e) => self.report_failure(e),
        }
        result
    }

    /// Reserve a redemption's cost from `student` and file the request.
    pub fn submit_redemption(
        &mut self,
        student: &str,
        kind: RedemptionType,
    ) -> Result<RedemptionRequest, EngineError> {
        let result = self.apply_submit_redemption(student, kind);
        Self::log_result("redemption request", student, Some(kind.credits_cost()), &result);
        match &result {
            Ok(_) => self.notify(
                "Your application for academic flexibility has been submitted.",
                NotificationKind::Success,
            ),
            Err(e) => self.report_failure(e),
        }
        result
    }

    /// Approve or deny a pending redemption. Denial refunds its cost.
    pub fn decide_redemption(
        &mut self,
        redemption: &str,
        decision: Decision,
    ) -> Result<(), EngineError> {
        let result = self.apply_decide_redemption(redemption, decision);
        Self::log_result("redemption decision", redemption, None, &result);
        match &result {
            Ok(Some(message)) => self.notify(message, decision_kind(decision)),
            Ok(None) => {}
            Err(e) => self.report_failure(e),
        }
        result.map(|_| ())
    }
}

/// Private API
impl Engine {
    /// Small helper to log transaction results
    fn log_result<T, E: std::fmt::Display>(
        operation: &str,
        target: &str,
        credits: Option<Credits>,
        result: &Result<T, E>,
    ) {
        match (result, credits) {
            (Ok(_), Some(credits)) => {
                info!(target_id = %target, credits = %credits, "{operation} applied");
            }
            (Ok(_), None) => {
                info!(target_id = %target, "{operation} applied");
            }
            (Err(e), Some(credits)) => {
                info!(target_id = %target, credits = %credits, reason = %e, "{operation} skipped");
            }
            (Err(e), None) => {
                info!(target_id = %target, reason = %e, "{operation} skipped");
            }
        }
    }

    fn notify(&self, message: &str, kind: NotificationKind) {
        self.notifier.notify(message, kind);
    }

    /// Surface caller mistakes to the user. State conflicts and lookups are only logged.
    fn report_failure(&self, error: &EngineError) {
        match error {
            EngineError::InsufficientCredits(_) => {
                self.notify("Not enough credits to redeem!", NotificationKind::Error);
            }
            EngineError::Validation(e) => {
                self.notify(&e.to_string(), NotificationKind::Error);
            }
            _ => {}
        }
    }

    fn student(&self, id: &str) -> Result<&User, EngineError> {
        let user = self
            .store
            .user(id)
            .ok_or_else(|| EngineError::UnknownUser(id.to_string()))?;
        if user.role != Role::Student {
            return Err(EngineError::NotAStudent(id.to_string()));
        }
        Ok(user)
    }

    fn fresh_id(&self, kind: EntityKind) -> Result<String, EngineError> {
        let id = self.ids.new_id(kind);
        if self.store.contains_id(&id) {
            return Err(EngineError::DuplicateId(id));
        }
        Ok(id)
    }

    /// Apply a project submission:
    /// - Ensure the submitter is a known student
    /// - Validate title, description and link
    /// - Store the project as pending with nothing awarded
    fn apply_submit_project(
        &mut self,
        student: &str,
        fields: ProjectFields,
    ) -> Result<Project, EngineError> {
        self.student(student)?;
        validate::project_fields(&fields)?;

        let project = Project {
            id: self.fresh_id(EntityKind::Project)?,
            student_id: student.to_string(),
            title: fields.title,
            description: fields.description,
            github_link: fields.github_link,
            screenshot: fields.screenshot,
            status: Status::Pending,
            credits_awarded: Credits::ZERO,
            submitted_at: self.clock.now(),
            faculty_comments: None,
        };
        self.store.insert_project(project.clone());
        Ok(project)
    }

    /// Apply a project decision:
    /// - Ensure the project exists and is pending
    /// - Check the award (approval) or the comments (denial)
    /// - Record the decision and credit the owner on approval
    ///
    /// Returns the notification to emit, if the owner could be named.
    fn apply_decide_project(
        &mut self,
        id: &str,
        decision: Decision,
        credits: Credits,
        comments: Option<String>,
    ) -> Result<Option<String>, EngineError> {
        let project = self
            .store
            .project(id)
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))?;

        if !project.status.is_pending() {
            return Err(InvalidStateError {
                target: DecisionTarget::Project,
                id: id.to_string(),
                status: project.status,
            }
            .into());
        }

        let comments = comments.filter(|c| !c.trim().is_empty());
        let award = match decision {
            Decision::Approved if credits.is_zero() => {
                return Err(ValidationError::NonPositiveCredits.into());
            }
            Decision::Approved => credits,
            Decision::Denied if comments.is_none() => {
                return Err(ValidationError::MissingComments.into());
            }
            Decision::Denied => Credits::ZERO,
        };

        // the award and the status must land together, so refuse before writing anything
        if decision == Decision::Approved {
            self.store.balance_after_credit(&project.student_id, award)?;
        }
        let owner = self.store.user(&project.student_id);

        let message = owner.map(|user| match decision {
            Decision::Approved => {
                format!("{}'s project \"{}\" approved!", user.name, project.title)
            }
            Decision::Denied => {
                format!("{}'s project \"{}\" was denied.", user.name, project.title)
            }
        });
        let student = project.student_id.clone();

        if !award.is_zero() {
            self.store.credit(&student, award)?;
        }
        self.store
            .record_project_decision(id, decision.into(), award, comments);
        Ok(message)
    }

    /// Apply a project edit:
    /// - Ensure the project exists
    /// - Validate the fields being replaced
    fn apply_update_project(
        &mut self,
        id: &str,
        update: ProjectUpdate,
    ) -> Result<Project, EngineError> {
        if self.store.project(id).is_none() {
            return Err(EngineError::ProjectNotFound(id.to_string()));
        }
        validate::project_update(&update)?;

        self.store
            .update_project(id, update)
            .cloned()
            .ok_or_else(|| EngineError::ProjectNotFound(id.to_string()))
    }

    /// Apply a redemption request:
    /// - Ensure the requester is a known student with enough credits
    /// - Only then take an id, so refused requests leave no gap
    /// - Debit the cost up front (funds on hold until the decision)
    /// - Store the request as pending
    fn apply_submit_redemption(
        &mut self,
        student: &str,
        kind: RedemptionType,
    ) -> Result<RedemptionRequest, EngineError> {
        self.student(student)?;
        let cost = kind.credits_cost();
        self.store.balance_after_debit(student, cost)?;
        let id = self.fresh_id(EntityKind::Redemption)?;

        // debit writes nothing when it fails
        self.store.debit(student, cost)?;

        let request = RedemptionRequest {
            id,
            student_id: student.to_string(),
            kind,
            credits_cost: cost,
            status: Status::Pending,
            requested_at: self.clock.now(),
        };
        self.store.insert_redemption(request.clone());
        Ok(request)
    }

    /// Apply a redemption decision:
    /// - Ensure the request exists and is pending
    /// - Record the decision
    /// - Refund the held cost on denial; on approval the debit stands
    fn apply_decide_redemption(
        &mut self,
        id: &str,
        decision: Decision,
    ) -> Result<Option<String>, EngineError> {
        let request = self
            .store
            .redemption(id)
            .ok_or_else(|| EngineError::RedemptionNotFound(id.to_string()))?;

        if !request.status.is_pending() {
            return Err(InvalidStateError {
                target: DecisionTarget::Redemption,
                id: id.to_string(),
                status: request.status,
            }
            .into());
        }

        // the refund has to fit before the request is closed
        if decision == Decision::Denied {
            self.store
                .balance_after_credit(&request.student_id, request.credits_cost)?;
        }
        let owner = self.store.user(&request.student_id);

        let message = owner.map(|user| match decision {
            Decision::Approved => format!("{}'s {} application approved.", user.name, request.kind),
            Decision::Denied => format!(
                "{}'s {} application was denied. {} credits refunded.",
                user.name, request.kind, request.credits_cost
            ),
        });
        let student = request.student_id.clone();
        let cost = request.credits_cost;

        if decision == Decision::Denied {
            self.store.credit(&student, cost)?;
        }
        self.store.record_redemption_decision(id, decision.into());
        Ok(message)
    }
}

fn decision_kind(decision: Decision) -> NotificationKind {
    match decision {
        Decision::Approved => NotificationKind::Success,
        Decision::Denied => NotificationKind::Error,
    }
}
