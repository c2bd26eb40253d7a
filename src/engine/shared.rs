//! Engine handle shared between tasks.

use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use super::{BulkOutcome, Engine, EngineError};
use crate::Credits;
use crate::model::{
    Decision, Project, ProjectFields, ProjectId, ProjectUpdate, RedemptionRequest, RedemptionType,
};

/// Cloneable handle to one engine.
///
/// Every transaction holds the write lock until it completes, so two
/// decisions on the same entity can never both observe `Pending`.
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<RwLock<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Shared read access, e.g. to query the store.
    pub async fn read(&self) -> RwLockReadGuard<'_, Engine> {
        self.inner.read().await
    }

    pub async fn submit_project(
        &self,
        student: &str,
        fields: ProjectFields,
    ) -> Result<Project, EngineError> {
        self.inner.write().await.submit_project(student, fields)
    }

    pub async fn decide_project(
        &self,
        project: &str,
        decision: Decision,
        credits: Credits,
        comments: Option<String>,
    ) -> Result<(), EngineError> {
        self.inner
            .write()
            .await
            .decide_project(project, decision, credits, comments)
    }

    pub async fn update_project(
        &self,
        project: &str,
        update: ProjectUpdate,
    ) -> Result<Project, EngineError> {
        self.inner.write().await.update_project(project, update)
    }

    pub async fn submit_redemption(
        &self,
        student: &str,
        kind: RedemptionType,
    ) -> Result<RedemptionRequest, EngineError> {
        self.inner.write().await.submit_redemption(student, kind)
    }

    pub async fn decide_redemption(
        &self,
        redemption: &str,
        decision: Decision,
    ) -> Result<(), EngineError> {
        self.inner
            .write()
            .await
            .decide_redemption(redemption, decision)
    }

    /// Bulk decision that leaves the store readable while it is planned.
    ///
    /// Candidates are picked under the read lock; the decisions and credit
    /// grants are then committed together under one write lock.
    pub async fn bulk_decide_projects(
        &self,
        projects: Vec<ProjectId>,
        decision: Decision,
        credits: Credits,
    ) -> Result<BulkOutcome, EngineError> {
        let plan = {
            let engine = self.inner.read().await;
            let plan = engine.plan_bulk_decision(&projects, decision, credits);
            if let Err(e) = &plan {
                engine.report_failure(e);
            }
            plan?
        };
        tokio::task::yield_now().await;
        Ok(self.inner.write().await.commit_bulk_decision(plan))
    }

    /// Run a bulk decision in the background; the handle resolves once it completes.
    pub fn spawn_bulk_decide_projects(
        &self,
        projects: Vec<ProjectId>,
        decision: Decision,
        credits: Credits,
    ) -> JoinHandle<Result<BulkOutcome, EngineError>> {
        let engine = self.clone();
        tokio::spawn(async move {
            engine
                .bulk_decide_projects(projects, decision, credits)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Catalog, EntityStore, InvalidStateError};
    use crate::model::{Status, User};

    fn shared() -> SharedEngine {
        let store = EntityStore::from_catalog(Catalog {
            users: vec![User::student("alice", "Alice", 0)],
            ..Default::default()
        })
        .unwrap();
        SharedEngine::new(Engine::new(store))
    }

    fn fields(title: &str) -> ProjectFields {
        ProjectFields {
            title: title.to_string(),
            description: "desc".to_string(),
            github_link: "https://github.com/alice/repo".to_string(),
            screenshot: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_decisions_credit_once() {
        let engine = shared();
        let project = engine.submit_project("alice", fields("p")).await.unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let project = project.clone();
                tokio::spawn(async move {
                    engine
                        .decide_project(&project, Decision::Approved, Credits::new(10), None)
                        .await
                })
            })
            .collect();

        let mut applied = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => applied += 1,
                Err(EngineError::InvalidState(InvalidStateError { .. })) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(rejected, 7);

        let reader = engine.read().await;
        assert_eq!(
            reader.store().user("alice").unwrap().credits,
            Credits::new(10)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_never_overdraw() {
        let engine = shared();
        let project = engine.submit_project("alice", fields("p")).await.unwrap().id;
        engine
            .decide_project(&project, Decision::Approved, Credits::new(12), None)
            .await
            .unwrap();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .submit_redemption("alice", RedemptionType::FlexibleTutorial)
                        .await
                })
            })
            .collect();

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                granted += 1;
            }
        }
        assert_eq!(granted, 2);

        let reader = engine.read().await;
        assert_eq!(
            reader.store().user("alice").unwrap().credits,
            Credits::new(2)
        );
        assert_eq!(reader.store().redemptions().count(), 2);
    }

    #[tokio::test]
    async fn spawned_bulk_decision_reports_completion() {
        let engine = shared();
        let mut ids = Vec::new();
        for title in ["a", "b", "c"] {
            ids.push(engine.submit_project("alice", fields(title)).await.unwrap().id);
        }

        let handle = engine.spawn_bulk_decide_projects(ids.clone(), Decision::Approved, Credits::new(4));
        let outcome = handle.await.unwrap().unwrap();

        assert_eq!(outcome.decided_count, 3);
        let reader = engine.read().await;
        assert_eq!(
            reader.store().user("alice").unwrap().credits,
            Credits::new(12)
        );
        assert!(
            ids.iter()
                .all(|id| reader.store().project(id).unwrap().status == Status::Approved)
        );
    }

    #[tokio::test]
    async fn bulk_decision_rejects_invalid_input() {
        let engine = shared();
        let result = engine
            .bulk_decide_projects(vec!["x".to_string()], Decision::Approved, Credits::ZERO)
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }
}
