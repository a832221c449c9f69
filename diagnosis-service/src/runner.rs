//! TraversalRunner loads a session, applies exactly one answer, and persists the
//! updated session back to storage.
//!
//! The engine is shared read-only by every session; all per-caller progress
//! lives in the stored [`TraversalState`](symptom_engine::TraversalState).
//! Requests on the same session are serialized, and sessions idle for longer
//! than the idle timeout are dropped.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use symptom_engine::{Answer, DiagnosisEngine};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    error::{Result, ServiceError},
    models::SessionView,
    sessions::{SessionStorage, TraversalSession},
};

/// Orchestrates the _load → answer → save_ round trip of one HTTP request.
#[derive(Clone)]
pub struct TraversalRunner {
    engine: Arc<DiagnosisEngine>,
    storage: Arc<dyn SessionStorage>,
    idle_timeout: Duration,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TraversalRunner {
    pub fn new(
        engine: Arc<DiagnosisEngine>,
        storage: Arc<dyn SessionStorage>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            storage,
            idle_timeout,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Opens a new session at the root of the tree, first dropping idle ones.
    pub async fn start(&self) -> Result<SessionView> {
        self.purge_idle().await?;

        let session = TraversalSession::new(self.engine.start_traversal());
        let view = self.view_of(&session)?;
        info!(session_id = %session.id, "Traversal session started");
        self.storage.save(session).await?;
        Ok(view)
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        let session = self.load(session_id).await?;
        self.view_of(&session)
    }

    /// Applies one answer and saves the session.
    ///
    /// A rejected answer leaves the stored session untouched.
    pub async fn answer(&self, session_id: &str, answer: Answer) -> Result<SessionView> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        let mut session = self.load(session_id).await?;

        let status = session.state.answer(self.engine.tree(), answer)?;
        debug!(session_id, ?answer, ?status, "Answer applied");

        session.touch();
        let view = self.view_of(&session)?;
        self.storage.save(session).await?;
        Ok(view)
    }

    pub async fn abandon(&self, session_id: &str) -> Result<()> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        let removed = self.storage.delete(session_id).await?;
        self.locks.remove(session_id);
        if removed {
            info!(session_id, "Traversal session abandoned");
            Ok(())
        } else {
            Err(ServiceError::SessionNotFound(session_id.to_string()))
        }
    }

    /// Drops every session idle for longer than the idle timeout.
    pub async fn purge_idle(&self) -> Result<usize> {
        let purged = self.storage.purge_idle(Utc::now() - self.idle_timeout).await?;
        for id in &purged {
            self.locks.remove(id);
        }
        if !purged.is_empty() {
            info!(count = purged.len(), "Purged idle traversal sessions");
        }
        Ok(purged.len())
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Loads a live session; a missing or expired one is forgotten.
    async fn load(&self, session_id: &str) -> Result<TraversalSession> {
        let session = self.storage.get(session_id).await?;
        match session {
            Some(session) if Utc::now() - session.updated_at <= self.idle_timeout => Ok(session),
            Some(_) => {
                debug!(session_id, "Traversal session expired");
                self.storage.delete(session_id).await?;
                self.locks.remove(session_id);
                Err(ServiceError::SessionNotFound(session_id.to_string()))
            }
            None => {
                self.locks.remove(session_id);
                Err(ServiceError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    fn view_of(&self, session: &TraversalSession) -> Result<SessionView> {
        let state = &session.state;
        if state.is_resolved() {
            let result = self.engine.conclude_traversal(state)?;
            Ok(SessionView {
                session_id: session.id.clone(),
                status: "resolved".to_string(),
                question: None,
                affirmed_symptoms: state.affirmed_symptoms().to_vec(),
                result: Some(result),
            })
        } else {
            let question = state.current_question(self.engine.tree())?;
            Ok(SessionView {
                session_id: session.id.clone(),
                status: "asking".to_string(),
                question: Some(question),
                affirmed_symptoms: state.affirmed_symptoms().to_vec(),
                result: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::InMemorySessionStorage;
    use symptom_engine::{
        ClassificationTree, DiagnosisError, DiseaseProfileTable, DoctorDirectory, SymptomCatalog,
        TreeNode,
    };

    fn runner() -> (TraversalRunner, Arc<InMemorySessionStorage>) {
        let catalog = SymptomCatalog::new(["fever", "cough"]).unwrap();
        let profiles = DiseaseProfileTable::from_profiles(
            &catalog,
            [("flu", vec!["fever", "cough"]), ("cold", vec!["cough"])],
        )
        .unwrap();
        let tree = ClassificationTree::new(
            vec![TreeNode::split(0, 1, 2), TreeNode::leaf("cold"), TreeNode::leaf("flu")],
            &catalog,
        )
        .unwrap();
        let engine = DiagnosisEngine::new(catalog, profiles, tree, DoctorDirectory::default()).unwrap();
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = TraversalRunner::new(Arc::new(engine), storage.clone(), Duration::minutes(30));
        (runner, storage)
    }

    #[tokio::test]
    async fn test_start_answer_resolve() {
        let (runner, _) = runner();

        let view = runner.start().await.unwrap();
        assert_eq!(view.status, "asking");
        assert_eq!(view.question.as_ref().unwrap().symptom, "fever");

        let view = runner.answer(&view.session_id, Answer::Yes).await.unwrap();
        assert_eq!(view.status, "resolved");
        assert_eq!(view.affirmed_symptoms, ["fever"]);
        let result = view.result.unwrap();
        assert_eq!(result.disease, "flu");
        assert_eq!(result.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_answering_resolved_session_is_rejected() {
        let (runner, _) = runner();
        let id = runner.start().await.unwrap().session_id;
        runner.answer(&id, Answer::No).await.unwrap();

        let err = runner.answer(&id, Answer::Yes).await.unwrap_err();
        assert!(matches!(err, ServiceError::Engine(DiagnosisError::InvalidState(_))));

        let view = runner.view(&id).await.unwrap();
        assert_eq!(view.result.unwrap().disease, "cold");
    }

    #[tokio::test]
    async fn test_unknown_and_abandoned_sessions() {
        let (runner, storage) = runner();
        assert!(matches!(
            runner.view("missing").await,
            Err(ServiceError::SessionNotFound(_))
        ));

        let id = runner.start().await.unwrap().session_id;
        assert_eq!(storage.len(), 1);
        runner.abandon(&id).await.unwrap();
        assert!(storage.is_empty());
        assert!(matches!(
            runner.abandon(&id).await,
            Err(ServiceError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_purged_on_start() {
        let (runner, storage) = runner();
        let id = runner.start().await.unwrap().session_id;

        let mut session = storage.get(&id).await.unwrap().unwrap();
        session.updated_at = Utc::now() - Duration::hours(1);
        storage.save(session).await.unwrap();

        let fresh = runner.start().await.unwrap().session_id;
        assert_eq!(storage.len(), 1);
        assert!(storage.get(&fresh).await.unwrap().is_some());
        assert!(matches!(
            runner.answer(&id, Answer::Yes).await,
            Err(ServiceError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_not_found() {
        let (runner, storage) = runner();
        let id = runner.start().await.unwrap().session_id;

        let mut session = storage.get(&id).await.unwrap().unwrap();
        session.updated_at = Utc::now() - Duration::minutes(31);
        storage.save(session).await.unwrap();

        assert!(matches!(
            runner.view(&id).await,
            Err(ServiceError::SessionNotFound(_))
        ));
        assert!(storage.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_answers_apply_once() {
        let (runner, storage) = runner();
        let id = runner.start().await.unwrap().session_id;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let runner = runner.clone();
                let id = id.clone();
                let answer = if i % 2 == 0 { Answer::Yes } else { Answer::No };
                tokio::spawn(async move { runner.answer(&id, answer).await })
            })
            .collect();

        let mut accepted = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(view) => accepted.push(view),
                Err(err) => assert!(matches!(
                    err,
                    ServiceError::Engine(DiagnosisError::InvalidState(_))
                )),
            }
        }

        assert_eq!(accepted.len(), 1);
        let stored = storage.get(&id).await.unwrap().unwrap();
        assert_eq!(
            stored.state.resolved_label(),
            accepted[0].result.as_ref().map(|r| r.disease.as_str())
        );
    }
}
