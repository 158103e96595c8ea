//! Query lifecycle controller.
//!
//! Owns one [`QuerySession`] and drives submissions through the state
//! machine in [`super::lifecycle`]. A submission writes a provisional
//! library record, fetches results, then writes the enriched record.
//! Write failures are logged and reported in [`WriteLog`] but never stop
//! the submission. At most one submission runs at a time per controller;
//! after [`QueryController::teardown`] late completions leave the session
//! untouched. A submission whose future is dropped midway leaves the
//! session busy; the next submit reclaims it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::lifecycle::{
    InvalidTransition, LifecycleError, LifecycleEvent, PersistenceWriteFailed, Precondition,
    WriteStage,
};
use super::session::{QuerySession, Submission};
use crate::Services;
use crate::database::StoreError;
use crate::domain::{
    ImageResult, ModelRef, NewSearchRecord, RecordError, RecordPatch, SearchRecord, SearchType,
    SearchResults, default_model, find_model,
};
use crate::events::{IMAGE_REQUESTED, SEARCH_REQUESTED, image_requested, search_requested, spawn_notify};
use crate::gateway::{Principal, PrincipalSlot};
use crate::logging::OpTimer;
use crate::view::{ExportError, ExportFormat, export_session};

/// Result of one library write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteOutcome {
    Stored { id: i64 },
    Failed(PersistenceWriteFailed),
}

impl WriteOutcome {
    fn from_store(stage: WriteStage, result: Result<SearchRecord, StoreError>) -> Self {
        match result {
            Ok(record) => Self::Stored { id: record.id },
            Err(e) => {
                tracing::warn!(stage = %stage, error = %e, "Library write failed");
                Self::Failed(PersistenceWriteFailed {
                    stage,
                    reason: e.to_string(),
                })
            }
        }
    }

    #[must_use]
    pub fn stored_id(&self) -> Option<i64> {
        match self {
            Self::Stored { id } => Some(*id),
            Self::Failed(_) => None,
        }
    }
}

/// The writes a submission attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteLog {
    pub provisional: Option<WriteOutcome>,
    pub enriched: Option<WriteOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Rendered {
        search_id: Uuid,
        writes: WriteLog,
    },
    Errored {
        #[serde(serialize_with = "serialize_error")]
        error: LifecycleError,
        search_id: Option<Uuid>,
        writes: WriteLog,
    },
    /// Another submission was already running.
    Ignored,
    /// The controller was torn down before the submission finished.
    Abandoned { search_id: Option<Uuid> },
}

fn serialize_error<S: serde::Serializer>(error: &LifecycleError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model '{0}'")]
pub struct UnknownModel(pub String);

/// Clears the in-flight flag when a submission ends, however it ends.
#[derive(Debug)]
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one query session. Clones share the same session.
#[derive(Debug, Clone)]
pub struct QueryController {
    services: Services,
    principal: Arc<PrincipalSlot>,
    session: Arc<Mutex<QuerySession>>,
    in_flight: Arc<AtomicBool>,
    torn_down: CancellationToken,
}

impl QueryController {
    #[must_use]
    pub fn new(services: Services, principal: Arc<PrincipalSlot>) -> Self {
        Self {
            services,
            principal,
            session: Arc::new(Mutex::new(QuerySession::new())),
            in_flight: Arc::new(AtomicBool::new(false)),
            torn_down: CancellationToken::new(),
        }
    }

    /// A controller for a principal that has already been verified.
    #[must_use]
    pub fn for_principal(services: Services, principal: Option<Principal>) -> Self {
        let slot = PrincipalSlot::with_principal(Arc::clone(&services.identity), principal);
        Self::new(services, Arc::new(slot))
    }

    #[must_use]
    pub fn principal(&self) -> &PrincipalSlot {
        &self.principal
    }

    /// Append typed text to the input buffer.
    pub fn input(&self, text: &str) {
        self.edit(|s| s.query.push_str(text));
    }

    /// Replace the input buffer.
    pub fn set_query(&self, text: &str) {
        self.edit(|s| text.clone_into(&mut s.query));
    }

    pub fn clear_input(&self) {
        self.edit(|s| s.query.clear());
    }

    pub fn select_type(&self, kind: SearchType) {
        self.edit(|s| s.kind = kind);
    }

    pub fn select_model(&self, name: &str) -> Result<ModelRef, UnknownModel> {
        let model = find_model(name).ok_or_else(|| UnknownModel(name.to_string()))?;
        self.edit(|s| s.model = model);
        Ok(model)
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> QuerySession {
        self.session.lock().clone()
    }

    /// Markdown or JSON of the rendered session.
    pub fn export(&self, format: ExportFormat) -> Result<String, ExportError> {
        export_session(&self.session.lock(), format)
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.is_cancelled()
    }

    /// Stop applying completions to the session. Idempotent.
    pub fn teardown(&self) {
        let _session = self.session.lock();
        if !self.torn_down.is_cancelled() {
            tracing::debug!("Query session torn down");
            self.torn_down.cancel();
        }
    }

    /// Load a stored search into the session and run it again.
    pub async fn reopen(&self, record: &SearchRecord) -> Result<SubmitOutcome, InvalidTransition> {
        let model = record
            .ai_model
            .as_deref()
            .and_then(find_model)
            .unwrap_or_else(default_model);
        self.edit(|s| {
            record.search_input.clone_into(&mut s.query);
            s.kind = record.kind;
            s.model = model;
        });
        self.submit().await
    }

    /// Run one submission to completion.
    ///
    /// Returns [`SubmitOutcome::Ignored`] without touching anything when a
    /// submission is already running. An `Err` means the state machine was
    /// driven out of order and is a bug.
    pub async fn submit(&self) -> Result<SubmitOutcome, InvalidTransition> {
        if self.is_torn_down() {
            return Ok(SubmitOutcome::Abandoned { search_id: None });
        }
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Submission already in flight; ignoring");
            return Ok(SubmitOutcome::Ignored);
        };

        let (query, kind, model) = {
            let mut session = self.session.lock();
            session.reclaim();
            session.reset()?;
            session.apply(LifecycleEvent::Submit)?;
            (session.query.trim().to_string(), session.kind, session.model)
        };

        let mut writes = WriteLog::default();
        let (principal, provisional) = match self.validate(&query, kind) {
            Ok(valid) => valid,
            Err(precondition) => {
                if !self.advance(LifecycleEvent::Rejected(precondition))? {
                    return Ok(SubmitOutcome::Abandoned { search_id: None });
                }
                return Ok(SubmitOutcome::Errored {
                    error: LifecycleError::PreconditionFailed(precondition),
                    search_id: None,
                    writes,
                });
            }
        };
        let search_id = provisional.search_id.unwrap_or_else(Uuid::new_v4);
        let abandoned = SubmitOutcome::Abandoned {
            search_id: Some(search_id),
        };

        let timer = OpTimer::new("controller", "submit");
        tracing::info!(%search_id, kind = %kind, model = model.name, "Search submitted");
        let submission = Submission {
            query: query.clone(),
            kind,
            model,
        };
        if !self.advance_with(LifecycleEvent::Validated, |s| {
            s.search_id = Some(search_id);
            s.submitted = Some(submission);
        })? {
            return Ok(abandoned);
        }

        spawn_notify(
            Arc::clone(&self.services.notifier),
            SEARCH_REQUESTED,
            search_requested(&query, kind, &principal.id),
        );

        let stored = self.services.library.insert(&provisional).await;
        let provisional_write = WriteOutcome::from_store(WriteStage::Provisional, stored);
        let provisional_id = provisional_write.stored_id();
        writes.provisional = Some(provisional_write);
        if !self.advance(LifecycleEvent::ProvisionalSettled)? {
            return Ok(abandoned);
        }

        let results = match self.services.results.fetch_results(&query, kind, model.name).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(%search_id, error = %e, "Result provider failed");
                let reason = e.to_string();
                if !self.advance(LifecycleEvent::ProviderFailed(reason.clone()))? {
                    return Ok(abandoned);
                }
                timer.finish();
                return Ok(SubmitOutcome::Errored {
                    error: LifecycleError::ProviderUnavailable(reason),
                    search_id: Some(search_id),
                    writes,
                });
            }
        };

        let blob = results.to_blob();
        if !self.advance_with(LifecycleEvent::ResultsArrived, |s| show_results(s, &results))? {
            return Ok(abandoned);
        }

        let enriched = match blob {
            Ok(blob) => match provisional_id {
                Some(id) => {
                    let patch = RecordPatch {
                        search_results: Some(blob),
                        ai_model: Some(model.name.to_string()),
                    };
                    let updated = self.services.library.update(id, &patch).await;
                    WriteOutcome::from_store(WriteStage::Enriched, updated)
                }
                None => {
                    let full = provisional.with_results(model.name, blob);
                    let inserted = self.services.library.insert(&full).await;
                    WriteOutcome::from_store(WriteStage::Enriched, inserted)
                }
            },
            Err(e) => WriteOutcome::Failed(PersistenceWriteFailed {
                stage: WriteStage::Enriched,
                reason: e.to_string(),
            }),
        };
        writes.enriched = Some(enriched);
        if !self.advance(LifecycleEvent::EnrichedSettled)? {
            return Ok(abandoned);
        }

        timer.finish();
        Ok(SubmitOutcome::Rendered { search_id, writes })
    }

    /// Image hits for the current query. Announces the request first when
    /// someone is signed in.
    pub async fn search_images(&self) -> Result<Vec<ImageResult>, LifecycleError> {
        let query = self.session.lock().query.trim().to_string();
        if query.is_empty() {
            return Err(LifecycleError::PreconditionFailed(Precondition::EmptyInput));
        }
        if let Some(principal) = self.principal.current() {
            spawn_notify(
                Arc::clone(&self.services.notifier),
                IMAGE_REQUESTED,
                image_requested(&query, &principal.id),
            );
        }
        self.services
            .results
            .image_results(&query)
            .await
            .map_err(|e| LifecycleError::ProviderUnavailable(e.to_string()))
    }

    fn validate(
        &self,
        query: &str,
        kind: SearchType,
    ) -> Result<(Principal, NewSearchRecord), Precondition> {
        let principal = self.principal.current().ok_or(Precondition::NoPrincipal)?;
        let record = NewSearchRecord::provisional(query, principal.email.as_str(), kind, Uuid::new_v4())
            .map_err(|e| match e {
                RecordError::EmptyInput => Precondition::EmptyInput,
                RecordError::MissingEmail => Precondition::NoPrincipal,
            })?;
        Ok((principal, record))
    }

    fn edit(&self, f: impl FnOnce(&mut QuerySession)) {
        if self.is_torn_down() {
            return;
        }
        f(&mut self.session.lock());
    }

    fn advance(&self, event: LifecycleEvent) -> Result<bool, InvalidTransition> {
        self.advance_with(event, |_| {})
    }

    /// Apply `event` and `update` under one lock. `Ok(false)` once torn down.
    fn advance_with(
        &self,
        event: LifecycleEvent,
        update: impl FnOnce(&mut QuerySession),
    ) -> Result<bool, InvalidTransition> {
        let mut session = self.session.lock();
        if self.torn_down.is_cancelled() {
            return Ok(false);
        }
        update(&mut session);
        session.apply(event)?;
        Ok(true)
    }
}

fn show_results(session: &mut QuerySession, results: &SearchResults) {
    session.web_results.clone_from(&results.web_results);
    session.ai_analysis = Some(results.ai_analysis.clone());
}
