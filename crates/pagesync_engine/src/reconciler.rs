//! Mutation reconciler.
//!
//! Sends create/update/delete/mark-read intents and folds their results
//! into the cache:
//!
//! - Create, Update and ToggleStatus are pessimistic: the cache changes
//!   only after the server confirms, using the record it returned.
//! - Delete is confirmed first (see [`DeleteFlow`]), then the record is
//!   removed and pagination resynced.
//! - MarkRead and MarkAllRead are optimistic. The read flag and unread
//!   counter change immediately and are reconciled by re-fetching the
//!   counter, never by rolling back.
//!
//! At most one mutation per target may be pending. A second one fails
//! with [`EngineError::Busy`] before anything is sent.

use crate::cache::{CachePatch, PatchEffect};
use crate::config::UnreadReconcile;
use crate::error::{EngineError, EngineResult, ErrorInfo};
use crate::notifications::{refresh_unread, UnreadCounter};
use crate::orchestrator::FetchOrchestrator;
use crate::transport::Transport;
use pagesync_protocol::{decode_record, ApiRequest, Resource, ResourceId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Kind of mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Create a record.
    Create,
    /// Replace a record's payload.
    Update,
    /// Delete a record.
    Delete,
    /// Mark one notification read.
    MarkRead,
    /// Mark every notification read.
    MarkAllRead,
    /// Flip a record's active status.
    ToggleStatus,
}

impl MutationKind {
    fn fallback_message(&self, noun: &str) -> String {
        match self {
            MutationKind::Create => format!("Failed to create {noun}"),
            MutationKind::Update => format!("Failed to update {noun}"),
            MutationKind::Delete => format!("Failed to delete {noun}"),
            MutationKind::MarkRead => format!("Failed to mark {noun} as read"),
            MutationKind::MarkAllRead => "Failed to mark all as read".to_string(),
            MutationKind::ToggleStatus => format!("Failed to update {noun} status"),
        }
    }

    fn needs_target(&self) -> bool {
        !matches!(self, MutationKind::Create | MutationKind::MarkAllRead)
    }

    fn needs_payload(&self) -> bool {
        matches!(self, MutationKind::Create | MutationKind::Update)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::MarkRead => "mark-read",
            MutationKind::MarkAllRead => "mark-all-read",
            MutationKind::ToggleStatus => "toggle-status",
        };
        f.write_str(name)
    }
}

/// A mutation requested by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationIntent {
    /// What to do.
    pub kind: MutationKind,
    /// Target record, for kinds that have one.
    pub target: Option<ResourceId>,
    /// JSON payload for Create and Update.
    pub payload: Option<Value>,
}

impl MutationIntent {
    /// Create intent.
    pub fn create(payload: Value) -> Self {
        Self {
            kind: MutationKind::Create,
            target: None,
            payload: Some(payload),
        }
    }

    /// Update intent.
    pub fn update(id: impl Into<ResourceId>, payload: Value) -> Self {
        Self {
            kind: MutationKind::Update,
            target: Some(id.into()),
            payload: Some(payload),
        }
    }

    /// Delete intent.
    pub fn delete(id: impl Into<ResourceId>) -> Self {
        Self::targeted(MutationKind::Delete, id)
    }

    /// Mark-read intent.
    pub fn mark_read(id: impl Into<ResourceId>) -> Self {
        Self::targeted(MutationKind::MarkRead, id)
    }

    /// Mark-all-read intent.
    pub fn mark_all_read() -> Self {
        Self {
            kind: MutationKind::MarkAllRead,
            target: None,
            payload: None,
        }
    }

    /// Toggle-status intent.
    pub fn toggle_status(id: impl Into<ResourceId>) -> Self {
        Self::targeted(MutationKind::ToggleStatus, id)
    }

    fn targeted(kind: MutationKind, id: impl Into<ResourceId>) -> Self {
        Self {
            kind,
            target: Some(id.into()),
            payload: None,
        }
    }

    /// Checks that the intent carries what its kind requires.
    pub fn validate(&self) -> EngineResult<()> {
        if self.kind.needs_target() && self.target.is_none() {
            return Err(EngineError::Validation(format!("{} requires a target id", self.kind)));
        }
        if self.kind.needs_payload() && !self.payload.as_ref().is_some_and(Value::is_object) {
            return Err(EngineError::Validation(format!(
                "{} requires a JSON object payload",
                self.kind
            )));
        }
        Ok(())
    }

    fn pending_key(&self) -> Option<PendingKey> {
        match (&self.kind, &self.target) {
            (MutationKind::Create, _) => None,
            (MutationKind::MarkAllRead, _) => Some(PendingKey::AllRead),
            (_, Some(id)) => Some(PendingKey::Target(id.clone())),
            (_, None) => None,
        }
    }
}

/// Result of an applied mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Server created this record; it is now at the head of the page.
    Created(Resource),
    /// Server confirmed this record; it replaced the cached one.
    Updated(Resource),
    /// Record removed; `effect` is the pagination follow-up that ran.
    Deleted {
        /// Deleted record.
        id: ResourceId,
        /// Follow-up fetch.
        effect: PatchEffect,
    },
    /// Notification marked read.
    MarkedRead {
        /// Target notification.
        id: ResourceId,
        /// Whether it was unread in the cache.
        was_unread: bool,
    },
    /// Every notification marked read.
    MarkedAllRead {
        /// Number of cached notifications that were unread.
        count: usize,
    },
    /// Status toggled; the server record replaced the cached one.
    Toggled(Resource),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PendingKey {
    Target(ResourceId),
    AllRead,
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingKey::Target(id) => write!(f, "{id}"),
            PendingKey::AllRead => f.write_str("read-all"),
        }
    }
}

/// Releases a pending key when the mutation ends, including when its
/// future is dropped.
struct PendingGuard<'a> {
    pending: &'a Mutex<HashSet<PendingKey>>,
    key: Option<PendingKey>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.pending.lock().remove(&key);
        }
    }
}

/// Applies mutation results to one collection.
pub struct MutationReconciler<T: Transport> {
    orchestrator: Arc<FetchOrchestrator<T>>,
    unread: Option<Arc<UnreadCounter>>,
    unread_reconcile: UnreadReconcile,
    pending: Mutex<HashSet<PendingKey>>,
}

impl<T: Transport> MutationReconciler<T> {
    /// Creates a reconciler for the orchestrator's collection.
    pub fn new(orchestrator: Arc<FetchOrchestrator<T>>, unread_reconcile: UnreadReconcile) -> Self {
        Self {
            orchestrator,
            unread: None,
            unread_reconcile,
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Attaches an unread counter updated by mark-read intents.
    pub fn with_unread_counter(mut self, counter: Arc<UnreadCounter>) -> Self {
        self.unread = Some(counter);
        self
    }

    /// Whether a mutation on `id` is pending.
    pub fn is_pending(&self, id: &ResourceId) -> bool {
        self.pending.lock().contains(&PendingKey::Target(id.clone()))
    }

    /// Number of pending mutations.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Sends a mutation and reconciles the cache with its result.
    pub async fn dispatch(&self, intent: MutationIntent) -> EngineResult<MutationOutcome> {
        intent.validate()?;
        let _guard = self.acquire(&intent)?;
        let spec = self.orchestrator.spec();
        debug!(collection = spec.label(), kind = %intent.kind, record = ?intent.target, "mutation pending");

        let result = match (intent.kind, intent.target, intent.payload) {
            (MutationKind::Create, _, Some(payload)) => self.create(payload).await,
            (MutationKind::Update, Some(id), Some(payload)) => self.update(id, payload).await,
            (MutationKind::Delete, Some(id), _) => self.delete(id).await,
            (MutationKind::ToggleStatus, Some(id), _) => self.toggle_status(id).await,
            (MutationKind::MarkRead, Some(id), _) => self.mark_read(id).await,
            (MutationKind::MarkAllRead, _, _) => self.mark_all_read().await,
            (kind, _, _) => Err(EngineError::Validation(format!("malformed {kind} intent"))),
        };

        match &result {
            Ok(_) => info!(collection = spec.label(), kind = %intent.kind, "mutation applied"),
            Err(e) => warn!(collection = spec.label(), kind = %intent.kind, error = %e, "mutation failed"),
        }
        result
    }

    fn acquire(&self, intent: &MutationIntent) -> EngineResult<PendingGuard<'_>> {
        let key = intent.pending_key();
        if let Some(key) = &key {
            let mut pending = self.pending.lock();
            if !pending.insert(key.clone()) {
                debug!(key = %key, "mutation rejected: busy");
                return Err(EngineError::Busy {
                    key: key.to_string(),
                });
            }
        }
        Ok(PendingGuard {
            pending: &self.pending,
            key,
        })
    }

    async fn send(&self, request: ApiRequest, kind: MutationKind) -> EngineResult<Vec<u8>> {
        let fallback = kind.fallback_message(self.orchestrator.spec().noun());
        self.orchestrator
            .transport()
            .send(request)
            .await
            .map_err(|e| e.into_engine_error(&fallback))
    }

    async fn create(&self, payload: Value) -> EngineResult<MutationOutcome> {
        let request = self.orchestrator.spec().create_request(payload);
        let body = self.send(request, MutationKind::Create).await?;
        let record = decode_record(&body)?;
        self.orchestrator
            .cache()
            .apply_mutation(CachePatch::Insert(record.clone()));
        Ok(MutationOutcome::Created(record))
    }

    async fn update(&self, id: ResourceId, payload: Value) -> EngineResult<MutationOutcome> {
        let request = self.orchestrator.spec().update_request(&id, payload);
        let body = self.send(request, MutationKind::Update).await?;
        let record = decode_record(&body)?;
        self.orchestrator
            .cache()
            .apply_mutation(CachePatch::Replace(id, record.clone()));
        Ok(MutationOutcome::Updated(record))
    }

    async fn toggle_status(&self, id: ResourceId) -> EngineResult<MutationOutcome> {
        let request = self.orchestrator.spec().toggle_status_request(&id);
        let body = self.send(request, MutationKind::ToggleStatus).await?;
        let record = decode_record(&body)?;
        self.orchestrator
            .cache()
            .apply_mutation(CachePatch::Replace(id, record.clone()));
        Ok(MutationOutcome::Toggled(record))
    }

    async fn delete(&self, id: ResourceId) -> EngineResult<MutationOutcome> {
        let request = self.orchestrator.spec().delete_request(&id);
        self.send(request, MutationKind::Delete).await?;

        let effect = self
            .orchestrator
            .cache()
            .apply_mutation(CachePatch::Remove(id.clone()));
        // The delete itself succeeded; a failed resync only lands in the cache error.
        let resync = match effect {
            PatchEffect::RefetchPage(page) => Some(self.orchestrator.run_page(page).await),
            PatchEffect::Resync => Some(self.orchestrator.refresh().await),
            PatchEffect::None => None,
        };
        if let Some(Err(e)) = resync {
            warn!(collection = self.orchestrator.spec().label(), error = %e, "resync after delete failed");
        }
        Ok(MutationOutcome::Deleted { id, effect })
    }

    async fn mark_read(&self, id: ResourceId) -> EngineResult<MutationOutcome> {
        let was_unread = self.orchestrator.cache().mark_read(&id);
        if was_unread {
            if let Some(unread) = &self.unread {
                unread.decrement();
            }
        }
        let request = self.orchestrator.spec().mark_read_request(&id);
        let result = self.send(request, MutationKind::MarkRead).await;
        self.reconcile_unread(result.is_ok()).await;
        result.map(|_| MutationOutcome::MarkedRead { id, was_unread })
    }

    async fn mark_all_read(&self) -> EngineResult<MutationOutcome> {
        let count = self.orchestrator.cache().mark_all_read();
        if let Some(unread) = &self.unread {
            unread.set(0);
        }
        let request = self.orchestrator.spec().mark_all_read_request();
        let result = self.send(request, MutationKind::MarkAllRead).await;
        self.reconcile_unread(result.is_ok()).await;
        result.map(|_| MutationOutcome::MarkedAllRead { count })
    }

    async fn reconcile_unread(&self, succeeded: bool) {
        let Some(unread) = &self.unread else {
            return;
        };
        if succeeded && self.unread_reconcile == UnreadReconcile::OnFailure {
            return;
        }
        let transport = self.orchestrator.transport().as_ref();
        if let Err(e) = refresh_unread(transport, self.orchestrator.spec(), unread).await {
            warn!(error = %e, "unread count reconciliation failed");
        }
    }
}

/// Phase of the delete confirmation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePhase {
    /// Nothing requested.
    Idle,
    /// Waiting for the user to confirm or cancel.
    Requested(ResourceId),
    /// Confirmed; the delete is in flight.
    Pending(ResourceId),
}

impl DeletePhase {
    fn name(&self) -> &'static str {
        match self {
            DeletePhase::Idle => "idle",
            DeletePhase::Requested(_) => "requested",
            DeletePhase::Pending(_) => "pending",
        }
    }
}

/// Delete confirmation state machine.
///
/// `Idle -> Requested -> (cancel) Idle` or
/// `Requested -> (confirm) Pending -> Idle`, recording the error when the
/// delete failed.
#[derive(Debug)]
pub struct DeleteFlow {
    phase: Mutex<DeletePhase>,
    last_error: Mutex<Option<ErrorInfo>>,
}

impl Default for DeleteFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DeleteFlow {
    /// Creates an idle flow.
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(DeletePhase::Idle),
            last_error: Mutex::new(None),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> DeletePhase {
        self.phase.lock().clone()
    }

    /// Error of the last failed delete.
    pub fn last_error(&self) -> Option<ErrorInfo> {
        self.last_error.lock().clone()
    }

    /// Asks for confirmation to delete `id`.
    pub fn request(&self, id: impl Into<ResourceId>) -> EngineResult<()> {
        let mut phase = self.phase.lock();
        if let DeletePhase::Pending(pending) = &*phase {
            return Err(EngineError::Busy {
                key: pending.to_string(),
            });
        }
        *phase = DeletePhase::Requested(id.into());
        *self.last_error.lock() = None;
        Ok(())
    }

    /// Dismisses the confirmation.
    pub fn cancel(&self) -> EngineResult<()> {
        let mut phase = self.phase.lock();
        match &*phase {
            DeletePhase::Pending(_) => Err(EngineError::InvalidTransition {
                from: phase.name().into(),
                to: "cancelled".into(),
            }),
            _ => {
                *phase = DeletePhase::Idle;
                Ok(())
            }
        }
    }

    /// Confirms the requested delete and runs it through `reconciler`.
    ///
    /// The flow is back to idle afterwards, whatever the outcome.
    pub async fn confirm<T: Transport>(
        &self,
        reconciler: &MutationReconciler<T>,
    ) -> EngineResult<MutationOutcome> {
        let id = {
            let mut phase = self.phase.lock();
            let DeletePhase::Requested(id) = &*phase else {
                return Err(EngineError::InvalidTransition {
                    from: phase.name().into(),
                    to: "confirmed".into(),
                });
            };
            let id = id.clone();
            *phase = DeletePhase::Pending(id.clone());
            id
        };

        let _reset = PhaseReset(&self.phase);
        let result = reconciler.dispatch(MutationIntent::delete(id)).await;
        *self.last_error.lock() = result.as_ref().err().map(ErrorInfo::from);
        result
    }
}

struct PhaseReset<'a>(&'a Mutex<DeletePhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        *self.0.lock() = DeletePhase::Idle;
    }
}
