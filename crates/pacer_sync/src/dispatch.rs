//! Dispatcher boundary between the queue and the remote API
//!
//! The coordinator only knows that a [`Dispatcher`] turns a queued action into
//! success or a failure reason. [`DispatchTable`] is the explicit
//! kind-to-handler map used by callers that wire handlers one by one; a kind
//! without a handler fails loudly instead of being skipped.

use crate::action::{ActionKind, PendingAction, QueuedAction};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Why a single replay failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The server answered and refused the request
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The request never got an answer
    #[error("network failure: {0}")]
    Transport(String),

    #[error("no handler registered for {0}")]
    Unhandled(ActionKind),
}

impl DispatchError {
    /// Worth retrying at the transport level
    pub fn is_transient(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}

/// Replays one queued action against the remote API
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, action: &QueuedAction) -> Result<(), DispatchError>;
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for std::sync::Arc<D> {
    async fn dispatch(&self, action: &QueuedAction) -> Result<(), DispatchError> {
        (**self).dispatch(action).await
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), DispatchError>> + Send>>;

type Handler = Box<dyn Fn(PendingAction) -> HandlerFuture + Send + Sync>;

/// Explicit mapping from action kind to handler
#[derive(Default)]
pub struct DispatchTable {
    handlers: HashMap<ActionKind, Handler>,
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("DispatchTable").field("kinds", &kinds).finish()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, replacing any previous one
    pub fn on<F, Fut>(mut self, kind: ActionKind, handler: F) -> Self
    where
        F: Fn(PendingAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        self.handlers
            .insert(kind, Box::new(move |action| Box::pin(handler(action))));
        self
    }

    pub fn handles(&self, kind: ActionKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Kinds that would fail with [`DispatchError::Unhandled`]
    pub fn missing_kinds(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| !self.handles(*kind))
            .collect()
    }
}

#[async_trait]
impl Dispatcher for DispatchTable {
    async fn dispatch(&self, action: &QueuedAction) -> Result<(), DispatchError> {
        match self.handlers.get(&action.kind()) {
            Some(handler) => handler(action.action.clone()).await,
            None => Err(DispatchError::Unhandled(action.kind())),
        }
    }
}

/// Dispatcher backed by a synchronous closure
pub struct FnDispatcher<F>(pub F);

#[async_trait]
impl<F> Dispatcher for FnDispatcher<F>
where
    F: Fn(&QueuedAction) -> Result<(), DispatchError> + Send + Sync,
{
    async fn dispatch(&self, action: &QueuedAction) -> Result<(), DispatchError> {
        (self.0)(action)
    }
}
