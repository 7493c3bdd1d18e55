//! Per-request state and the handles callers observe it through
//!
//! Every request starts `Loading` and moves exactly once to `Success` or
//! `Failed`. A [`RequestHandle`] can be awaited, turned into a stream, or
//! bound to a callback; dropping or cancelling it detaches only this caller.

use std::sync::Arc;

use bytes::Bytes;
use futures::{future, stream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;
use url::Url;

use crate::app::coordinator::stats::{StatEvent, StatsCounters};
use crate::app::key::CacheKey;
use crate::errors::FetchError;

/// Observable state of one request
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    /// Not resolved yet
    Loading,
    /// Bytes are available
    Success(Bytes),
    /// The network path failed
    Failed(FetchError),
}

impl RequestState {
    /// Whether no further transition will happen
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestState::Loading)
    }

    /// Payload of a successful request
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            RequestState::Success(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Error of a failed request
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            RequestState::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Caller-side handle for one request
///
/// Dropping the handle before it reaches a terminal state cancels it. Other
/// callers waiting on the same key are unaffected.
#[derive(Debug)]
pub struct RequestHandle {
    key: CacheKey,
    locator: Url,
    receiver: watch::Receiver<RequestState>,
    task: Option<AbortHandle>,
    stats: Arc<StatsCounters>,
}

impl RequestHandle {
    pub(crate) fn new(
        key: CacheKey,
        locator: Url,
        receiver: watch::Receiver<RequestState>,
        task: Option<AbortHandle>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            key,
            locator,
            receiver,
            task,
            stats,
        }
    }

    /// Key this request resolves
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Locator used on a cache miss
    pub fn locator(&self) -> &Url {
        &self.locator
    }

    /// Current state snapshot
    pub fn state(&self) -> RequestState {
        self.receiver.borrow().clone()
    }

    /// Wait for the terminal state
    pub async fn wait(&self) -> RequestState {
        let mut receiver = self.receiver.clone();
        let terminal = receiver
            .wait_for(RequestState::is_terminal)
            .await
            .map(|state| state.clone());

        match terminal {
            Ok(state) => state,
            // Resolver went away without publishing
            Err(_) => RequestState::Failed(FetchError::Interrupted {
                url: self.locator.to_string(),
            }),
        }
    }

    /// Stream of state transitions: `Loading`, then the terminal state
    pub fn into_stream(self) -> impl Stream<Item = RequestState> + Send + 'static {
        stream::once(future::ready(RequestState::Loading))
            .chain(stream::once(async move { self.wait().await }))
    }

    /// Deliver `Loading` and then the terminal state to `callback`
    ///
    /// Must be called from within a tokio runtime. Cancelling or dropping the
    /// returned [`Subscription`] cancels the request.
    pub fn subscribe<F>(self, mut callback: F) -> Subscription
    where
        F: FnMut(RequestState) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            callback(RequestState::Loading);
            callback(self.wait().await);
        });
        Subscription { task }
    }

    /// Detach this caller from the request
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if self.receiver.borrow().is_terminal() || task.is_finished() {
            return;
        }

        task.abort();
        self.stats.record(StatEvent::Cancelled);
        debug!(key = %self.key, "Request cancelled");
    }
}

/// Callback registration returned by [`RequestHandle::subscribe`]
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivering states and detach from the request
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the terminal state has been delivered
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the terminal state has been delivered
    pub async fn finished(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
