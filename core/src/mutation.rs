//! Mutation triggers and the errors they surface to views.

use std::collections::BTreeMap;
use std::future::Future;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::ApiError;

/// An error in the shape a view renders it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// Messages keyed by form field.
    #[error("invalid fields: {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    Fields(BTreeMap<String, String>),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Message(String),
}

impl From<&ApiError> for ViewError {
    fn from(err: &ApiError) -> Self {
        match err {
            ApiError::Validation(validation) => {
                let fields = validation.field_errors();
                if fields.is_empty() {
                    ViewError::Message(validation.message.clone())
                } else {
                    ViewError::Fields(fields)
                }
            }
            ApiError::NotFound => ViewError::NotFound,
            other => ViewError::Message(other.to_string()),
        }
    }
}

impl From<ApiError> for ViewError {
    fn from(err: ApiError) -> Self {
        ViewError::from(&err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
    Idle,
    Pending,
    /// Published while invalidation and navigation run, then back to `Idle`.
    Succeeded,
    /// Kept until the next submission or [`MutationTrigger::reset`], both of
    /// which return to `Idle`.
    Failed(ViewError),
}

/// Runs one kind of mutation and tracks Idle → Pending → Succeeded | Failed.
///
/// A run whose future is dropped before completing (a timeout, a losing
/// `select!` branch, a cancelled task) returns the trigger to `Idle`.
#[derive(Debug)]
pub struct MutationTrigger {
    name: &'static str,
    state: watch::Sender<MutationState>,
}

impl MutationTrigger {
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(MutationState::Idle);
        Self { name, state }
    }

    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    pub fn is_pending(&self) -> bool {
        *self.state.borrow() == MutationState::Pending
    }

    /// Dismiss a recorded failure. Returns `true` if there was one.
    pub fn reset(&self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, MutationState::Failed(_)) {
                *state = MutationState::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Await `op`. On success run `on_success` (invalidation, navigation)
    /// and return to `Idle`; on failure record the error and skip it.
    pub async fn run<O, Fut>(&self, op: Fut, on_success: impl FnOnce(&O)) -> Result<O, ViewError>
    where
        Fut: Future<Output = Result<O, ApiError>>,
    {
        self.reset();
        self.state.send_replace(MutationState::Pending);
        let mut guard = PendingGuard {
            trigger: self,
            finished: false,
        };
        let outcome = op.await;
        guard.finished = true;
        match outcome {
            Ok(output) => {
                self.state.send_replace(MutationState::Succeeded);
                on_success(&output);
                self.state.send_replace(MutationState::Idle);
                debug!(mutation = self.name, "mutation succeeded");
                Ok(output)
            }
            Err(err) => {
                warn!(mutation = self.name, error = %err, "mutation failed");
                let err = ViewError::from(err);
                self.state.send_replace(MutationState::Failed(err.clone()));
                Err(err)
            }
        }
    }
}

/// Puts an abandoned run back to `Idle`.
struct PendingGuard<'a> {
    trigger: &'a MutationTrigger,
    finished: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(mutation = self.trigger.name, "mutation abandoned");
            self.trigger.state.send_replace(MutationState::Idle);
        }
    }
}
