//! Confirmation gate
//!
//! Decouples the code that asks "are you sure?" from the code that shows
//! the question. Two paths are offered:
//!
//! - **broadcast**: [`ConfirmationGate::publish`] puts a message on a
//!   shared channel and every listener filters by [`TargetTag`]. Answers go
//!   back on the same channel, so two requests with the same tag cannot be
//!   told apart.
//! - **ticket**: [`ConfirmationGate::request`] registers the message under
//!   its [`CorrelationId`] and returns a [`ConfirmationTicket`] that
//!   resolves with the answer to exactly that request. Ticket answers are
//!   delivered point to point and are not rebroadcast as `Confirmed`, not
//!   even once the ticket has been dropped.
//!
//! A gate is an explicit handle. Clones share the same channel.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use jobwatch_core::domain::job::Job;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

/// Messages buffered per subscriber before it starts lagging
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Withdrawn requests remembered so that late answers to them are dropped
const WITHDRAWN_MEMORY: usize = 64;

/// Identifies the kind of request a confirmation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetTag {
    StopGc,
    StopPurge,
    StopExecutions,
}

/// Where a confirmation stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
    Requested,
    Confirmed,
    Canceled,
}

/// Button layout the dialog host should offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationButtons {
    ConfirmCancel,
    StopCancel,
    DeleteCancel,
}

/// Unique identity of one confirmation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A question for the user, and eventually its answer
#[derive(Debug, Clone)]
pub struct ConfirmationMessage {
    pub id: CorrelationId,
    pub target: TargetTag,
    /// The jobs the request would act on
    pub payload: Vec<Job>,
    pub title: String,
    pub summary: String,
    pub buttons: ConfirmationButtons,
    pub state: ConfirmationState,
}

impl ConfirmationMessage {
    /// Creates a new message in the `Requested` state
    pub fn new(
        target: TargetTag,
        payload: Vec<Job>,
        title: impl Into<String>,
        summary: impl Into<String>,
        buttons: ConfirmationButtons,
    ) -> Self {
        Self {
            id: CorrelationId::new(),
            target,
            payload,
            title: title.into(),
            summary: summary.into(),
            buttons,
            state: ConfirmationState::Requested,
        }
    }

    /// The same request carrying `state`
    pub fn with_state(&self, state: ConfirmationState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

/// Where an answer to a message has to go
enum Route {
    Ticket(oneshot::Sender<ConfirmationState>),
    Withdrawn,
    Broadcast,
}

#[derive(Default)]
struct Tickets {
    waiting: HashMap<CorrelationId, oneshot::Sender<ConfirmationState>>,
    withdrawn: VecDeque<CorrelationId>,
}

impl Tickets {
    fn withdraw(&mut self, id: CorrelationId) {
        if self.waiting.remove(&id).is_some() {
            if self.withdrawn.len() == WITHDRAWN_MEMORY {
                self.withdrawn.pop_front();
            }
            self.withdrawn.push_back(id);
        }
    }

    fn route(&mut self, id: CorrelationId) -> Route {
        if let Some(sender) = self.waiting.remove(&id) {
            return Route::Ticket(sender);
        }
        match self.withdrawn.iter().position(|withdrawn| *withdrawn == id) {
            Some(index) => {
                self.withdrawn.remove(index);
                Route::Withdrawn
            }
            None => Route::Broadcast,
        }
    }
}

struct GateInner {
    sender: broadcast::Sender<ConfirmationMessage>,
    tickets: Mutex<Tickets>,
}

impl GateInner {
    fn tickets(&self) -> MutexGuard<'_, Tickets> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared channel between confirmation requesters and the dialog host
#[derive(Clone)]
pub struct ConfirmationGate {
    inner: Arc<GateInner>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(GateInner {
                sender,
                tickets: Mutex::new(Tickets::default()),
            }),
        }
    }

    /// Broadcasts a message to every subscriber
    ///
    /// Returns the number of subscribers that received it. Publishing with
    /// no subscriber is not an error.
    pub fn publish(&self, message: ConfirmationMessage) -> usize {
        debug!(
            "Publishing {:?} confirmation {} for {:?}",
            message.state, message.id, message.target
        );
        self.inner.sender.send(message).unwrap_or(0)
    }

    /// Subscribes to confirmed messages for one target
    ///
    /// Dropping the subscription unsubscribes.
    pub fn subscribe(&self, target: TargetTag) -> GateSubscription {
        GateSubscription {
            target,
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Subscribes to every message regardless of target or state
    ///
    /// This is what a dialog host listens on to see new requests.
    pub fn subscribe_all(&self) -> broadcast::Receiver<ConfirmationMessage> {
        self.inner.sender.subscribe()
    }

    /// Asks for a confirmation and returns a ticket for its answer
    ///
    /// The message is broadcast in the `Requested` state so a dialog host
    /// can show it.
    pub fn request(&self, message: ConfirmationMessage) -> ConfirmationTicket {
        let message = message.with_state(ConfirmationState::Requested);
        let id = message.id;
        let (sender, receiver) = oneshot::channel();
        self.inner.tickets().waiting.insert(id, sender);
        self.publish(message);

        ConfirmationTicket {
            id,
            receiver: Some(receiver),
            gate: Arc::downgrade(&self.inner),
        }
    }

    /// Answers a request
    ///
    /// If the request was made through [`ConfirmationGate::request`] its
    /// ticket resolves with `state`, and an answer to a withdrawn request
    /// is dropped. Otherwise the answer is broadcast so that subscribers
    /// for the message's target can react.
    pub fn acknowledge(&self, message: &ConfirmationMessage, state: ConfirmationState) {
        let route = self.inner.tickets().route(message.id);
        match route {
            Route::Ticket(sender) => {
                debug!("Resolving confirmation {} as {:?}", message.id, state);
                if sender.send(state).is_err() {
                    debug!("Confirmation {} was abandoned by its requester", message.id);
                }
            }
            Route::Withdrawn => {
                debug!("Dropping {:?} answer to withdrawn confirmation {}", state, message.id);
            }
            Route::Broadcast => {
                self.publish(message.with_state(state));
            }
        }
    }

    /// Number of ticket requests still waiting for an answer
    pub fn pending_requests(&self) -> usize {
        self.inner.tickets().waiting.len()
    }
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Confirmed messages for one target
pub struct GateSubscription {
    target: TargetTag,
    receiver: broadcast::Receiver<ConfirmationMessage>,
}

impl GateSubscription {
    pub fn target(&self) -> TargetTag {
        self.target
    }

    fn accepts(&self, message: &ConfirmationMessage) -> bool {
        message.target == self.target && message.state == ConfirmationState::Confirmed
    }

    /// Waits for the next confirmed message for this target
    ///
    /// Returns `None` once every gate handle is gone.
    pub async fn next_confirmed(&mut self) -> Option<ConfirmationMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.accepts(&message) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Confirmation subscriber lagged, {} messages skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already delivered confirmed message, without waiting
    pub fn try_next_confirmed(&mut self) -> Option<ConfirmationMessage> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) if self.accepts(&message) => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Confirmation subscriber lagged, {} messages skipped", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

/// Answer to one correlated confirmation request
///
/// Dropping an unresolved ticket withdraws the request.
pub struct ConfirmationTicket {
    id: CorrelationId,
    receiver: Option<oneshot::Receiver<ConfirmationState>>,
    gate: Weak<GateInner>,
}

impl ConfirmationTicket {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Waits for the answer
    ///
    /// A request that can no longer be answered resolves as `Canceled`.
    pub async fn outcome(mut self) -> ConfirmationState {
        match self.receiver.take() {
            Some(receiver) => receiver.await.unwrap_or(ConfirmationState::Canceled),
            None => ConfirmationState::Canceled,
        }
    }
}

impl Drop for ConfirmationTicket {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.upgrade() {
            gate.tickets().withdraw(self.id);
        }
    }
}
