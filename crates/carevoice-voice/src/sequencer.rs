//! Response sequencing against an upstream that speaks one response at a
//! time.
//!
//! The [`Sequencer`] owns the session's [`OutboundQueue`] and its
//! [`ResponseState`]. Text is dispatched as `conversation.item.create`
//! followed by `response.create`; anything enqueued while a response is in
//! flight waits until the upstream reports `response.done`.

use crate::command::UpstreamCommand;
use crate::error::VoiceError;
use crate::queue::{OutboundQueue, QueuedResponse, ResponseTicket};
use std::future::Future;
use tokio::sync::mpsc;

/// Destination for upstream commands.
pub trait CommandSink {
    fn send(
        &mut self,
        command: &UpstreamCommand,
    ) -> impl Future<Output = Result<(), VoiceError>> + Send;
}

impl CommandSink for mpsc::UnboundedSender<UpstreamCommand> {
    async fn send(&mut self, command: &UpstreamCommand) -> Result<(), VoiceError> {
        mpsc::UnboundedSender::send(self, command.clone()).map_err(|_| VoiceError::Closed)
    }
}

/// Whether a synthesis request is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    #[default]
    Idle,
    /// A request was sent and `response.done` has not arrived. `ticket` is
    /// `None` for responses not tied to queued text (the greeting).
    Dispatching { ticket: Option<ResponseTicket> },
}

impl ResponseState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Dispatching { .. })
    }

    pub fn ticket(&self) -> Option<ResponseTicket> {
        match self {
            Self::Idle => None,
            Self::Dispatching { ticket } => *ticket,
        }
    }

    /// Moves to `Dispatching`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::AlreadyActive` if a response is already in flight.
    pub fn begin(&mut self, ticket: Option<ResponseTicket>) -> Result<(), VoiceError> {
        if self.is_active() {
            return Err(VoiceError::AlreadyActive);
        }
        *self = Self::Dispatching { ticket };
        Ok(())
    }

    pub fn finish(&mut self) -> Option<ResponseTicket> {
        let ticket = self.ticket();
        *self = Self::Idle;
        ticket
    }
}

/// What happened to a spoken request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    /// Both commands were sent; the upstream is now speaking this ticket.
    Dispatched(ResponseTicket),
    /// A send failed; the text was dropped.
    Failed {
        ticket: ResponseTicket,
        error: String,
    },
    /// The upstream finished a response. `None` for untracked responses.
    Completed(Option<ResponseTicket>),
}

/// Result of [`Sequencer::enqueue`].
#[derive(Debug, Default)]
pub struct Enqueued {
    /// The ticket assigned to the text, `None` if it was blank.
    pub ticket: Option<ResponseTicket>,
    pub events: Vec<SequencerEvent>,
}

/// Serializes spoken responses for one session.
#[derive(Debug, Default)]
pub struct Sequencer {
    queue: OutboundQueue,
    state: ResponseState,
    next_ticket: u64,
    last_started: Option<ResponseTicket>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Number of responses waiting behind the in-flight one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// True once a dispatch was attempted for `ticket`, whether or not it
    /// succeeded.
    pub fn has_started(&self, ticket: ResponseTicket) -> bool {
        self.last_started.is_some_and(|last| ticket <= last)
    }

    /// Queues `text` for speech and dispatches it right away if idle.
    ///
    /// Blank text is ignored and gets no ticket.
    pub async fn enqueue<S: CommandSink>(&mut self, text: &str, sink: &mut S) -> Enqueued {
        if text.trim().is_empty() {
            tracing::debug!("ignoring blank response text");
            return Enqueued::default();
        }

        self.next_ticket += 1;
        let ticket = ResponseTicket(self.next_ticket);
        self.queue.enqueue(QueuedResponse {
            ticket,
            text: text.to_string(),
        });
        if self.state.is_active() {
            tracing::debug!(ticket = ticket.0, queued = self.queue.len(), "response queued");
        }

        let mut events = Vec::new();
        self.drain(sink, &mut events).await;
        Enqueued {
            ticket: Some(ticket),
            events,
        }
    }

    /// Sends a bare `response.create` (e.g. the connect greeting) and marks
    /// the sequencer busy until its `response.done`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::AlreadyActive` if a response is in flight, or the
    /// send error. On send failure the state is back to `Idle`.
    pub async fn begin_untracked<S: CommandSink>(&mut self, sink: &mut S) -> Result<(), VoiceError> {
        self.state.begin(None)?;
        if let Err(e) = sink.send(&UpstreamCommand::response_create()).await {
            self.state.finish();
            return Err(e);
        }
        Ok(())
    }

    /// Handles upstream `response.done`: frees the slot and dispatches the
    /// next queued response.
    pub async fn complete<S: CommandSink>(&mut self, sink: &mut S) -> Vec<SequencerEvent> {
        if !self.state.is_active() {
            tracing::debug!("response.done received while idle");
        }
        let finished = self.state.finish();
        let mut events = vec![SequencerEvent::Completed(finished)];
        self.drain(sink, &mut events).await;
        events
    }

    /// Drops queued responses and forgets the in-flight one.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.state = ResponseState::Idle;
    }

    async fn drain<S: CommandSink>(&mut self, sink: &mut S, events: &mut Vec<SequencerEvent>) {
        while let Some(item) = self.queue.dequeue_if_idle(&self.state) {
            events.push(self.dispatch(item, sink).await);
        }
    }

    async fn dispatch<S: CommandSink>(&mut self, item: QueuedResponse, sink: &mut S) -> SequencerEvent {
        let ticket = item.ticket;
        self.state = ResponseState::Dispatching {
            ticket: Some(ticket),
        };
        self.last_started = Some(ticket);

        let result = match sink.send(&UpstreamCommand::assistant_text(item.text)).await {
            Ok(()) => sink.send(&UpstreamCommand::response_create()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tracing::debug!(ticket = ticket.0, "response dispatched");
                SequencerEvent::Dispatched(ticket)
            }
            Err(e) => {
                tracing::warn!(ticket = ticket.0, "failed to dispatch response: {}", e);
                self.state = ResponseState::Idle;
                SequencerEvent::Failed {
                    ticket,
                    error: e.to_string(),
                }
            }
        }
    }
}
