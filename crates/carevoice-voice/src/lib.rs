//! Upstream voice-session plumbing for CareVoice.
//!
//! The upstream service speaks one response at a time, so everything that
//! talks to it goes through a per-session [`Sequencer`]:
//!
//! - [`queue`]: FIFO of text waiting to be spoken.
//! - [`sequencer`]: the `Idle`/`Dispatching` state machine and the
//!   [`CommandSink`] seam it sends through.
//! - [`card`]: holds a structured card until its speech finishes, with a
//!   fallback deadline.
//! - [`connection`]: the realtime WebSocket client, split into a writer
//!   (a [`CommandSink`]) and a reader of typed [`UpstreamEvent`]s.

pub mod card;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod queue;
pub mod sequencer;

pub use card::{CardDeferral, CardPolicy, CardTiming, ReleasePath, ReleasedCard, MAX_CARD_DELAY};
pub use command::{ContentPart, ConversationItem, Role, UpstreamCommand};
pub use config::{SessionSettings, TurnDetection, VoiceLiveConfig, VoiceSettings};
pub use connection::{connect, EventSource, UpstreamReader, UpstreamWriter};
pub use error::VoiceError;
pub use event::{ErrorDetail, ResponseSummary, SessionInfo, UpstreamEvent, UpstreamMessage};
pub use queue::{OutboundQueue, QueuedResponse, ResponseTicket};
pub use sequencer::{CommandSink, Enqueued, ResponseState, Sequencer, SequencerEvent};
