//! Deferred card delivery.
//!
//! A card is held until the response it belongs to finishes playing, or
//! until a fallback deadline passes, whichever comes first. The fallback
//! deadline is only armed once the response was dispatched, so a card never
//! reaches the client ahead of its speech request.
//!
//! A second, longer stall deadline is armed when the card is scheduled. It
//! covers a lost `response.done` for an earlier response, which would
//! otherwise hold the queue (and the card) forever.
//!
//! Cards wait in ticket order. [`CardDeferral`] holds no timer itself. The
//! session loop sleeps until [`CardDeferral::deadline`] and then calls
//! [`CardDeferral::expire`].

use crate::queue::ResponseTicket;
use crate::sequencer::SequencerEvent;
use carevoice_types::Card;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound for every card delay.
pub const MAX_CARD_DELAY: Duration = Duration::from_secs(3600);

/// When a card may be shown relative to its speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardTiming {
    /// Wait for playback to finish; fall back after `fallback`.
    #[default]
    PostSpeech,
    /// Show the card while speech is still playing, after `pre_speech`.
    PreSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardPolicy {
    pub timing: CardTiming,
    pub fallback: Duration,
    pub pre_speech: Duration,
    /// Measured from scheduling; releases a card whose response never got
    /// dispatched.
    pub stall: Duration,
}

impl Default for CardPolicy {
    fn default() -> Self {
        Self {
            timing: CardTiming::PostSpeech,
            fallback: Duration::from_secs(3),
            pre_speech: Duration::from_millis(1500),
            stall: Duration::from_secs(15),
        }
    }
}

impl CardPolicy {
    /// Delay between dispatch and the fallback deadline.
    pub fn delay(&self) -> Duration {
        let delay = match self.timing {
            CardTiming::PostSpeech => self.fallback,
            CardTiming::PreSpeech => self.pre_speech,
        };
        delay.min(MAX_CARD_DELAY)
    }

    /// Delay between scheduling and the stall deadline. Never shorter than
    /// [`delay`](Self::delay).
    pub fn stall_delay(&self) -> Duration {
        self.stall.min(MAX_CARD_DELAY).max(self.delay())
    }
}

/// How a card reached the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePath {
    /// Its response finished playing.
    Completion,
    /// The deadline after dispatch passed first.
    Fallback,
    /// Its response was never dispatched before the stall deadline.
    Stalled,
    /// Sent without waiting, there was no response to wait for.
    Immediate,
}

impl ReleasePath {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Fallback => "fallback",
            Self::Stalled => "stalled",
            Self::Immediate => "immediate",
        }
    }
}

impl std::fmt::Display for ReleasePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A card handed back for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasedCard {
    pub card: Card,
    pub ticket: ResponseTicket,
    pub path: ReleasePath,
}

#[derive(Debug)]
struct PendingCard {
    card: Card,
    ticket: ResponseTicket,
    fallback_at: Option<Instant>,
    stall_at: Instant,
}

impl PendingCard {
    fn deadline(&self) -> Instant {
        match self.fallback_at {
            Some(at) => at.min(self.stall_at),
            None => self.stall_at,
        }
    }

    fn expiry_path(&self, now: Instant) -> Option<ReleasePath> {
        match self.fallback_at {
            Some(at) if now >= at.min(self.stall_at) => Some(ReleasePath::Fallback),
            None if now >= self.stall_at => Some(ReleasePath::Stalled),
            _ => None,
        }
    }
}

/// Undelivered cards, oldest ticket first.
///
/// Dispatch is FIFO and every card uses the same delays, so deadlines never
/// decrease along the queue and releases always come off the front.
#[derive(Debug, Default)]
pub struct CardDeferral {
    policy: CardPolicy,
    pending: VecDeque<PendingCard>,
}

impl CardDeferral {
    pub fn new(policy: CardPolicy) -> Self {
        Self {
            policy,
            pending: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> CardPolicy {
        self.policy
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ticket of the response the oldest pending card waits on.
    pub fn pending_ticket(&self) -> Option<ResponseTicket> {
        self.pending.front().map(|p| p.ticket)
    }

    /// The instant the oldest pending card is released without completion.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.front().map(PendingCard::deadline)
    }

    /// Holds `card` until `ticket` completes or a deadline passes.
    ///
    /// Pass `dispatched = true` when the sequencer already started `ticket`;
    /// the fallback deadline is then armed from `now`. Otherwise it is armed
    /// when [`observe`](Self::observe) sees the dispatch. Cards already
    /// waiting stay queued ahead of this one.
    pub fn schedule(&mut self, card: Card, ticket: ResponseTicket, dispatched: bool, now: Instant) {
        self.pending.push_back(PendingCard {
            card,
            ticket,
            fallback_at: dispatched.then(|| now + self.policy.delay()),
            stall_at: now + self.policy.stall_delay(),
        });
    }

    /// Replaces every pending card with `card`, returning the ones dropped
    /// undelivered.
    pub fn supersede(
        &mut self,
        card: Card,
        ticket: ResponseTicket,
        dispatched: bool,
        now: Instant,
    ) -> Vec<Card> {
        let dropped = self.clear();
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), ticket = ticket.0, "pending cards superseded");
        }
        self.schedule(card, ticket, dispatched, now);
        dropped
    }

    /// Feeds a sequencer event.
    ///
    /// Completion of a response releases every card attached to it or to an
    /// earlier one. Dispatch or failure of a card's response arms its
    /// fallback deadline.
    pub fn observe(&mut self, event: &SequencerEvent, now: Instant) -> Vec<ReleasedCard> {
        match event {
            SequencerEvent::Completed(Some(done)) => {
                let mut released = Vec::new();
                while self.pending.front().is_some_and(|p| p.ticket <= *done) {
                    released.extend(self.pop(ReleasePath::Completion));
                }
                released
            }
            SequencerEvent::Dispatched(ticket) | SequencerEvent::Failed { ticket, .. } => {
                let delay = self.policy.delay();
                for pending in self.pending.iter_mut() {
                    if pending.ticket == *ticket && pending.fallback_at.is_none() {
                        pending.fallback_at = Some(now + delay);
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Releases the cards whose deadline has passed, oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<ReleasedCard> {
        let mut released = Vec::new();
        while let Some(path) = self.pending.front().and_then(|p| p.expiry_path(now)) {
            let Some(card) = self.pop(path) else {
                break;
            };
            match path {
                ReleasePath::Stalled => tracing::warn!(
                    ticket = card.ticket.0,
                    "response never dispatched, releasing its card"
                ),
                _ => tracing::info!(ticket = card.ticket.0, "card delivered by fallback timer"),
            }
            released.push(card);
        }
        released
    }

    /// Drops all pending cards undelivered.
    pub fn clear(&mut self) -> Vec<Card> {
        self.pending.drain(..).map(|p| p.card).collect()
    }

    fn pop(&mut self, path: ReleasePath) -> Option<ReleasedCard> {
        self.pending.pop_front().map(|p| ReleasedCard {
            card: p.card,
            ticket: p.ticket,
            path,
        })
    }
}
