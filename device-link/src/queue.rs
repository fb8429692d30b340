//! Serialized command queue for request/reply devices
//!
//! The cue tool answers each command on `/reply/<command address>` with a
//! JSON body carrying a `status`. Only one command may be outstanding; the
//! rest wait in FIFO order.
//!
//! ```text
//! Idle ──enqueue──▶ Sending ──sent──▶ AwaitingReply ──"ok"──▶ next or Idle
//!                      │                    │
//!                      └──── timeout / non-ok status / flush ──▶ Idle (queue emptied)
//! ```
//!
//! Every activation from `Idle` first sends `/alwaysReply`, which asks the
//! device to answer commands that would otherwise be silent.

use std::collections::VecDeque;
use std::time::Duration;

use osc_codec::Message;
use serde::de::IgnoredAny;
use show_state::projection::cues::reply_body;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::error::{respond, CommandError, Responder};

/// Address of the bootstrap command.
pub const ALWAYS_REPLY: &str = "alwaysReply";

/// Queue phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Sending,
    AwaitingReply,
}

/// Matches replies to the command that caused them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMatcher {
    address: Vec<String>,
}

impl ReplyMatcher {
    /// Match `/reply` followed by exactly `message`'s address.
    pub fn for_message(message: &Message) -> Self {
        Self {
            address: message.address.clone(),
        }
    }

    pub fn matches(&self, reply: &Message) -> bool {
        reply
            .strip_prefix("reply")
            .is_some_and(|rest| rest == self.address.as_slice())
    }
}

/// A command waiting for its turn or its reply.
#[derive(Debug)]
pub struct PendingCommand {
    pub message: Message,
    pub matcher: ReplyMatcher,
    pub responder: Option<Responder>,
    pub created: Instant,
}

#[derive(Debug)]
struct InFlight {
    command: PendingCommand,
    deadline: Instant,
    phase: QueueState,
}

/// Result of offering a reply to the queue.
#[derive(Debug, PartialEq)]
pub enum ReplyOutcome {
    /// Not a reply to the in-flight command
    Ignored,
    /// In-flight command completed; `next` must be sent now
    Completed { next: Option<Message> },
    /// Non-ok status; the queue has been flushed
    Rejected { status: String },
}

#[derive(Debug)]
pub struct CommandQueue {
    waiting: VecDeque<PendingCommand>,
    head: Option<InFlight>,
    timeout: Duration,
}

impl CommandQueue {
    pub fn new(timeout: Duration) -> Self {
        Self {
            waiting: VecDeque::new(),
            head: None,
            timeout,
        }
    }

    pub fn state(&self) -> QueueState {
        self.head.as_ref().map_or(QueueState::Idle, |h| h.phase)
    }

    /// Commands held, including the in-flight one.
    pub fn len(&self) -> usize {
        self.waiting.len() + usize::from(self.head.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The in-flight message.
    pub fn in_flight(&self) -> Option<&Message> {
        self.head.as_ref().map(|h| &h.command.message)
    }

    /// Deadline of the in-flight command.
    pub fn deadline(&self) -> Option<Instant> {
        self.head.as_ref().map(|h| h.deadline)
    }

    /// Append a command. If the queue was idle, returns the message to send
    /// now (always the bootstrap).
    pub fn enqueue(
        &mut self,
        message: Message,
        responder: Option<Responder>,
        now: Instant,
    ) -> Option<Message> {
        self.waiting.push_back(PendingCommand {
            matcher: ReplyMatcher::for_message(&message),
            message,
            responder,
            created: now,
        });
        self.activate(now)
    }

    /// Start processing if idle, sending the bootstrap first even when
    /// nothing else is waiting.
    pub fn activate(&mut self, now: Instant) -> Option<Message> {
        if self.head.is_some() {
            return None;
        }
        let bootstrap = Message::new([ALWAYS_REPLY]);
        self.waiting.push_front(PendingCommand {
            matcher: ReplyMatcher::for_message(&bootstrap),
            message: bootstrap,
            responder: None,
            created: now,
        });
        self.promote(now)
    }

    fn promote(&mut self, now: Instant) -> Option<Message> {
        let command = self.waiting.pop_front()?;
        let message = command.message.clone();
        self.head = Some(InFlight {
            command,
            deadline: now + self.timeout,
            phase: QueueState::Sending,
        });
        Some(message)
    }

    /// The in-flight message reached the socket.
    pub fn mark_sent(&mut self, message: &Message) {
        if let Some(head) = &mut self.head {
            if head.phase == QueueState::Sending && head.command.message == *message {
                head.phase = QueueState::AwaitingReply;
            }
        }
    }

    /// Offer an inbound message.
    pub fn on_reply(&mut self, reply: &Message, now: Instant) -> ReplyOutcome {
        let Some(head) = &self.head else {
            return ReplyOutcome::Ignored;
        };
        if !head.command.matcher.matches(reply) {
            return ReplyOutcome::Ignored;
        }

        let status = match reply_body::<IgnoredAny>(reply) {
            Ok(body) => body.status,
            Err(e) => {
                error!("Unreadable reply {}: {}", reply, e);
                None
            }
        };

        match status.as_deref() {
            Some("ok") => {
                if let Some(done) = self.head.take() {
                    debug!(
                        "{} completed after {:?}",
                        done.command.message,
                        now.saturating_duration_since(done.command.created)
                    );
                    respond(done.command.responder, Ok(()));
                }
                ReplyOutcome::Completed {
                    next: self.promote(now),
                }
            }
            other => {
                let status = other.unwrap_or("<missing>").to_string();
                error!("Reply {} has status `{}`, clearing queue", reply, status);
                self.flush(CommandError::Rejected(status.clone()));
                ReplyOutcome::Rejected { status }
            }
        }
    }

    /// Flush if the in-flight command's deadline passed. Returns whether it
    /// did.
    pub fn on_timeout(&mut self, now: Instant) -> bool {
        match &self.head {
            Some(head) if head.deadline <= now => {
                error!(
                    "{} timed out after {:?}, clearing queue",
                    head.command.message, self.timeout
                );
                self.flush(CommandError::TimedOut(self.timeout));
                true
            }
            _ => false,
        }
    }

    /// Drop everything. The in-flight command gets `error`; waiting commands
    /// are told they were discarded. Returns how many commands were dropped.
    pub fn flush(&mut self, error: CommandError) -> usize {
        let dropped = self.len();
        let reason = error.to_string();
        if let Some(head) = self.head.take() {
            respond(head.command.responder, Err(error));
        }
        for command in self.waiting.drain(..) {
            respond(command.responder, Err(CommandError::Flushed(reason.clone())));
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;
    use tokio::sync::oneshot::error::TryRecvError;

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn reply(address: &[&str], status: &str) -> Message {
        let mut segments = vec!["reply"];
        segments.extend_from_slice(address);
        Message::new(segments).with_arg(format!(r#"{{"status":"{status}"}}"#))
    }

    fn cue(id: &str) -> Message {
        Message::new(["cue_id", id, "start"])
    }

    #[test]
    fn test_matcher() {
        let matcher = ReplyMatcher::for_message(&Message::new(["cueLists", "cues"]));
        assert!(matcher.matches(&reply(&["cueLists", "cues"], "ok")));
        assert!(!matcher.matches(&reply(&["cueLists"], "ok")));
        assert!(!matcher.matches(&reply(&["cueLists", "cues", "x"], "ok")));
        assert!(!matcher.matches(&Message::new(["cueLists", "cues"])));
    }

    #[test]
    fn test_activation_sends_bootstrap_first() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        assert_eq!(queue.state(), QueueState::Idle);

        let first = queue.enqueue(cue("A"), None, now);
        assert_eq!(first, Some(Message::new([ALWAYS_REPLY])));
        assert_eq!(queue.state(), QueueState::Sending);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.deadline(), Some(now + TIMEOUT));

        // Already active: no second bootstrap.
        assert_eq!(queue.enqueue(cue("B"), None, now), None);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_fifo_order() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        queue.enqueue(cue("A"), None, now);
        queue.enqueue(cue("B"), None, now);
        queue.enqueue(cue("C"), None, now);

        let mut sent = Vec::new();
        let mut next = queue.in_flight().cloned();
        while let Some(message) = next {
            queue.mark_sent(&message);
            assert_eq!(queue.state(), QueueState::AwaitingReply);
            let address: Vec<&str> = message.address.iter().map(String::as_str).collect();
            sent.push(message.path());
            next = match queue.on_reply(&reply(&address, "ok"), now) {
                ReplyOutcome::Completed { next } => next,
                other => panic!("unexpected {other:?}"),
            };
        }

        assert_eq!(
            sent,
            vec!["/alwaysReply", "/cue_id/A/start", "/cue_id/B/start", "/cue_id/C/start"]
        );
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_unrelated_reply_is_ignored() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        queue.enqueue(cue("A"), None, now);

        assert_eq!(
            queue.on_reply(&reply(&["cue_id", "A", "start"], "ok"), now),
            ReplyOutcome::Ignored
        );
        assert_eq!(queue.on_reply(&Message::new(["state"]), now), ReplyOutcome::Ignored);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_completion_resolves_responder() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        let (tx, mut rx) = oneshot::channel();
        queue.enqueue(cue("A"), Some(tx), now);

        queue.on_reply(&reply(&[ALWAYS_REPLY], "ok"), now);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        let outcome = queue.on_reply(&reply(&["cue_id", "A", "start"], "ok"), now);
        assert_eq!(outcome, ReplyOutcome::Completed { next: None });
        assert_eq!(rx.try_recv(), Ok(Ok(())));
    }

    #[test]
    fn test_error_status_flushes_everything() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        queue.enqueue(cue("A"), Some(tx_a), now);
        queue.enqueue(cue("B"), Some(tx_b), now);
        queue.on_reply(&reply(&[ALWAYS_REPLY], "ok"), now);

        let outcome = queue.on_reply(&reply(&["cue_id", "A", "start"], "error"), now);
        assert_eq!(
            outcome,
            ReplyOutcome::Rejected {
                status: "error".to_string()
            }
        );
        assert!(queue.is_empty());
        assert_eq!(queue.state(), QueueState::Idle);
        assert_eq!(rx_a.try_recv(), Ok(Err(CommandError::Rejected("error".into()))));
        assert!(matches!(rx_b.try_recv(), Ok(Err(CommandError::Flushed(_)))));
    }

    #[test]
    fn test_missing_status_is_a_rejection() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        queue.activate(now);

        let bare = Message::new(["reply", ALWAYS_REPLY]);
        assert!(matches!(
            queue.on_reply(&bare, now),
            ReplyOutcome::Rejected { .. }
        ));

        queue.activate(now);
        let no_status = Message::new(["reply", ALWAYS_REPLY]).with_arg(r#"{"data":1}"#);
        assert_eq!(
            queue.on_reply(&no_status, now),
            ReplyOutcome::Rejected {
                status: "<missing>".to_string()
            }
        );
    }

    #[test]
    fn test_timeout_flushes() {
        let now = Instant::now();
        let mut queue = CommandQueue::new(TIMEOUT);
        let (tx, mut rx) = oneshot::channel();
        queue.enqueue(cue("A"), Some(tx), now);

        assert!(!queue.on_timeout(now + TIMEOUT / 2));
        assert!(queue.on_timeout(now + TIMEOUT));
        assert!(queue.is_empty());
        assert_eq!(queue.deadline(), None);
        assert!(matches!(rx.try_recv(), Ok(Err(CommandError::Flushed(_)))));

        // A fresh activation starts over with the bootstrap.
        assert_eq!(
            queue.enqueue(cue("B"), None, now),
            Some(Message::new([ALWAYS_REPLY]))
        );
    }

    #[test]
    fn test_next_command_gets_fresh_deadline() {
        let start = Instant::now();
        let later = start + Duration::from_millis(1500);
        let mut queue = CommandQueue::new(TIMEOUT);
        queue.enqueue(cue("A"), None, start);

        queue.on_reply(&reply(&[ALWAYS_REPLY], "ok"), later);
        assert_eq!(queue.deadline(), Some(later + TIMEOUT));
    }

    proptest::proptest! {
        #[test]
        fn prop_every_responder_resolved_once(
            count in 1usize..8,
            fail_at in proptest::option::of(0usize..8),
        ) {
            let now = Instant::now();
            let mut queue = CommandQueue::new(TIMEOUT);
            let mut receivers = Vec::new();
            for i in 0..count {
                let (tx, rx) = oneshot::channel();
                queue.enqueue(cue(&i.to_string()), Some(tx), now);
                receivers.push(rx);
            }
            queue.on_reply(&reply(&[ALWAYS_REPLY], "ok"), now);

            let mut answered = 0;
            while let Some(message) = queue.in_flight().cloned() {
                let address: Vec<&str> = message.address.iter().map(String::as_str).collect();
                let status = if fail_at == Some(answered) { "error" } else { "ok" };
                queue.on_reply(&reply(&address, status), now);
                answered += 1;
                proptest::prop_assert!(queue.len() <= count - answered);
            }

            proptest::prop_assert!(queue.is_empty());
            for (i, mut rx) in receivers.into_iter().enumerate() {
                let outcome = rx.try_recv();
                match fail_at {
                    Some(f) if i == f => proptest::prop_assert_eq!(
                        outcome,
                        Ok(Err(CommandError::Rejected("error".into())))
                    ),
                    Some(f) if i > f => proptest::prop_assert!(
                        matches!(outcome, Ok(Err(CommandError::Flushed(_))))
                    ),
                    _ => proptest::prop_assert_eq!(outcome, Ok(Ok(()))),
                }
            }
        }
    }
}
