//! Cue-automation tool
//!
//! All traffic goes through a [`CommandQueue`]. The link counts as connected
//! once the device answers anything; any failed or missing reply flushes the
//! queue and drops the link.

use osc_codec::Message;
use show_state::{DeviceKind, Projector};
use tokio::time::Instant;

use crate::error::{respond, CommandError, Responder};
use crate::handler::{Action, DeviceHandler};
use crate::queue::{CommandQueue, ReplyOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueCommand {
    /// Fetch the cue tree; published as a `cues` event
    GetCues,
    /// Start each cue by unique id, in order
    Fire(Vec<String>),
}

impl CueCommand {
    /// Wire messages for this command.
    pub fn to_messages(&self) -> Result<Vec<Message>, CommandError> {
        match self {
            CueCommand::GetCues => Ok(vec![Message::new(["cueLists", "cues"])]),
            CueCommand::Fire(ids) if ids.is_empty() => {
                Err(CommandError::Invalid("no cue ids to fire".to_string()))
            }
            CueCommand::Fire(ids) => ids
                .iter()
                .map(|id| {
                    if id.is_empty() || id.contains(['/', '\0']) {
                        Err(CommandError::Invalid(format!("bad cue id `{id}`")))
                    } else {
                        Ok(Message::new(["cue_id", id.as_str(), "start"]))
                    }
                })
                .collect(),
        }
    }
}

pub struct CueDevice {
    projector: Projector,
    queue: CommandQueue,
}

impl CueDevice {
    pub fn new(projector: Projector, queue: CommandQueue) -> Self {
        Self { projector, queue }
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }
}

impl DeviceHandler for CueDevice {
    type Command = CueCommand;

    fn kind(&self) -> DeviceKind {
        DeviceKind::Cues
    }

    fn on_open(&mut self, now: Instant) -> Vec<Action> {
        self.queue
            .activate(now)
            .map(Action::send)
            .into_iter()
            .collect()
    }

    fn on_message(&mut self, message: &Message, now: Instant) -> Vec<Action> {
        let mut actions = Action::publish_all(self.projector.cues(message));
        match self.queue.on_reply(message, now) {
            ReplyOutcome::Ignored => {}
            ReplyOutcome::Completed { next } => actions.extend(next.map(Action::send)),
            ReplyOutcome::Rejected { .. } => actions.push(Action::Disconnect("command rejected")),
        }
        actions
    }

    fn on_command(
        &mut self,
        command: CueCommand,
        responder: Option<Responder>,
        now: Instant,
    ) -> Vec<Action> {
        let messages = match command.to_messages() {
            Ok(messages) => messages,
            Err(e) => {
                respond(responder, Err(e));
                return Vec::new();
            }
        };

        // The caller hears back once the last message of the batch completes,
        // or as soon as the queue is flushed.
        let last = messages.len() - 1;
        let mut responder = responder;
        let mut actions = Vec::new();
        for (i, message) in messages.into_iter().enumerate() {
            let responder = if i == last { responder.take() } else { None };
            if let Some(first) = self.queue.enqueue(message, responder, now) {
                actions.push(Action::send(first));
            }
        }
        actions
    }

    fn on_sent(&mut self, message: &Message, _now: Instant) {
        self.queue.mark_sent(message);
    }

    fn deadline(&self) -> Option<Instant> {
        self.queue.deadline()
    }

    fn on_deadline(&mut self, now: Instant) -> Vec<Action> {
        if self.queue.on_timeout(now) {
            vec![Action::Disconnect("command timed out")]
        } else {
            Vec::new()
        }
    }

    fn on_teardown(&mut self) {
        self.queue
            .flush(CommandError::Flushed("connection closed".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{QueueState, ALWAYS_REPLY};
    use show_state::{ShowEvent, StateStore};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn device() -> CueDevice {
        CueDevice::new(
            Projector::new(StateStore::new()),
            CommandQueue::new(Duration::from_secs(2)),
        )
    }

    fn ok_reply(address: &[&str], extra: &str) -> Message {
        let mut segments = vec!["reply"];
        segments.extend_from_slice(address);
        Message::new(segments).with_arg(format!(r#"{{"status":"ok"{extra}}}"#))
    }

    fn sent_paths(actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send { message, .. } => Some(message.path()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_fire_messages() {
        let messages = CueCommand::Fire(vec!["A1".into(), "B2".into()])
            .to_messages()
            .unwrap();
        assert_eq!(messages[0].path(), "/cue_id/A1/start");
        assert_eq!(messages[1].path(), "/cue_id/B2/start");

        assert!(CueCommand::Fire(vec![]).to_messages().is_err());
        assert!(CueCommand::Fire(vec!["a/b".into()]).to_messages().is_err());
    }

    #[test]
    fn test_open_sends_bootstrap() {
        let mut cues = device();
        assert_eq!(sent_paths(&cues.on_open(Instant::now())), vec!["/alwaysReply"]);
        assert_eq!(cues.queue().state(), QueueState::Sending);
    }

    #[test]
    fn test_get_cues_flow() {
        let now = Instant::now();
        let mut cues = device();
        let (tx, mut rx) = oneshot::channel();

        let actions = cues.on_command(CueCommand::GetCues, Some(tx), now);
        assert_eq!(sent_paths(&actions), vec!["/alwaysReply"]);

        let actions = cues.on_message(&ok_reply(&[ALWAYS_REPLY], ""), now);
        assert_eq!(sent_paths(&actions), vec!["/cueLists/cues"]);

        let tree = r#","data":[{"listName":"Main","uniqueID":"L","type":"Cue List","cues":[]}]"#;
        let actions = cues.on_message(&ok_reply(&["cueLists", "cues"], tree), now);
        assert!(matches!(
            &actions[..],
            [Action::Publish(ShowEvent::Cues { tree })] if tree.len() == 1
        ));
        assert_eq!(rx.try_recv(), Ok(Ok(())));
        assert_eq!(cues.queue().state(), QueueState::Idle);
    }

    #[test]
    fn test_batch_responder_on_last_message() {
        let now = Instant::now();
        let mut cues = device();
        let (tx, mut rx) = oneshot::channel();
        cues.on_command(CueCommand::Fire(vec!["1".into(), "2".into()]), Some(tx), now);

        cues.on_message(&ok_reply(&[ALWAYS_REPLY], ""), now);
        cues.on_message(&ok_reply(&["cue_id", "1", "start"], ""), now);
        assert!(rx.try_recv().is_err());
        cues.on_message(&ok_reply(&["cue_id", "2", "start"], ""), now);
        assert_eq!(rx.try_recv(), Ok(Ok(())));
    }

    #[test]
    fn test_rejection_disconnects() {
        let now = Instant::now();
        let mut cues = device();
        cues.on_open(now);
        let error = Message::new(["reply", ALWAYS_REPLY]).with_arg(r#"{"status":"error"}"#);
        let actions = cues.on_message(&error, now);
        assert!(matches!(&actions[..], [Action::Disconnect(_)]));
        assert!(cues.queue().is_empty());
    }

    #[test]
    fn test_deadline_disconnects() {
        let now = Instant::now();
        let mut cues = device();
        cues.on_open(now);
        let deadline = cues.deadline().unwrap();

        assert!(cues.on_deadline(now).is_empty());
        assert!(matches!(&cues.on_deadline(deadline)[..], [Action::Disconnect(_)]));
        assert_eq!(cues.deadline(), None);
    }
}
