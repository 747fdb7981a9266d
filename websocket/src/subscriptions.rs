//! Client protocol: topics, client messages and server replies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::task::JoinHandle;

use selection_actions::Action;

use crate::command::{AdminCommand, AdminReply};

/// Available subscription topics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTopic {
    /// Round state after every vote, tick and admin change.
    VoteUpdate,
    /// Finished rounds and their dispatch outcome.
    Resolution,
    /// Operator action log lines.
    ActionLog,
}

impl SubscriptionTopic {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTopic::VoteUpdate => "vote_update",
            SubscriptionTopic::Resolution => "resolution",
            SubscriptionTopic::ActionLog => "action_log",
        }
    }
}

impl fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message from a client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        topic: SubscriptionTopic,
    },
    Unsubscribe {
        topic: SubscriptionTopic,
    },
    Ping,
    CastVote {
        voter: String,
        code: String,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    GetActions,
    Admin {
        command: AdminCommand,
    },
}

/// A direct reply to a client message. Topic events use their own envelope.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ack {
        action: String,
        topic: SubscriptionTopic,
    },
    Pong,
    Error {
        message: String,
    },
    VoteResult {
        accepted: bool,
    },
    Actions {
        actions: Vec<Action>,
    },
    AdminResult {
        command: String,
        #[serde(flatten)]
        reply: AdminReply,
    },
}

/// One client's subscriptions: the forwarder task per subscribed topic.
///
/// Replacing or removing a topic aborts its forwarder, and so does dropping
/// the whole set when the client disconnects.
#[derive(Debug, Default)]
pub struct ClientSubscriptions {
    forwarders: HashMap<SubscriptionTopic, JoinHandle<()>>,
}

impl ClientSubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start forwarding `topic` through `forwarder`, replacing any earlier one.
    pub fn subscribe(&mut self, topic: SubscriptionTopic, forwarder: JoinHandle<()>) {
        if let Some(old) = self.forwarders.insert(topic, forwarder) {
            old.abort();
        }
    }

    /// Returns whether the client was subscribed.
    pub fn unsubscribe(&mut self, topic: &SubscriptionTopic) -> bool {
        match self.forwarders.remove(topic) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self, topic: &SubscriptionTopic) -> bool {
        self.forwarders.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.forwarders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwarders.is_empty()
    }
}

impl Drop for ClientSubscriptions {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_messages() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe","topic":"vote_update"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                topic: SubscriptionTopic::VoteUpdate
            }
        );

        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"cast_vote","voter":"alice","code":"K"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CastVote {
                voter: "alice".into(),
                code: "K".into(),
                timestamp: None
            }
        );

        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"admin","command":{"type":"remove_vote","code":"l"}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Admin {
                command: AdminCommand::RemoveVote { code: "l".into() }
            }
        );
    }

    #[test]
    fn rejects_unknown_topics() {
        let res = serde_json::from_str::<ClientMessage>(r#"{"action":"subscribe","topic":"blocks"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn admin_result_flattens_reply() {
        let msg = ServerMessage::AdminResult {
            command: "reset".into(),
            reply: AdminReply::ok("Votes reset"),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "admin_result");
        assert_eq!(json["ok"], true);
        assert_eq!(json["message"], "Votes reset");
    }

    /// Give an aborted task a few scheduler turns to wind down.
    async fn settles(task: &tokio::task::AbortHandle) -> bool {
        for _ in 0..20 {
            if task.is_finished() {
                return true;
            }
            tokio::task::yield_now().await;
        }
        task.is_finished()
    }

    #[tokio::test]
    async fn resubscribing_replaces_the_forwarder() {
        let mut subs = ClientSubscriptions::new();
        let first = tokio::spawn(std::future::pending::<()>());
        let first_abort = first.abort_handle();
        subs.subscribe(SubscriptionTopic::ActionLog, first);
        subs.subscribe(
            SubscriptionTopic::ActionLog,
            tokio::spawn(std::future::pending::<()>()),
        );

        assert_eq!(subs.len(), 1);
        assert!(subs.is_subscribed(&SubscriptionTopic::ActionLog));
        assert!(settles(&first_abort).await);

        assert!(subs.unsubscribe(&SubscriptionTopic::ActionLog));
        assert!(!subs.unsubscribe(&SubscriptionTopic::ActionLog));
        assert!(!subs.is_subscribed(&SubscriptionTopic::ActionLog));
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn dropping_aborts_every_forwarder() {
        let mut subs = ClientSubscriptions::new();
        let forwarder = tokio::spawn(std::future::pending::<()>());
        let abort = forwarder.abort_handle();
        subs.subscribe(SubscriptionTopic::VoteUpdate, forwarder);
        drop(subs);
        assert!(settles(&abort).await);
    }
}
