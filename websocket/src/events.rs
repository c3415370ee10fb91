//! Messages exchanged with WebSocket observers.

use ballot_types::{Round, RoundId, Snapshot, Timestamp, Winner};
use serde::{Deserialize, Serialize};

/// An event fanned out to every subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    /// Counters changed, or a client just connected and needs the current state.
    VoteUpdate {
        round_id: Option<RoundId>,
        red_votes: u64,
        green_votes: u64,
        seconds_remaining: u64,
    },
    /// A round was finalized.
    RoundClosed {
        round_id: RoundId,
        red_votes: u64,
        green_votes: u64,
        winner: Option<Winner>,
        closed_at: Option<Timestamp>,
    },
    /// A new round opened after the intermission.
    RoundStarted {
        round_id: RoundId,
        red_votes: u64,
        green_votes: u64,
        seconds_remaining: u64,
    },
}

impl HubEvent {
    pub fn vote_update(snapshot: Snapshot) -> Self {
        Self::VoteUpdate {
            round_id: snapshot.round_id,
            red_votes: snapshot.red_votes,
            green_votes: snapshot.green_votes,
            seconds_remaining: snapshot.seconds_remaining,
        }
    }

    pub fn round_closed(round: &Round) -> Self {
        Self::RoundClosed {
            round_id: round.id,
            red_votes: round.red_votes,
            green_votes: round.green_votes,
            winner: round.winner,
            closed_at: round.closed_at,
        }
    }

    pub fn round_started(round: &Round, seconds_remaining: u64) -> Self {
        Self::RoundStarted {
            round_id: round.id,
            red_votes: round.red_votes,
            green_votes: round.green_votes,
            seconds_remaining,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VoteUpdate { .. } => "vote_update",
            Self::RoundClosed { .. } => "round_closed",
            Self::RoundStarted { .. } => "round_started",
        }
    }
}

/// A message from an observer. Observers receive everything; the only
/// request they can make is a liveness check.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

/// A direct reply to a single observer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballot_types::WinnerRule;

    #[test]
    fn vote_update_wire_format() {
        let event = HubEvent::vote_update(Snapshot {
            round_id: Some(RoundId::new(7)),
            red_votes: 3,
            green_votes: 1,
            seconds_remaining: 42,
        });
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "vote_update",
                "round_id": 7,
                "red_votes": 3,
                "green_votes": 1,
                "seconds_remaining": 42,
            })
        );
    }

    #[test]
    fn round_closed_carries_winner() {
        let mut round = Round::open(RoundId::new(2), Timestamp::new(0));
        round.red_votes = 1;
        round.green_votes = 4;
        round.finalize(WinnerRule::StrictMajority, Timestamp::new(60));
        let json = serde_json::to_value(HubEvent::round_closed(&round)).unwrap();
        assert_eq!(json["type"], "round_closed");
        assert_eq!(json["winner"], "green");
        assert_eq!(json["closed_at"], 60);
    }

    #[test]
    fn client_ping_parses_and_garbage_does_not() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe"}"#).is_err());
    }

    #[test]
    fn server_error_wire_format() {
        let json = serde_json::to_string(&ServerMessage::Error {
            message: "nope".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"error","message":"nope"}"#);
    }
}
