use chess::Square;
use serde::{Deserialize, Serialize};

use crate::game::scheduler::Difficulty;
use crate::game::session::GameSession;

/// Message sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClientMessage {
    pub action: String,
    pub square: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub difficulty: Option<String>,
}

/// Message sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerMessage {
    pub message_type: String,
    pub fen: Option<String>,
    pub status: Option<String>,
    pub movetext: Option<String>,
    pub origin: Option<String>,
    pub highlights: Option<Vec<String>>,
    pub last_move: Option<LastMove>,
    pub difficulty: Option<String>,
    pub thinking: Option<bool>,
    pub error: Option<String>,
}

/// Last move information
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub san: String,
}

impl ServerMessage {
    fn empty(message_type: &str) -> Self {
        Self {
            message_type: message_type.to_string(),
            fen: None,
            status: None,
            movetext: None,
            origin: None,
            highlights: None,
            last_move: None,
            difficulty: None,
            thinking: None,
            error: None,
        }
    }

    /// Full board snapshot after any change to the game.
    pub fn state(session: &GameSession, difficulty: Difficulty, thinking: bool) -> Self {
        let mut msg = Self::empty("state");
        msg.fen = Some(session.fen());
        msg.status = Some(session.status().label().to_string());
        msg.movetext = Some(session.movetext());
        msg.last_move = session.last_move().map(|record| LastMove {
            from: record.from.to_string(),
            to: record.to.to_string(),
            san: record.san.clone(),
        });
        msg.difficulty = Some(difficulty.label().to_string());
        msg.thinking = Some(thinking);
        msg
    }

    /// Selected square and where its piece may go.
    pub fn highlights(origin: Square, targets: &[Square]) -> Self {
        let mut msg = Self::empty("highlights");
        msg.origin = Some(origin.to_string());
        msg.highlights = Some(targets.iter().map(|sq| sq.to_string()).collect());
        msg
    }

    pub fn highlights_cleared() -> Self {
        let mut msg = Self::empty("highlights");
        msg.highlights = Some(Vec::new());
        msg
    }

    pub fn error(message: &str) -> Self {
        let mut msg = Self::empty("error");
        msg.error = Some(message.to_string());
        msg
    }
}
