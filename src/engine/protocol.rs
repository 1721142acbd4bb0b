//! The text side of the UCI dialogue: command builders, reply parsing,
//! and the readiness gate that holds commands back until the engine has
//! answered the handshake.

use std::collections::VecDeque;
use std::str::FromStr;

use chess::{Piece, Square};

pub const CMD_HANDSHAKE: &str = "uci";
pub const CMD_STOP: &str = "stop";
pub const CMD_QUIT: &str = "quit";

pub fn position_command(fen: &str) -> String {
    format!("position fen {}", fen)
}

pub fn go_command(depth: u8) -> String {
    format!("go depth {}", depth)
}

/// A move in coordinate form, as the engine speaks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
}

/// A line from the engine that the session cares about. Everything
/// else (id, option, info) is chatter and parses to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    UciOk,
    BestMove(BestMovePayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestMovePayload {
    Move(CoordMove),
    /// "bestmove (none)": no legal move in the searched position.
    NoMove,
    /// A bestmove line whose move field did not decode.
    Malformed,
}

pub fn parse_engine_line(line: &str) -> Option<EngineReply> {
    let mut tokens = line.split_whitespace();
    match tokens.next()? {
        "uciok" => Some(EngineReply::UciOk),
        "bestmove" => {
            let payload = match tokens.next() {
                Some("(none)") => BestMovePayload::NoMove,
                Some(token) => match parse_coord_move(token) {
                    Some(mv) => BestMovePayload::Move(mv),
                    None => BestMovePayload::Malformed,
                },
                None => BestMovePayload::Malformed,
            };
            Some(EngineReply::BestMove(payload))
        }
        _ => None,
    }
}

/// Decode "e2e4" or "a7a8q".
pub fn parse_coord_move(token: &str) -> Option<CoordMove> {
    if token.len() < 4 || token.len() > 5 || !token.is_ascii() {
        return None;
    }
    let from = Square::from_str(&token[0..2]).ok()?;
    let to = Square::from_str(&token[2..4]).ok()?;
    let promotion = match token.as_bytes().get(4).copied() {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return None,
    };
    Some(CoordMove {
        from,
        to,
        promotion,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Uninitialized,
    Ready,
}

/// Holds commands back until the engine has confirmed the handshake.
/// Before "uciok" every submitted command is queued; afterwards
/// commands pass straight through. Queued commands keep their order.
#[derive(Debug)]
pub struct CommandGate {
    state: GateState,
    queue: VecDeque<String>,
}

impl Default for CommandGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Uninitialized,
            queue: VecDeque::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == GateState::Ready
    }

    /// Returns the command if it should be written now, or queues it
    /// for the handshake flush.
    pub fn submit(&mut self, command: String) -> Option<String> {
        match self.state {
            GateState::Ready => Some(command),
            GateState::Uninitialized => {
                self.queue.push_back(command);
                None
            }
        }
    }

    /// "uciok" arrived: drain the queue in submission order.
    pub fn handshake_complete(&mut self) -> Vec<String> {
        self.state = GateState::Ready;
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_handshake_reply() {
        assert_eq!(parse_engine_line("uciok"), Some(EngineReply::UciOk));
        assert_eq!(parse_engine_line("id name Stockfish 16"), None);
        assert_eq!(parse_engine_line("info depth 8 score cp 31"), None);
        assert_eq!(parse_engine_line(""), None);
    }

    #[test]
    fn parses_bestmove_lines() {
        assert_eq!(
            parse_engine_line("bestmove e2e4 ponder e7e5"),
            Some(EngineReply::BestMove(BestMovePayload::Move(CoordMove {
                from: Square::E2,
                to: Square::E4,
                promotion: None,
            })))
        );
        assert_eq!(
            parse_engine_line("bestmove a7a8q"),
            Some(EngineReply::BestMove(BestMovePayload::Move(CoordMove {
                from: Square::A7,
                to: Square::A8,
                promotion: Some(Piece::Queen),
            })))
        );
        assert_eq!(
            parse_engine_line("bestmove (none)"),
            Some(EngineReply::BestMove(BestMovePayload::NoMove))
        );
    }

    #[test]
    fn garbled_bestmove_is_flagged_not_dropped() {
        assert_eq!(
            parse_engine_line("bestmove xyzzy"),
            Some(EngineReply::BestMove(BestMovePayload::Malformed))
        );
        assert_eq!(
            parse_engine_line("bestmove"),
            Some(EngineReply::BestMove(BestMovePayload::Malformed))
        );
        assert_eq!(
            parse_engine_line("bestmove e2e9"),
            Some(EngineReply::BestMove(BestMovePayload::Malformed))
        );
        assert_eq!(
            parse_engine_line("bestmove e2e4k"),
            Some(EngineReply::BestMove(BestMovePayload::Malformed))
        );
    }

    #[test]
    fn gate_queues_until_the_handshake_and_keeps_order() {
        let mut gate = CommandGate::new();
        assert!(!gate.is_ready());

        assert_eq!(gate.submit(position_command("fen-a")), None);
        assert_eq!(gate.submit(go_command(8)), None);

        let flushed = gate.handshake_complete();
        assert_eq!(flushed, vec!["position fen fen-a", "go depth 8"]);
        assert!(gate.is_ready());

        // After the handshake commands pass straight through.
        assert_eq!(
            gate.submit(CMD_STOP.to_string()),
            Some(CMD_STOP.to_string())
        );
        assert!(gate.handshake_complete().is_empty());
    }
}
