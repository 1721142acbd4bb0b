//! Drives the engine side of the game. After every human move the
//! scheduler decides whether a search is due, hands out a tagged
//! request, and later validates the reply against the position it was
//! computed for before letting it touch the session.

use chess::Color;
use log::{debug, warn};

use crate::engine::protocol::CoordMove;
use crate::game::session::{GameSession, MoveRecord};

/// The human always plays the side that moves first from the standard
/// start.
pub const HUMAN_SIDE: Color = Color::White;

/// Opponent strength, as a fixed search depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Grandmaster,
}

impl Difficulty {
    pub fn depth(self) -> u8 {
        match self {
            Difficulty::Easy => 2,
            Difficulty::Medium => 8,
            Difficulty::Hard => 15,
            Difficulty::Grandmaster => 20,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Grandmaster => "grandmaster",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "grandmaster" => Some(Difficulty::Grandmaster),
            _ => None,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Easy
    }
}

/// Identifies one outstanding search: the session epoch and position
/// it was issued against, and the depth to search to. A reply is only
/// applied while both epoch and position are still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub epoch: u64,
    pub fen: String,
    pub depth: u8,
}

impl SearchTicket {
    pub fn matches(&self, session: &GameSession) -> bool {
        self.epoch == session.epoch() && self.fen == session.fen()
    }
}

/// What became of an engine reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Computed for a position that is no longer current; discarded.
    Stale,
    /// The engine had no legal move; the status already reflects the
    /// finished game.
    NoMove,
    Applied(MoveRecord),
    /// Decode or apply failure: engine and rules library disagree.
    /// Logged and dropped, the opponent passes this cycle.
    Dropped,
}

/// Single-slot scheduler for the opponent's turn. At most one ticket
/// is pending; a new one is only handed out after the previous reply
/// was consumed or invalidated, which makes overlapping requests
/// structurally impossible.
#[derive(Debug, Default)]
pub struct OpponentMoveScheduler {
    difficulty: Difficulty,
    pending: Option<SearchTicket>,
}

impl OpponentMoveScheduler {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            pending: None,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Difficulty change starts a fresh session: standard start, empty
    /// history, new epoch. Any outstanding search is invalidated.
    pub fn set_difficulty(&mut self, difficulty: Difficulty, session: &mut GameSession) {
        self.difficulty = difficulty;
        self.pending = None;
        session.reset();
    }

    /// The session was reset; the pending slot no longer applies.
    pub fn on_reset(&mut self) {
        self.pending = None;
    }

    /// Hand out a search request if the engine is due to move: game
    /// still live, engine side to move, nothing already pending.
    pub fn next_request(&mut self, session: &GameSession) -> Option<SearchTicket> {
        if self.pending.is_some() {
            return None;
        }
        let status = session.status();
        if status.is_over() || status.turn == HUMAN_SIDE {
            return None;
        }
        let ticket = SearchTicket {
            epoch: session.epoch(),
            fen: session.fen(),
            depth: self.difficulty.depth(),
        };
        self.pending = Some(ticket.clone());
        Some(ticket)
    }

    /// Apply an engine reply, guarding against staleness first.
    pub fn handle_reply(
        &mut self,
        session: &mut GameSession,
        ticket: &SearchTicket,
        best: Option<CoordMove>,
    ) -> ReplyOutcome {
        match &self.pending {
            Some(pending) if pending == ticket => {}
            _ => {
                debug!("ignoring reply for a search that is no longer pending");
                return ReplyOutcome::Stale;
            }
        }
        self.pending = None;

        if !ticket.matches(session) {
            debug!(
                "discarding reply computed for epoch {} against epoch {}",
                ticket.epoch,
                session.epoch()
            );
            return ReplyOutcome::Stale;
        }

        let mv = match best {
            Some(mv) => mv,
            None => return ReplyOutcome::NoMove,
        };
        match session.apply(mv.from, mv.to, mv.promotion) {
            Ok(record) => ReplyOutcome::Applied(record),
            Err(rejected) => {
                warn!(
                    "engine move {}{} rejected by the rules library: {}",
                    mv.from, mv.to, rejected
                );
                ReplyOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::Square;

    const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn engine_move(from: Square, to: Square) -> Option<CoordMove> {
        Some(CoordMove {
            from,
            to,
            promotion: None,
        })
    }

    #[test]
    fn difficulty_depth_table() {
        assert_eq!(Difficulty::Easy.depth(), 2);
        assert_eq!(Difficulty::Medium.depth(), 8);
        assert_eq!(Difficulty::Hard.depth(), 15);
        assert_eq!(Difficulty::Grandmaster.depth(), 20);
        assert_eq!(Difficulty::parse("Grandmaster"), Some(Difficulty::Grandmaster));
        assert_eq!(Difficulty::parse("impossible"), None);
    }

    #[test]
    fn no_request_on_the_human_turn() {
        let session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        assert_eq!(scheduler.next_request(&session), None);
    }

    #[test]
    fn one_request_per_engine_turn() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Medium);
        session.apply(Square::E2, Square::E4, None).expect("legal");

        let ticket = scheduler.next_request(&session).expect("engine to move");
        assert_eq!(ticket.fen, session.fen());
        assert_eq!(ticket.depth, 8);

        // The slot is taken until the reply is consumed.
        assert_eq!(scheduler.next_request(&session), None);

        let outcome = scheduler.handle_reply(&mut session, &ticket, engine_move(Square::E7, Square::E5));
        match outcome {
            ReplyOutcome::Applied(record) => assert_eq!(record.san, "e5"),
            other => panic!("expected the move to apply, got {:?}", other),
        }
        assert!(!scheduler.has_pending());

        // Back to the human; nothing further is requested.
        assert_eq!(scheduler.next_request(&session), None);
    }

    #[test]
    fn reply_after_reset_is_discarded() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        session.apply(Square::E2, Square::E4, None).expect("legal");
        let ticket = scheduler.next_request(&session).expect("engine to move");

        session.reset();
        scheduler.on_reset();

        let outcome = scheduler.handle_reply(&mut session, &ticket, engine_move(Square::E7, Square::E5));
        assert_eq!(outcome, ReplyOutcome::Stale);
        assert_eq!(session.fen(), START_FEN);
        assert!(session.history().is_empty());
    }

    #[test]
    fn reply_for_an_outdated_position_is_discarded() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        session.apply(Square::E2, Square::E4, None).expect("legal");
        let ticket = scheduler.next_request(&session).expect("engine to move");

        // The position moves on underneath the outstanding search.
        session.apply(Square::E7, Square::E5, None).expect("legal");
        let fen_before = session.fen();

        let outcome = scheduler.handle_reply(&mut session, &ticket, engine_move(Square::B8, Square::C6));
        assert_eq!(outcome, ReplyOutcome::Stale);
        assert_eq!(session.fen(), fen_before);
    }

    #[test]
    fn difficulty_change_starts_a_fresh_session() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        session.apply(Square::E2, Square::E4, None).expect("legal");
        let ticket = scheduler.next_request(&session).expect("engine to move");
        let epoch_before = session.epoch();

        scheduler.set_difficulty(Difficulty::Hard, &mut session);
        assert_eq!(scheduler.difficulty(), Difficulty::Hard);
        assert_eq!(session.fen(), START_FEN);
        assert!(session.history().is_empty());
        assert_eq!(session.epoch(), epoch_before + 1);

        // The pre-switch reply must not land in the new session.
        let outcome = scheduler.handle_reply(&mut session, &ticket, engine_move(Square::E7, Square::E5));
        assert_eq!(outcome, ReplyOutcome::Stale);
        assert_eq!(session.fen(), START_FEN);
    }

    #[test]
    fn unknown_reply_is_ignored() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        let stray = SearchTicket {
            epoch: 0,
            fen: session.fen(),
            depth: 2,
        };
        let outcome = scheduler.handle_reply(&mut session, &stray, engine_move(Square::E2, Square::E4));
        assert_eq!(outcome, ReplyOutcome::Stale);
        assert_eq!(session.fen(), START_FEN);
    }

    #[test]
    fn inconsistent_engine_move_is_dropped() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        session.apply(Square::E2, Square::E4, None).expect("legal");
        let ticket = scheduler.next_request(&session).expect("engine to move");
        let fen_before = session.fen();

        // A square with no black piece on it.
        let outcome = scheduler.handle_reply(&mut session, &ticket, engine_move(Square::A4, Square::A5));
        assert_eq!(outcome, ReplyOutcome::Dropped);
        assert_eq!(session.fen(), fen_before);
    }

    #[test]
    fn no_move_reply_leaves_the_session_alone() {
        let mut session = GameSession::new();
        let mut scheduler = OpponentMoveScheduler::new(Difficulty::Easy);
        session.apply(Square::E2, Square::E4, None).expect("legal");
        let ticket = scheduler.next_request(&session).expect("engine to move");
        let fen_before = session.fen();

        assert_eq!(
            scheduler.handle_reply(&mut session, &ticket, None),
            ReplyOutcome::NoMove
        );
        assert_eq!(session.fen(), fen_before);
        assert!(!scheduler.has_pending());
    }
}
