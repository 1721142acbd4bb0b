//! Human input against the live position. A move is either two clicks
//! (select a piece, then pick a destination) or one drag; both funnel
//! through the same validation, and the selection is always cleared
//! when an attempt completes or aborts.

use chess::Square;

use crate::game::session::{GameSession, MoveRecord, MoveRejected};

/// What an input event amounted to. The caller turns this into UI
/// updates; `Moved` additionally means the opponent may be due a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Not actionable: empty square, opponent's piece, or game over.
    Ignored,
    Selected {
        origin: Square,
        targets: Vec<Square>,
    },
    Deselected,
    Moved(MoveRecord),
    Rejected(MoveRejected),
}

/// Two-state machine: idle, or holding an origin square and awaiting a
/// destination.
#[derive(Debug, Default)]
pub struct MoveController {
    origin: Option<Square>,
}

impl MoveController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> Option<Square> {
        self.origin
    }

    pub fn clear(&mut self) {
        self.origin = None;
    }

    /// A square was clicked or tapped.
    pub fn square_activated(
        &mut self,
        session: &mut GameSession,
        square: Square,
    ) -> InputOutcome {
        match self.origin {
            None => self.try_select(session, square),
            Some(origin) if origin == square => {
                self.origin = None;
                InputOutcome::Deselected
            }
            Some(origin) => self.try_move(session, origin, square),
        }
    }

    /// A piece was dragged from `from` and dropped on `to`: a select
    /// immediately followed by a destination, with no intermediate
    /// highlight state. Dropping back on the origin square is a
    /// deselect, same as clicking it twice.
    pub fn drag_dropped(
        &mut self,
        session: &mut GameSession,
        from: Square,
        to: Square,
    ) -> InputOutcome {
        self.origin = None;
        if from == to {
            return InputOutcome::Deselected;
        }
        match self.try_select(session, from) {
            InputOutcome::Selected { .. } => self.try_move(session, from, to),
            other => {
                self.origin = None;
                other
            }
        }
    }

    fn try_select(&mut self, session: &GameSession, square: Square) -> InputOutcome {
        let status = session.status();
        if status.is_over() {
            return InputOutcome::Ignored;
        }
        match session.piece_at(square) {
            Some((color, _)) if color == status.turn => {
                self.origin = Some(square);
                InputOutcome::Selected {
                    origin: square,
                    targets: session.legal_destinations(square),
                }
            }
            _ => InputOutcome::Ignored,
        }
    }

    fn try_move(
        &mut self,
        session: &mut GameSession,
        origin: Square,
        destination: Square,
    ) -> InputOutcome {
        self.origin = None;
        match session.apply(origin, destination, None) {
            Ok(record) => InputOutcome::Moved(record),
            Err(rejected) => {
                // Clicking another of your own pieces switches the
                // selection instead of surfacing an error.
                let own_piece = session
                    .piece_at(destination)
                    .map(|(color, _)| color == session.turn())
                    .unwrap_or(false);
                if own_piece {
                    self.try_select(session, destination)
                } else {
                    InputOutcome::Rejected(rejected)
                }
            }
        }
    }
}
