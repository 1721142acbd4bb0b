use std::fmt;
use std::str::FromStr;

use chess::{Board, BoardStatus, ChessMove, Color, Game, MoveGen, Piece, Rank, Square};

use crate::game::notation;

/// An applied move together with the position it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    pub san: String,
    pub fen: String,
}

/// Why a move attempt was turned down. Never fatal; the position is
/// left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejected {
    GameOver,
    EmptySquare,
    WrongSide,
    Illegal,
}

impl fmt::Display for MoveRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MoveRejected::GameOver => "the game is over",
            MoveRejected::EmptySquare => "no piece on that square",
            MoveRejected::WrongSide => "not your piece",
            MoveRejected::Illegal => "illegal move",
        };
        f.write_str(text)
    }
}

/// Derived view of the current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStatus {
    pub turn: Color,
    pub is_check: bool,
    pub is_checkmate: bool,
    pub is_stalemate: bool,
    pub is_draw: bool,
}

impl GameStatus {
    pub fn is_over(&self) -> bool {
        self.is_checkmate || self.is_draw
    }

    /// Status vocabulary used on the wire.
    pub fn label(&self) -> &'static str {
        if self.is_checkmate {
            "checkmate"
        } else if self.is_stalemate {
            "stalemate"
        } else if self.is_draw {
            "draw"
        } else if self.is_check {
            "check"
        } else if self.turn == Color::White {
            "white_turn"
        } else {
            "black_turn"
        }
    }
}

/// The authoritative game state: one live position plus the move
/// history. Legality is delegated to the rules library; every mutation
/// goes through [`GameSession::apply`].
///
/// The `epoch` counter increases on every reset and never restarts, so
/// an engine reply tagged with an old epoch can always be told apart
/// from the current session.
pub struct GameSession {
    game: Game,
    history: Vec<MoveRecord>,
    epoch: u64,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            game: Game::new(),
            history: Vec::new(),
            epoch: 0,
        }
    }

    /// Start from an arbitrary trusted position, for analysis and tests.
    pub fn from_fen(fen: &str) -> Result<Self, chess::Error> {
        let board = Board::from_str(fen)?;
        Ok(Self {
            game: Game::new_with_board(board),
            history: Vec::new(),
            epoch: 0,
        })
    }

    pub fn fen(&self) -> String {
        self.game.current_position().to_string()
    }

    pub fn turn(&self) -> Color {
        self.game.side_to_move()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn last_move(&self) -> Option<&MoveRecord> {
        self.history.last()
    }

    pub fn movetext(&self) -> String {
        notation::movetext(&self.history)
    }

    pub fn piece_at(&self, square: Square) -> Option<(Color, Piece)> {
        let board = self.game.current_position();
        match (board.color_on(square), board.piece_on(square)) {
            (Some(color), Some(piece)) => Some((color, piece)),
            _ => None,
        }
    }

    /// Legal destination squares for the piece on `square`. Pure query.
    pub fn legal_destinations(&self, square: Square) -> Vec<Square> {
        let board = self.game.current_position();
        let mut targets = Vec::new();
        for mv in MoveGen::new_legal(&board) {
            if mv.get_source() == square && !targets.contains(&mv.get_dest()) {
                targets.push(mv.get_dest());
            }
        }
        targets
    }

    pub fn status(&self) -> GameStatus {
        let board = self.game.current_position();
        let turn = board.side_to_move();
        match board.status() {
            BoardStatus::Checkmate => GameStatus {
                turn,
                is_check: true,
                is_checkmate: true,
                is_stalemate: false,
                is_draw: false,
            },
            BoardStatus::Stalemate => GameStatus {
                turn,
                is_check: false,
                is_checkmate: false,
                is_stalemate: true,
                is_draw: true,
            },
            BoardStatus::Ongoing => GameStatus {
                turn,
                is_check: board.checkers().popcnt() > 0,
                is_checkmate: false,
                is_stalemate: false,
                is_draw: insufficient_material(&board),
            },
        }
    }

    pub fn is_over(&self) -> bool {
        self.status().is_over()
    }

    /// Validate and apply a move for the side to move. A pawn reaching
    /// the back rank with no explicit promotion choice promotes to a
    /// queen. On rejection the position is unchanged.
    pub fn apply(
        &mut self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Result<MoveRecord, MoveRejected> {
        if self.is_over() {
            return Err(MoveRejected::GameOver);
        }
        let board = self.game.current_position();
        let piece = board.piece_on(from).ok_or(MoveRejected::EmptySquare)?;
        if board.color_on(from) != Some(board.side_to_move()) {
            return Err(MoveRejected::WrongSide);
        }

        let promotion = match promotion {
            Some(kind) => Some(kind),
            None if piece == Piece::Pawn && to.get_rank() == promotion_rank(board.side_to_move()) => {
                Some(Piece::Queen)
            }
            None => None,
        };

        let mv = ChessMove::new(from, to, promotion);
        if !board.legal(mv) {
            return Err(MoveRejected::Illegal);
        }
        let san = notation::san(&board, mv);
        if !self.game.make_move(mv) {
            return Err(MoveRejected::Illegal);
        }

        let record = MoveRecord {
            from,
            to,
            promotion,
            san,
            fen: self.fen(),
        };
        self.history.push(record.clone());
        Ok(record)
    }

    /// Back to the standard start with an empty history. Bumps the
    /// epoch so replies to searches issued before the reset are
    /// recognizably stale.
    pub fn reset(&mut self) {
        self.game = Game::new();
        self.history.clear();
        self.epoch += 1;
    }
}

fn promotion_rank(side: Color) -> Rank {
    match side {
        Color::White => Rank::Eighth,
        Color::Black => Rank::First,
    }
}

/// Neither side can force mate: bare kings, a lone minor piece, or
/// same-colored bishops only.
fn insufficient_material(board: &Board) -> bool {
    let mut extras: Vec<(Color, Piece, bool)> = Vec::new();
    for square in chess::ALL_SQUARES {
        let piece = match board.piece_on(square) {
            None | Some(Piece::King) => continue,
            Some(piece @ (Piece::Bishop | Piece::Knight)) => piece,
            // Any pawn, rook or queen is mating material.
            Some(_) => return false,
        };
        if let Some(color) = board.color_on(square) {
            let light = (square.get_rank().to_index() + square.get_file().to_index()) % 2 == 1;
            extras.push((color, piece, light));
        }
    }
    match extras.as_slice() {
        [] => true,
        [_] => true,
        [(c1, Piece::Bishop, l1), (c2, Piece::Bishop, l2)] => c1 != c2 && l1 == l2,
        _ => false,
    }
}
