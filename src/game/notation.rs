//! Standard algebraic notation over the rules library's queries. The
//! rules crate speaks coordinate moves only, so the SAN rendering and
//! the movetext transcript live here.

use chess::{Board, BoardStatus, ChessMove, File, MoveGen, Piece, Rank, Square};

use crate::game::session::MoveRecord;

/// Render `mv` in standard algebraic notation for the position in
/// which it is about to be played. `mv` must be legal in `board`.
pub fn san(board: &Board, mv: ChessMove) -> String {
    let from = mv.get_source();
    let to = mv.get_dest();
    let piece = match board.piece_on(from) {
        Some(piece) => piece,
        None => return format!("{}{}", from, to),
    };

    let mut out = String::new();
    let file_delta = from.get_file().to_index() as i32 - to.get_file().to_index() as i32;
    if piece == Piece::King && file_delta.abs() == 2 {
        out.push_str(if file_delta < 0 { "O-O" } else { "O-O-O" });
    } else {
        // A pawn leaving its file always captures (including en passant
        // onto an empty square).
        let capture =
            board.piece_on(to).is_some() || (piece == Piece::Pawn && file_delta != 0);
        if piece == Piece::Pawn {
            if capture {
                out.push(file_char(from.get_file()));
            }
        } else {
            out.push(piece_letter(piece));
            out.push_str(&disambiguation(board, mv, piece));
        }
        if capture {
            out.push('x');
        }
        out.push_str(&to.to_string());
        if let Some(promotion) = mv.get_promotion() {
            out.push('=');
            out.push(piece_letter(promotion));
        }
    }

    let after = board.make_move_new(mv);
    if after.status() == BoardStatus::Checkmate {
        out.push('#');
    } else if after.checkers().popcnt() > 0 {
        out.push('+');
    }
    out
}

/// Movetext transcript of a game, "1. e4 e5 2. Nf3 ...".
pub fn movetext(history: &[MoveRecord]) -> String {
    let mut out = String::new();
    for (i, record) in history.iter().enumerate() {
        if i % 2 == 0 {
            out.push_str(&format!("{}. ", i / 2 + 1));
        }
        out.push_str(&record.san);
        out.push(' ');
    }
    out.trim_end().to_string()
}

/// Minimal disambiguation when another piece of the same kind can also
/// reach the destination: file if unique, else rank, else both.
fn disambiguation(board: &Board, mv: ChessMove, piece: Piece) -> String {
    let from = mv.get_source();
    let to = mv.get_dest();
    let rivals: Vec<Square> = MoveGen::new_legal(board)
        .filter(|other| {
            other.get_dest() == to
                && other.get_source() != from
                && board.piece_on(other.get_source()) == Some(piece)
        })
        .map(|other| other.get_source())
        .collect();
    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|sq| sq.get_file() != from.get_file()) {
        file_char(from.get_file()).to_string()
    } else if rivals.iter().all(|sq| sq.get_rank() != from.get_rank()) {
        rank_char(from.get_rank()).to_string()
    } else {
        from.to_string()
    }
}

fn piece_letter(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'P',
        Piece::Knight => 'N',
        Piece::Bishop => 'B',
        Piece::Rook => 'R',
        Piece::Queen => 'Q',
        Piece::King => 'K',
    }
}

fn file_char(file: File) -> char {
    (b'a' + file.to_index() as u8) as char
}

fn rank_char(rank: Rank) -> char {
    (b'1' + rank.to_index() as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).expect("valid fen")
    }

    #[test]
    fn quiet_pawn_and_piece_moves() {
        let start = Board::default();
        assert_eq!(san(&start, ChessMove::new(Square::E2, Square::E4, None)), "e4");
        assert_eq!(san(&start, ChessMove::new(Square::G1, Square::F3, None)), "Nf3");
    }

    #[test]
    fn pawn_capture_names_the_source_file() {
        let b = board("rnbqkbnr/pppp1ppp/8/4p3/3P4/8/PPP1PPPP/RNBQKBNR w KQkq - 0 2");
        assert_eq!(san(&b, ChessMove::new(Square::D4, Square::E5, None)), "dxe5");
    }

    #[test]
    fn mating_queen_capture() {
        let b = board("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        assert_eq!(san(&b, ChessMove::new(Square::H5, Square::F7, None)), "Qxf7#");
    }

    #[test]
    fn castling_both_ways() {
        let b = board("r3k2r/pppq1ppp/2npbn2/2b1p3/2B1P3/2NPBN2/PPPQ1PPP/R3K2R w KQkq - 0 8");
        assert_eq!(san(&b, ChessMove::new(Square::E1, Square::G1, None)), "O-O");
        assert_eq!(san(&b, ChessMove::new(Square::E1, Square::C1, None)), "O-O-O");
    }

    #[test]
    fn rook_moves_disambiguate_by_file() {
        let b = board("1k6/8/8/8/8/8/4K3/R6R w - - 0 1");
        assert_eq!(san(&b, ChessMove::new(Square::A1, Square::D1, None)), "Rad1");
    }

    #[test]
    fn promotion_with_check_suffix() {
        let b = board("8/P6k/8/8/8/8/8/K7 w - - 0 1");
        assert_eq!(
            san(&b, ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen))),
            "a8=Q"
        );
        let b = board("7k/P7/8/8/8/8/8/K7 w - - 0 1");
        assert_eq!(
            san(&b, ChessMove::new(Square::A7, Square::A8, Some(Piece::Queen))),
            "a8=Q+"
        );
    }

    #[test]
    fn movetext_numbers_white_moves() {
        let records: Vec<MoveRecord> = [
            (Square::E2, Square::E4, "e4"),
            (Square::E7, Square::E5, "e5"),
            (Square::G1, Square::F3, "Nf3"),
        ]
        .iter()
        .map(|(from, to, san)| MoveRecord {
            from: *from,
            to: *to,
            promotion: None,
            san: san.to_string(),
            fen: String::new(),
        })
        .collect();
        assert_eq!(movetext(&records), "1. e4 e5 2. Nf3");
        assert_eq!(movetext(&[]), "");
    }
}
