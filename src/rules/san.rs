//! Algebraic notation: reading user/PGN tokens and pretty-printing moves.

use super::position::Position;
use super::types::{Color, Move, Piece, PieceType, RulesError, Square};

/// Find every square holding the given piece, optionally constrained to a
/// single file and/or rank.
fn find_pieces(
    pos: &Position,
    piece: Piece,
    file: Option<u8>,
    rank: Option<u8>,
) -> Vec<Square> {
    pos.pieces()
        .filter(|(sq, p)| {
            *p == piece
                && file.map_or(true, |f| sq.file == f)
                && rank.map_or(true, |r| sq.rank == r)
        })
        .map(|(sq, _)| sq)
        .collect()
}

/// Parse a single move token in standard algebraic notation against the
/// given position, returning the concrete move it denotes.
///
/// Accepts the usual decorations: capture marks, check and mate suffixes,
/// `0-0` spellings of castling, `=Q` promotions. Castling tokens resolve
/// directly to the king's two-file move for the side to move. A token whose
/// piece cannot be found, whose move is illegal, or which matches more than
/// one legal move is an error.
pub fn parse_algebraic(pos: &Position, token: &str) -> Result<Move, RulesError> {
    if !token.is_ascii() {
        return Err(RulesError::MalformedMove(token.to_string()));
    }
    let mut s: String = token
        .chars()
        .filter(|c| !matches!(c, 'x' | '+' | '#' | '!' | '?'))
        .collect();

    // Zeroes are a common castling spelling.
    s = s.replace("0-0-0", "O-O-O").replace("0-0", "O-O");

    match s.to_ascii_uppercase().as_str() {
        "O-O" => {
            return Ok(match pos.side_to_move {
                Color::White => Move::new(Square::new(4, 7), Square::new(6, 7)),
                Color::Black => Move::new(Square::new(4, 0), Square::new(6, 0)),
            });
        }
        "O-O-O" => {
            return Ok(match pos.side_to_move {
                Color::White => Move::new(Square::new(4, 7), Square::new(2, 7)),
                Color::Black => Move::new(Square::new(4, 0), Square::new(2, 0)),
            });
        }
        _ => {}
    }
    s = s.replace('-', "");

    // Promotion suffix.
    let mut promotion = None;
    if s.len() >= 2 && s.as_bytes()[s.len() - 2] == b'=' {
        let c = s.as_bytes()[s.len() - 1] as char;
        promotion = Some(PieceType::from_promotion_char(c).ok_or_else(|| {
            RulesError::BadPgnToken {
                token: token.to_string(),
                reason: format!("'{c}' is not a promotion piece"),
            }
        })?);
        s.truncate(s.len() - 2);
    }

    // An uppercase leading letter names the piece; otherwise it's a pawn.
    let mut rest = s.as_str();
    let kind = match rest.chars().next() {
        Some('K') => PieceType::King,
        Some('Q') => PieceType::Queen,
        Some('R') => PieceType::Rook,
        Some('B') => PieceType::Bishop,
        Some('N') => PieceType::Knight,
        _ => PieceType::Pawn,
    };
    if kind != PieceType::Pawn {
        rest = &rest[1..];
    }

    if rest.len() < 2 {
        return Err(RulesError::MalformedMove(token.to_string()));
    }
    let dest = Square::from_algebraic(&rest[rest.len() - 2..])
        .ok_or_else(|| RulesError::MalformedMove(token.to_string()))?;

    // Anything between the piece letter and the destination disambiguates.
    let mut src_file = None;
    let mut src_rank = None;
    for c in rest[..rest.len() - 2].chars() {
        match c {
            'a'..='h' => src_file = Some(c as u8 - b'a'),
            '1'..='8' => src_rank = Some(7 - (c as u8 - b'1')),
            _ => {
                return Err(RulesError::BadPgnToken {
                    token: token.to_string(),
                    reason: format!("unexpected character '{c}'"),
                });
            }
        }
    }

    // An undisambiguated pawn token is a straight push, so its source file
    // is the destination file.
    if kind == PieceType::Pawn && src_file.is_none() && src_rank.is_none() {
        src_file = Some(dest.file);
    }

    let piece = Piece::new(pos.side_to_move, kind);
    let sources = find_pieces(pos, piece, src_file, src_rank);
    if sources.is_empty() {
        return Err(RulesError::PieceNotFound(token.to_string()));
    }

    let valid: Vec<Square> = sources
        .into_iter()
        .filter(|&from| pos.illegal_reason(Move::new(from, dest)).is_none())
        .collect();

    match valid.len() {
        1 => {
            let mut mv = Move::new(valid[0], dest);
            mv.promotion = promotion;
            Ok(mv)
        }
        0 => Err(RulesError::IllegalToken {
            token: token.to_string(),
            reason: "piece found but the move is illegal".to_string(),
        }),
        n => Err(RulesError::AmbiguousToken {
            token: token.to_string(),
            candidates: n,
        }),
    }
}

/// Render a move as standard algebraic notation against the position it is
/// played from, with minimal disambiguation. Checks and mates are not
/// marked. An empty source square yields `"??"` rather than an error since
/// this feeds display code that must always produce something.
pub fn nice_string(pos: &Position, mv: Move) -> String {
    let Some(piece) = pos.piece_at(mv.from) else {
        return "??".to_string();
    };

    let dest = mv.to.to_algebraic();
    let capture = pos.piece_at(mv.to).is_some();

    if piece.kind != PieceType::Pawn {
        if piece.kind == PieceType::King && mv.from.file.abs_diff(mv.to.file) == 2 {
            return if mv.to.file > mv.from.file {
                "O-O".to_string()
            } else {
                "O-O-O".to_string()
            };
        }

        // How many pieces of this kind could legally reach the destination?
        // The answer decides how much of the source square to spell out.
        let valid: Vec<Square> = find_pieces(pos, piece, None, None)
            .into_iter()
            .filter(|&from| pos.illegal_reason(Move::new(from, mv.to)).is_none())
            .collect();

        let letter = piece.kind.letter();
        let x = if capture { "x" } else { "" };
        let from = mv.from.to_algebraic();

        return match valid.len() {
            n if n > 2 => format!("{letter}{from}{x}{dest}"),
            2 => {
                // With exactly two candidates a single character settles it:
                // the rank when they share a file, the file otherwise.
                let disambig = if valid[0].file == valid[1].file {
                    &from[1..2]
                } else {
                    &from[0..1]
                };
                format!("{letter}{disambig}{x}{dest}")
            }
            _ => format!("{letter}{x}{dest}"),
        };
    }

    // Pawn moves are never ambiguous. A file change is a capture even when
    // the destination is empty (en passant).
    let mut out = if mv.from.file == mv.to.file {
        dest
    } else {
        let file = (b'a' + mv.from.file) as char;
        format!("{file}x{dest}")
    };
    if let Some(promo) = mv.promotion {
        out.push('=');
        out.push(promo.letter());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
