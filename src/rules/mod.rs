//! Chess rules: board state, move legality, notation and PGN import.

pub mod pgn;
pub mod position;
pub mod san;
pub mod types;

pub use position::{Position, START_FEN};
pub use san::{nice_string, parse_algebraic};
pub use types::{CastlingRights, Color, Move, Piece, PieceType, RulesError, Square};
