//! A small PGN importer: tag-pair-skipping, move-text-only games.
//!
//! This handles the common case of a pasted game: tag lines are ignored,
//! move numbers and the result token are skipped, and each remaining token
//! is resolved against the running position. Comments and recursive
//! variations are out of scope.

use tracing::debug;

use super::position::Position;
use super::san::parse_algebraic;
use super::types::{Move, RulesError};

/// A game imported from PGN text: the moves from the standard starting
/// position, in order.
#[derive(Clone, Debug, Default)]
pub struct ImportedGame {
    pub moves: Vec<Move>,
}

/// Parse PGN move text into a move list, starting from the standard
/// position. Tag-pair lines (`[Event "..."]` etc.) are skipped, as are
/// move-number tokens and the game result. The first token that cannot be
/// resolved aborts the import.
pub fn import(text: &str) -> Result<ImportedGame, RulesError> {
    let mut pos = Position::starting();
    let mut moves = Vec::new();

    let tokens = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('['))
        .flat_map(str::split_whitespace);

    for token in tokens {
        if matches!(token, "1/2-1/2" | "1-0" | "0-1" | "*") {
            break;
        }
        if token.ends_with('.') {
            continue;
        }

        let mv = parse_algebraic(&pos, token).map_err(|e| RulesError::BadPgnToken {
            token: token.to_string(),
            reason: e.to_string(),
        })?;
        pos = pos.apply(mv);
        moves.push(mv);
    }

    debug!(count = moves.len(), "imported pgn move list");
    Ok(ImportedGame { moves })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
