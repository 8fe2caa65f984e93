//! chessglass: the analysis core of a UCI chess viewer.
//!
//! Three parts, each usable on its own:
//!
//! - [`rules`]: board state, move legality with human-readable refusal
//!   reasons, algebraic notation and a small PGN importer.
//! - [`tree`]: the variation tree the viewer navigates, with a current-node
//!   pointer and a version counter for cheap redraw decisions.
//! - [`uci`]: a client-side engine session with a readyok fence that
//!   discards output for positions no longer on the board.

pub mod config;
pub mod rules;
pub mod tree;
pub mod uci;

pub use config::AppConfig;
pub use rules::{Move, Position, RulesError, START_FEN};
pub use tree::{NodeId, Tree};
pub use uci::{EngineSession, Received, SessionError};
