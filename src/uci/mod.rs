//! UCI engine client: line parsing, the session state machine, and the
//! async plumbing that connects a session to a real engine's streams.

pub mod io;
pub mod parse;
pub mod session;

pub use session::{Admit, EngineSession, FenceState, MoveInfo, Received, SessionError};
