//! The engine session: command sending, the readyok fence, and the running
//! analysis table.
//!
//! The session itself is a synchronous state machine. Bytes move through the
//! channel pair built by [`super::io`]; the caller feeds each received line
//! to [`EngineSession::receive`] and reads commands out of the writer side.
//! Keeping I/O out of here makes the whole protocol testable with plain
//! function calls.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::rules::{Move, START_FEN};

use super::parse::{parse_line, UciLine};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The engine process is gone (its command channel is closed). Raised
    /// once per session; later send failures are absorbed silently.
    #[error("engine process fault: {0}")]
    ProcessFault(String),
}

// ---------------------------------------------------------------------------
// Fence
// ---------------------------------------------------------------------------

/// What to do with an incoming line, as judged by the fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admit {
    /// Not waiting on anything; process the line normally.
    Pass,
    /// This readyok was the last one outstanding; the fence is now down.
    Ack,
    /// Output from before the last sync; discard it.
    Stale,
}

/// The readyok fence. After sending a position we sync with `isready` and
/// discard everything until the matching `readyok` arrives, since output
/// before that point refers to the previous position. Multiple outstanding
/// syncs stack; only the final readyok drops the fence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FenceState {
    #[default]
    Accepting,
    AwaitingFence(u32),
}

impl FenceState {
    /// Record that an `isready` went out.
    pub fn arm(&mut self) {
        *self = match *self {
            FenceState::Accepting => FenceState::AwaitingFence(1),
            FenceState::AwaitingFence(n) => FenceState::AwaitingFence(n + 1),
        };
    }

    /// Judge one line of output, consuming a readyok if one is due.
    pub fn admit(&mut self, is_readyok: bool) -> Admit {
        match *self {
            FenceState::Accepting => Admit::Pass,
            FenceState::AwaitingFence(1) if is_readyok => {
                *self = FenceState::Accepting;
                Admit::Ack
            }
            FenceState::AwaitingFence(n) if is_readyok => {
                *self = FenceState::AwaitingFence(n - 1);
                Admit::Stale
            }
            FenceState::AwaitingFence(_) => Admit::Stale,
        }
    }

    /// Outstanding readyok count.
    pub fn pending(&self) -> u32 {
        match *self {
            FenceState::Accepting => 0,
            FenceState::AwaitingFence(n) => n,
        }
    }
}

// ---------------------------------------------------------------------------
// MoveInfo
// ---------------------------------------------------------------------------

/// Accumulated analysis for one candidate move. The two info-line shapes
/// each fill part of this in; the defaults sort unreported moves last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveInfo {
    pub mv: String,
    /// Score in centipawns.
    pub cp: i32,
    /// The engine's own ranking of the move, starting at 1.
    pub multipv: u32,
    /// Visit count from the per-move statistics line.
    pub visits: u64,
    pub pv: Vec<String>,
    /// Prior probability as reported, e.g. "20.10%".
    pub policy: Option<String>,
}

impl MoveInfo {
    fn new(mv: &str) -> Self {
        MoveInfo {
            mv: mv.to_string(),
            cp: -999_999,
            multipv: 999,
            visits: 1,
            pv: Vec::new(),
            policy: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Received
// ---------------------------------------------------------------------------

/// What a line of engine output amounted to, so the caller knows whether a
/// redraw is worthwhile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Received {
    /// Discarded by the fence.
    Stale,
    /// The fence just dropped; fresh output follows.
    FenceAck,
    /// The analysis entry for this move gained score/pv data.
    PvUpdate(String),
    /// The analysis entry for this move gained visit/policy statistics.
    MoveStats(String),
    /// The engine concluded its search.
    BestMove(String),
    /// An engine-reported error line.
    EngineError(String),
    /// Nothing of interest.
    Ignored,
}

// ---------------------------------------------------------------------------
// EngineSession
// ---------------------------------------------------------------------------

pub struct EngineSession {
    writer: Option<UnboundedSender<String>>,
    fence: FenceState,
    warned: bool,
    running: bool,
    ever_received_info: bool,
    log_info_lines: bool,
    multipv: u32,
    info: HashMap<String, MoveInfo>,
}

impl EngineSession {
    pub fn new(config: &AppConfig) -> Self {
        EngineSession {
            writer: None,
            fence: FenceState::default(),
            warned: false,
            running: false,
            ever_received_info: false,
            log_info_lines: config.log_info_lines,
            multipv: config.multipv,
            info: HashMap::new(),
        }
    }

    /// Attach the command channel (from [`super::io::command_writer`]) and
    /// run the UCI handshake options. A fresh attach re-arms the one-time
    /// process-fault report.
    pub fn attach(&mut self, writer: UnboundedSender<String>) -> Result<(), SessionError> {
        self.writer = Some(writer);
        self.warned = false;
        self.send("uci")?;
        self.setoption("MultiPV", &self.multipv.to_string())?;
        // Lc0 only emits the per-move statistics lines when asked.
        self.setoption("VerboseMoveStats", "true")?;
        self.setoption("LogLiveStats", "true")?;
        Ok(())
    }

    /// Drop the command channel; the session goes idle.
    pub fn detach(&mut self) {
        self.writer = None;
        self.running = false;
    }

    // -- sending ------------------------------------------------------------

    /// Send one command line. With no writer attached this is a quiet
    /// no-op. A closed channel means the engine process died: the first
    /// such failure is reported as a [`SessionError::ProcessFault`], every
    /// later one is swallowed so callers aren't nagged per keystroke.
    pub fn send(&mut self, msg: &str) -> Result<(), SessionError> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let msg = msg.trim().to_string();
        match writer.send(msg.clone()) {
            Ok(()) => {
                debug!("--> {msg}");
                Ok(())
            }
            Err(_) => {
                debug!("(failed) --> {msg}");
                if !self.warned {
                    self.warned = true;
                    error!("engine command channel closed");
                    Err(SessionError::ProcessFault(
                        "the engine appears to have crashed".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn setoption(&mut self, name: &str, value: &str) -> Result<(), SessionError> {
        self.send(&format!("setoption name {name} value {value}"))
    }

    pub fn new_game(&mut self) -> Result<(), SessionError> {
        self.send("ucinewgame")
    }

    /// Start searching. A `go` while a search is already running is a
    /// protocol anomaly worth a warning, but the command is sent anyway.
    pub fn go(&mut self) -> Result<(), SessionError> {
        if self.running {
            warn!("protocol anomaly: go while already searching");
        }
        let result = self.send("go");
        self.running = true;
        result
    }

    /// Send `isready` and raise the fence by one. The fence goes up even if
    /// the send failed, so a dead engine can never let stale output through.
    pub fn sync(&mut self) -> Result<(), SessionError> {
        let result = self.send("isready");
        self.fence.arm();
        result
    }

    /// Point the engine at a position and start searching. The analysis
    /// table is cleared up front: everything currently known refers to the
    /// old position. `initial_fen` is the root position of the game;
    /// `history` the moves from there to the position to search.
    pub fn analyze(
        &mut self,
        initial_fen: &str,
        history: &[Move],
        new_game: bool,
    ) -> Result<(), SessionError> {
        self.info.clear();

        self.halt()?;
        if new_game {
            self.new_game()?;
        }

        let setup = if initial_fen == START_FEN {
            "startpos".to_string()
        } else {
            format!("fen {initial_fen}")
        };
        let moves: Vec<String> = history.iter().map(|m| m.to_string()).collect();
        self.send(&format!("position {setup} moves {}", moves.join(" ")))?;
        self.sync()?;
        self.go()
    }

    /// Stop the current search.
    pub fn halt(&mut self) -> Result<(), SessionError> {
        let result = self.send("stop");
        self.running = false;
        result
    }

    // -- receiving ----------------------------------------------------------

    /// Process one line of engine output.
    pub fn receive(&mut self, line: &str) -> Received {
        let parsed = parse_line(line);

        match self.fence.admit(parsed == UciLine::ReadyOk) {
            Admit::Stale => {
                if self.log_info_lines || !line.contains("info") {
                    debug!("(ignored) < {line}");
                }
                return Received::Stale;
            }
            Admit::Ack => {
                debug!("< {line}");
                return Received::FenceAck;
            }
            Admit::Pass => {}
        }

        if self.log_info_lines || !line.contains("info") {
            debug!("< {line}");
        }
        if line.starts_with("info") {
            self.ever_received_info = true;
        }

        match parsed {
            UciLine::InfoDepth {
                mv,
                cp,
                multipv,
                pv,
            } => {
                let entry = self
                    .info
                    .entry(mv.clone())
                    .or_insert_with(|| MoveInfo::new(&mv));
                if let Some(cp) = cp {
                    entry.cp = cp;
                } else {
                    warn!("protocol anomaly: info depth line without cp score: {line}");
                }
                if let Some(multipv) = multipv {
                    entry.multipv = multipv;
                }
                entry.pv = pv;
                Received::PvUpdate(mv)
            }
            UciLine::InfoString {
                mv,
                visits,
                policy,
            } => {
                let entry = self
                    .info
                    .entry(mv.clone())
                    .or_insert_with(|| MoveInfo::new(&mv));
                match visits {
                    Some(n) => entry.visits = n,
                    None => {
                        warn!("protocol anomaly: stats line without visit count: {line}")
                    }
                }
                if policy.is_some() {
                    entry.policy = policy;
                }
                Received::MoveStats(mv)
            }
            UciLine::BestMove(mv) => {
                if !self.running {
                    warn!("protocol anomaly: bestmove while not searching: {line}");
                }
                self.running = false;
                Received::BestMove(mv)
            }
            UciLine::Error(text) => {
                warn!("engine error line: {text}");
                Received::EngineError(text)
            }
            UciLine::ReadyOk => Received::Ignored,
            UciLine::InfoOther | UciLine::Other => Received::Ignored,
        }
    }

    // -- queries ------------------------------------------------------------

    /// The analysis entries sorted best-first: visit count descending, then
    /// centipawn score descending.
    pub fn ranked_moves(&self) -> Vec<&MoveInfo> {
        let mut list: Vec<&MoveInfo> = self.info.values().collect();
        list.sort_by(|a, b| b.visits.cmp(&a.visits).then(b.cp.cmp(&a.cp)));
        list
    }

    pub fn move_info(&self, mv: &str) -> Option<&MoveInfo> {
        self.info.get(mv)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether any analysis has ever arrived; until then a front end would
    /// rather show the engine's stderr.
    pub fn ever_received_info(&self) -> bool {
        self.ever_received_info
    }

    pub fn pending_syncs(&self) -> u32 {
        self.fence.pending()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
