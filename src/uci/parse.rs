//! Tokenizing the engine's output lines.
//!
//! UCI info lines are key/value soup with no fixed order, so extraction is
//! by key lookup over whitespace-split tokens. Two info shapes matter here:
//! the standard `info depth ... pv ...` line, and the per-move statistics
//! line some engines emit as `info string <move> ... N: <visits> (P: <pct>)`.

/// The value token following `key`, if any. Keys and values are single
/// whitespace-separated tokens.
pub fn info_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let mut tokens = line.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok == key {
            return tokens.next();
        }
    }
    None
}

/// Every token after `pv`, which by convention sits at the end of the line.
pub fn info_pv(line: &str) -> Vec<String> {
    let mut tokens = line.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok == "pv" {
            return tokens.map(str::to_string).collect();
        }
    }
    Vec::new()
}

/// One line of engine output, classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UciLine {
    /// `info depth ...` analysis line, keyed by the first move of its pv.
    InfoDepth {
        mv: String,
        cp: Option<i32>,
        multipv: Option<u32>,
        pv: Vec<String>,
    },
    /// `info string <move> ... N: ... (P: ...)` per-move statistics.
    InfoString {
        mv: String,
        visits: Option<u64>,
        policy: Option<String>,
    },
    /// Some other `info` line we don't extract anything from.
    InfoOther,
    /// A line containing `readyok`.
    ReadyOk,
    /// `bestmove <move>`.
    BestMove(String),
    /// A line starting with `error`.
    Error(String),
    /// Anything else (`id`, `option`, `uciok`, chatter).
    Other,
}

/// Classify a line of engine output. Never fails; unrecognized lines come
/// back as [`UciLine::Other`].
pub fn parse_line(line: &str) -> UciLine {
    // readyok takes precedence: it is the fence marker and some engines
    // print it with decoration around it.
    if line.split_whitespace().any(|tok| tok == "readyok") {
        return UciLine::ReadyOk;
    }

    if line.starts_with("bestmove") {
        return match info_value(line, "bestmove") {
            Some(mv) => UciLine::BestMove(mv.to_string()),
            None => UciLine::Other,
        };
    }

    if line.starts_with("error") {
        return UciLine::Error(line.to_string());
    }

    if line.starts_with("info depth") {
        let pv = info_pv(line);
        let Some(mv) = pv.first().cloned() else {
            return UciLine::InfoOther;
        };
        return UciLine::InfoDepth {
            mv,
            cp: info_value(line, "cp").and_then(|v| v.parse().ok()),
            multipv: info_value(line, "multipv").and_then(|v| v.parse().ok()),
            pv,
        };
    }

    if line.starts_with("info string") {
        let Some(mv) = info_value(line, "string") else {
            return UciLine::InfoOther;
        };
        let policy = info_value(line, "(P:").map(|v| v.trim_end_matches(')').to_string());
        return UciLine::InfoString {
            mv: mv.to_string(),
            visits: info_value(line, "N:").and_then(|v| v.parse().ok()),
            policy,
        };
    }

    if line.starts_with("info") {
        return UciLine::InfoOther;
    }

    UciLine::Other
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DEPTH_LINE: &str = "info depth 8 seldepth 22 time 469 nodes 3918 \
        score cp 46 hashfull 13 nps 8353 tbhits 0 multipv 1 pv d2d4 g8f6";

    const STRING_LINE: &str = "info string d2d4  (293 ) N:   12845 (+121) \
        (P: 20.10%) (Q:  0.09001) (D:  0.000) (U: 0.02410) (V:  0.1006)";

    #[test]
    fn info_value_pulls_token_after_key() {
        assert_eq!(info_value(DEPTH_LINE, "nps"), Some("8353"));
        assert_eq!(info_value(DEPTH_LINE, "cp"), Some("46"));
        assert_eq!(info_value(DEPTH_LINE, "pv"), Some("d2d4"));
        assert_eq!(info_value(DEPTH_LINE, "missing"), None);
        assert_eq!(info_value("lonely", "lonely"), None);
    }

    #[test]
    fn info_pv_takes_line_tail() {
        assert_eq!(info_pv(DEPTH_LINE), vec!["d2d4", "g8f6"]);
        assert!(info_pv("info depth 1 nodes 5").is_empty());
    }

    #[test]
    fn depth_line_parses() {
        let parsed = parse_line(DEPTH_LINE);
        assert_eq!(
            parsed,
            UciLine::InfoDepth {
                mv: "d2d4".to_string(),
                cp: Some(46),
                multipv: Some(1),
                pv: vec!["d2d4".to_string(), "g8f6".to_string()],
            }
        );
    }

    #[test]
    fn depth_line_without_pv_is_unusable() {
        assert_eq!(parse_line("info depth 3 nodes 99"), UciLine::InfoOther);
    }

    #[test]
    fn string_line_parses_extra_stats() {
        let parsed = parse_line(STRING_LINE);
        assert_eq!(
            parsed,
            UciLine::InfoString {
                mv: "d2d4".to_string(),
                visits: Some(12845),
                policy: Some("20.10%".to_string()),
            }
        );
    }

    #[test]
    fn string_line_tolerates_missing_stats() {
        assert_eq!(
            parse_line("info string e2e4 no stats here"),
            UciLine::InfoString {
                mv: "e2e4".to_string(),
                visits: None,
                policy: None,
            }
        );
        assert_eq!(parse_line("info string"), UciLine::InfoOther);
    }

    #[test]
    fn control_lines() {
        assert_eq!(parse_line("readyok"), UciLine::ReadyOk);
        assert_eq!(parse_line("notreadyok"), UciLine::Other);
        assert_eq!(parse_line("prefix readyok"), UciLine::ReadyOk);
        assert_eq!(
            parse_line("bestmove e2e4 ponder e7e5"),
            UciLine::BestMove("e2e4".to_string())
        );
        assert_eq!(parse_line("bestmove"), UciLine::Other);
        assert_eq!(
            parse_line("error engine melted"),
            UciLine::Error("error engine melted".to_string())
        );
        assert_eq!(parse_line("uciok"), UciLine::Other);
        assert_eq!(parse_line("info nodes 12"), UciLine::InfoOther);
        assert_eq!(parse_line(""), UciLine::Other);
    }
}
