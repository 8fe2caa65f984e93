/// Session configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the UCI engine binary, if one is configured.
    pub engine_path: Option<String>,
    /// MultiPV value sent to the engine; high by default so every root
    /// move gets analysis.
    pub multipv: u32,
    /// Whether info lines are included in the debug log (they are by far
    /// the noisiest output).
    pub log_info_lines: bool,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        AppConfig {
            engine_path: std::env::var("CHESSGLASS_ENGINE_PATH").ok(),
            multipv: std::env::var("CHESSGLASS_MULTIPV")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            log_info_lines: std::env::var("CHESSGLASS_LOG_INFO_LINES")
                .ok()
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            engine_path: None,
            multipv: 500,
            log_info_lines: false,
        }
    }
}
