use std::path::PathBuf;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

pub const WORKSPACE_ENV: &str = "RESULTSD_WORKSPACE";
pub const LOG_ENV: &str = "RESULTSD_LOG";

/// Startup settings sourced from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(WORKSPACE_ENV).ok(),
            std::env::var(LOG_ENV).ok(),
        )
    }

    fn from_values(workspace: Option<String>, log: Option<String>) -> Self {
        let workspace = workspace
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self {
            workspace,
            log_level: parse_log_level(log.as_deref()),
        }
    }
}

/// Unset or unrecognised values fall back to `info`.
fn parse_log_level(raw: Option<&str>) -> LevelFilter {
    raw.map(|s| s.trim().to_ascii_lowercase())
        .and_then(|s| LevelFilter::from_str(&s).ok())
        .unwrap_or(LevelFilter::INFO)
}
