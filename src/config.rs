//! Run configuration for ingestion: which sources, and how long to wait for
//! each.
//!
//! Sources come from the first non-empty of: `--source` flags, the YAML file
//! named by `--sources-file`, or [`DEFAULT_SOURCES`]. The file looks like:
//!
//! ```yaml
//! sources:
//!   - https://feeds.npr.org/1001/rss.xml
//!   - https://example.org/news/
//! ```

use crate::cli::IngestArgs;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Sources used when none are configured.
pub const DEFAULT_SOURCES: &[&str] = &[
    "https://feeds.npr.org/1001/rss.xml",
    "https://feeds.bbci.co.uk/news/rss.xml",
    "https://feeds.reuters.com/Reuters/worldNews",
    "https://www.reddit.com/r/worldnews/.rss",
];

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<String>,
}

/// Everything an ingestion run needs besides the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub sources: Vec<String>,
    pub timeout: Duration,
}

impl IngestConfig {
    pub fn from_args(args: &IngestArgs) -> Result<Self, ConfigError> {
        let sources = resolve_sources(&args.sources, args.sources_file.as_deref())?;
        info!(count = sources.len(), timeout_secs = args.timeout_secs, "Resolved ingestion config");
        Ok(Self {
            sources,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}

/// Pick the source list by precedence, dropping blank entries.
pub fn resolve_sources(
    cli_sources: &[String],
    sources_file: Option<&Path>,
) -> Result<Vec<String>, ConfigError> {
    let sources = if !cli_sources.is_empty() {
        debug!("Using sources from the command line");
        clean(cli_sources.iter().map(String::as_str))
    } else if let Some(path) = sources_file {
        debug!(path = %path.display(), "Using sources file");
        let from_file = load_sources_file(path)?;
        clean(from_file.iter().map(String::as_str))
    } else {
        debug!("Using default sources");
        clean(DEFAULT_SOURCES.iter().copied())
    };

    if sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    Ok(sources)
}

/// Read the `sources` list from a YAML file.
pub fn load_sources_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: display.clone(),
        source: e,
    })?;
    let file: SourcesFile = serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: display,
        source: e,
    })?;
    Ok(file.sources)
}

fn clean<'a>(sources: impl Iterator<Item = &'a str>) -> Vec<String> {
    sources
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let sources = resolve_sources(&[], None).unwrap();
        assert_eq!(sources.len(), DEFAULT_SOURCES.len());
        assert_eq!(sources[0], DEFAULT_SOURCES[0]);
    }

    #[test]
    fn test_cli_sources_win_over_file() {
        let file = yaml_file("sources:\n  - https://file.test/rss\n");
        let cli = vec!["https://cli.test/rss".to_string()];
        let sources = resolve_sources(&cli, Some(file.path())).unwrap();
        assert_eq!(sources, vec!["https://cli.test/rss"]);
    }

    #[test]
    fn test_sources_file_keeps_order_and_skips_blanks() {
        let file = yaml_file("sources:\n  - https://b.test/\n  - '  '\n  - ' https://a.test/feed.xml '\n");
        let sources = resolve_sources(&[], Some(file.path())).unwrap();
        assert_eq!(sources, vec!["https://b.test/", "https://a.test/feed.xml"]);
    }

    #[test]
    fn test_empty_sources_file_is_an_error() {
        let file = yaml_file("sources: []\n");
        let err = resolve_sources(&[], Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::NoSources));
    }

    #[test]
    fn test_missing_sources_file() {
        let err = load_sources_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_sources_file() {
        let file = yaml_file("sources: {not: [a list");
        let err = load_sources_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_args() {
        let args = IngestArgs {
            sources: vec!["https://a.test/feed.xml".to_string()],
            sources_file: None,
            timeout_secs: 3,
        };
        let config = IngestConfig::from_args(&args).unwrap();
        assert_eq!(config.sources, vec!["https://a.test/feed.xml"]);
        assert_eq!(config.timeout, Duration::from_secs(3));
    }
}
