//! Logger setup. The terminal belongs to the UI, so records go to a file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{Config, ConfigBuilder, WriteLogger};

use crate::config::LogConfig;

/// Installs a file logger and returns the file it writes to.
///
/// Failures are reported on stderr and leave logging disabled; they never stop the app.
pub fn initialize(cfg: &LogConfig) -> Option<PathBuf> {
    let level = parse_level(&cfg.level);
    if level == LevelFilter::Off {
        return None;
    }
    let path = cfg.file.clone()?;
    let file = match create_log_file(&path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("Warning: Could not create log file at {:?}: {}", path, err);
            return None;
        }
    };

    match WriteLogger::init(level, build_config(), file) {
        Ok(()) => Some(path),
        Err(_) => None,
    }
}

/// Unknown level names fall back to `info`.
pub fn parse_level(raw: &str) -> LevelFilter {
    LevelFilter::from_str(raw.trim()).unwrap_or(LevelFilter::Info)
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level(" warn "), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }

    #[test]
    fn off_level_installs_nothing() {
        let cfg = LogConfig {
            level: "off".into(),
            file: Some(PathBuf::from("/nonexistent/showland.log")),
        };
        assert_eq!(initialize(&cfg), None);
    }

    #[test]
    fn log_file_parent_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("showland.log");
        create_log_file(&path).unwrap();
        assert!(path.exists());
    }
}
