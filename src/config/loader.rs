use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::TestgapConfig;
use crate::errors::{Error, Result};

pub const CONFIG_FILE_NAME: &str = ".testgap.toml";
const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Pure function to read config file contents
pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse a TOML document, resetting invalid sections to their defaults.
pub fn parse_and_validate_config(contents: &str) -> std::result::Result<TestgapConfig, String> {
    let mut config = toml::from_str::<TestgapConfig>(contents)
        .map_err(|e| format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))?;

    for warning in config.sanitize() {
        log::warn!("Invalid configuration: {}. Using defaults for that section.", warning);
    }

    Ok(config)
}

/// Strict loading: any read, parse or validation failure is an error.
pub fn load_config_from_path(path: &Path) -> Result<TestgapConfig> {
    let contents = read_config_file(path)
        .map_err(|e| Error::file_system("Failed to read config file", path, e))?;
    let config = toml::from_str::<TestgapConfig>(&contents)?;
    config.validate().map_err(Error::Configuration)?;
    Ok(config)
}

/// Lenient loading of a specific path; failures are logged and yield `None`.
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<TestgapConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("{}. Using defaults.", e);
            None
        }
    }
}

/// Handle file read errors with appropriate logging
pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    // "not found" is the normal case while walking ancestors
    if error.kind() != std::io::ErrorKind::NotFound {
        log::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Directory ancestors of `start`, nearest first, up to `max_depth` entries.
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Find the nearest `.testgap.toml` starting at `start`.
pub fn load_config_from(start: &Path) -> TestgapConfig {
    directory_ancestors(start.to_path_buf(), MAX_TRAVERSAL_DEPTH)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!(
                "No config found after checking {} directories. Using default config.",
                MAX_TRAVERSAL_DEPTH
            );
            TestgapConfig::default()
        })
}

/// Find the nearest `.testgap.toml` starting at the current directory.
pub fn load_config() -> TestgapConfig {
    match std::env::current_dir() {
        Ok(dir) => load_config_from(&dir),
        Err(e) => {
            log::warn!(
                "Failed to get current directory: {}. Using default config.",
                e
            );
            TestgapConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UnitKind;

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = parse_and_validate_config(
            r#"
[coverage]
low_coverage_threshold = 40.0

[priority]
kinds = ["function", "method", "class"]
"#,
        )
        .unwrap();

        assert_eq!(config.coverage.low_coverage_threshold, 40.0);
        assert_eq!(
            config.priority.kinds,
            vec![UnitKind::Function, UnitKind::Method, UnitKind::Class]
        );
        assert_eq!(config.mapping.name_weight, 0.5);
    }

    #[test]
    fn test_parse_resets_invalid_section() {
        let config = parse_and_validate_config(
            r#"
[mapping]
name_weight = 3.0
"#,
        )
        .unwrap();
        assert_eq!(config.mapping.name_weight, 0.5);
    }

    #[test]
    fn test_parse_rejects_malformed_toml() {
        assert!(parse_and_validate_config("[mapping\nname_weight = ").is_err());
    }

    #[test]
    fn test_directory_ancestors_is_bounded() {
        let dirs: Vec<_> = directory_ancestors(PathBuf::from("/a/b/c/d"), 2).collect();
        assert_eq!(dirs, vec![PathBuf::from("/a/b/c/d"), PathBuf::from("/a/b/c")]);
    }
}
