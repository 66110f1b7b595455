use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate_first;

/// Directory holding a project-level config.
const PROJECT_DIR: &str = ".nbdebug";

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# nbdebug configuration
# Uncomment and edit settings below to override defaults.

# [backend]
# address = "127.0.0.1:5678"
# channel_capacity = 64

# [session]
# cwd = "/tmp/"
# just_my_code = false
# cell_id = 0
# next_id = 1
# adapter_id = "python"

# [log]
# level = "info"
# file = "/path/to/nbdebug.log"
"#;

/// Load and merge configuration.
///
/// Layers, later wins: `Config::default()`, then
/// `config_dir/config.toml` (created from a commented template when
/// missing), then the nearest `.nbdebug/config.toml` at or above
/// `project_dir`. The merged result is validated.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or
/// validation failure.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = ensure_global_config(config_dir)?;
    let mut config = Config::default();

    let global = read_file(&global_path)?;
    if has_non_comment_content(&global) {
        tracing::debug!(path = %global_path.display(), "applying global config");
        config = merge_configs(&config, &global)?;
    }

    if let Some(project_path) = project_dir.and_then(find_project_config) {
        tracing::debug!(path = %project_path.display(), "applying project config");
        let project = read_file(&project_path)?;
        config = merge_configs(&config, &project)?;
    }

    validate_first(&config)?;
    Ok(config)
}

fn ensure_global_config(config_dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = config_dir.join("config.toml");
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }
    if !path.exists() {
        std::fs::write(&path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("created default config at {}", path.display());
    }
    Ok(path)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Walk from `start` upward looking for `.nbdebug/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(PROJECT_DIR).join("config.toml"))
        .find(|candidate| candidate.is_file())
}

/// Whether `content` has a line that is neither blank nor a comment.
fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_first(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_config_creates_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config, Config::default());

        let created = std::fs::read_to_string(cfg_dir.join("config.toml")).unwrap();
        assert_eq!(created, DEFAULT_CONFIG_CONTENT);
    }

    #[test]
    fn load_config_reads_existing_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[session]\njust_my_code = true\n",
        )
        .unwrap();

        let config = load_config(&cfg_dir, None).unwrap();
        assert!(config.session.just_my_code);
        assert_eq!(config.session.cwd, "/tmp/");
    }

    #[test]
    fn load_config_merges_project_over_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[backend]\naddress = \"127.0.0.1:7000\"\nchannel_capacity = 16\n",
        )
        .unwrap();

        let proj_dir = tmp.path().join("project");
        let nb_dir = proj_dir.join(".nbdebug");
        std::fs::create_dir_all(&nb_dir).unwrap();
        std::fs::write(
            nb_dir.join("config.toml"),
            "[backend]\naddress = \"127.0.0.1:7001\"\n",
        )
        .unwrap();

        let config = load_config(&cfg_dir, Some(&proj_dir)).unwrap();
        assert_eq!(config.backend.address, "127.0.0.1:7001");
        assert_eq!(config.backend.channel_capacity, 16);
    }

    #[test]
    fn load_config_rejects_invalid_merged_result() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[session]\ncwd = \"\"\n").unwrap();

        let err = load_config(&cfg_dir, None).unwrap_err();
        assert!(err.to_string().contains("session.cwd"), "got: {err}");
    }

    #[test]
    fn load_from_str_parses_valid_toml() {
        let config = load_from_str("[session]\nnext_id = 5\n").unwrap();
        assert_eq!(config.session.next_id, 5);
    }

    #[test]
    fn load_from_str_rejects_invalid_toml() {
        assert!(matches!(load_from_str("{{bad}}"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_from_str_rejects_invalid_values() {
        let result = load_from_str("[backend]\nchannel_capacity = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn load_config_reports_unreadable_project_file() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        let proj_dir = tmp.path().join("project");
        // A directory where the file should be cannot be read as text.
        std::fs::create_dir_all(proj_dir.join(".nbdebug").join("config.toml")).unwrap();

        // find_project_config only accepts files, so this layer is skipped.
        assert!(load_config(&cfg_dir, Some(&proj_dir)).is_ok());

        let err = read_file(&proj_dir.join(".nbdebug").join("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "got {err:?}");
    }

    #[test]
    fn find_project_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let nb = root.join(".nbdebug");
        std::fs::create_dir_all(&nb).unwrap();
        std::fs::write(nb.join("config.toml"), "[log]\nlevel = \"debug\"\n").unwrap();

        let deep = root.join("notebooks").join("2024");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_project_config(&deep).unwrap();
        assert!(found.ends_with(".nbdebug/config.toml"));
        assert!(found.starts_with(&root));
    }

    #[test]
    fn default_config_content_is_comment_only() {
        assert!(!has_non_comment_content(DEFAULT_CONFIG_CONTENT));
    }

    #[test]
    fn has_non_comment_content_detects_values() {
        assert!(!has_non_comment_content(""));
        assert!(!has_non_comment_content("# comment\n"));
        assert!(has_non_comment_content("# comment\n[backend]\n"));
    }
}
