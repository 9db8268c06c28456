// Configuration loading and parsing (pipeline.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::features::FeatureScheme;
use crate::pca::{PcaOptions, MAX_COMPONENTS};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Season to report on when none is requested explicitly. `None` means
    /// "latest season present in the data".
    pub default_season: Option<u32>,
    pub min_sets_played: u64,
    pub scheme: FeatureScheme,
    pub pca: PcaOptions,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    #[serde(default)]
    season: SeasonSection,
    pool: PoolSection,
    features: FeaturesSection,
    pca: PcaSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SeasonSection {
    default: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolSection {
    min_sets_played: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct FeaturesSection {
    scheme: String,
}

#[derive(Debug, Clone, Deserialize)]
struct PcaSection {
    components: usize,
    max_iterations: usize,
    tolerance: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub players: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Config file name, under both `config/` and `defaults/`.
const PIPELINE_FILE: &str = "pipeline.toml";

/// Load and validate `config/pipeline.toml` relative to `base_dir`.
///
/// This does not copy defaults; prefer `load_config_in()` for normal startup.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(PIPELINE_FILE);
    let text = read_file(&path)?;
    let file: PipelineFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;

    let scheme = file
        .features
        .scheme
        .parse::<FeatureScheme>()
        .map_err(|message| ConfigError::ValidationError {
            field: "features.scheme".into(),
            message,
        })?;

    let config = Config {
        default_season: file.season.default,
        min_sets_played: file.pool.min_sets_played,
        scheme,
        pca: PcaOptions {
            components: file.pca.components,
            max_iterations: file.pca.max_iterations,
            tolerance: file.pca.tolerance,
        },
        data_paths: file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/pipeline.toml` to `config/pipeline.toml` unless the latter
/// already exists. Returns the created path, or `None` if nothing was copied.
pub fn ensure_pipeline_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(PIPELINE_FILE);
    if target.exists() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(PIPELINE_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither config/{PIPELINE_FILE} nor defaults/{PIPELINE_FILE} found in {}",
                base_dir.display()
            ),
        });
    }

    let copy_err = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
    };
    std::fs::create_dir_all(base_dir.join("config")).map_err(copy_err)?;
    std::fs::copy(&source, &target).map_err(copy_err)?;

    info!("Created {} from defaults", target.display());
    Ok(Some(target))
}

/// Load config relative to `base_dir`, copying defaults first.
pub fn load_config_in(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_pipeline_config(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    let pca = &config.pca;
    if !(1..=MAX_COMPONENTS).contains(&pca.components) {
        return Err(ConfigError::ValidationError {
            field: "pca.components".into(),
            message: format!("must be between 1 and {MAX_COMPONENTS}, got {}", pca.components),
        });
    }

    if pca.max_iterations == 0 {
        return Err(ConfigError::ValidationError {
            field: "pca.max_iterations".into(),
            message: "must be > 0".into(),
        });
    }

    if !pca.tolerance.is_finite() || pca.tolerance <= 0.0 {
        return Err(ConfigError::ValidationError {
            field: "pca.tolerance".into(),
            message: format!("must be a positive number, got {}", pca.tolerance),
        });
    }

    if config.data_paths.players.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data_paths.players".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root, where `defaults/` lives.
    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    fn default_pipeline_toml() -> String {
        fs::read_to_string(project_root().join("defaults/pipeline.toml")).unwrap()
    }

    /// Fresh scratch dir with `config/pipeline.toml` holding `contents`.
    fn scratch_with(name: &str, contents: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/pipeline.toml"), contents).unwrap();
        tmp
    }

    fn expect_validation_field(err: ConfigError, expected: &str) {
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_default_config() {
        let tmp = scratch_with("vs_config_defaults", &default_pipeline_toml());
        let config = load_config_from(&tmp).expect("defaults should load");
        assert_eq!(config.default_season, None);
        assert_eq!(config.min_sets_played, 10);
        assert_eq!(config.scheme, FeatureScheme::V2Separated);
        assert_eq!(config.pca, PcaOptions::default());
        assert_eq!(config.data_paths.players, "data/players.json");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn season_section_is_optional() {
        let text = r#"
[pool]
min_sets_played = 4

[features]
scheme = "v1"

[pca]
components = 2
max_iterations = 50
tolerance = 1e-5

[data_paths]
players = "p.json"
"#;
        let tmp = scratch_with("vs_config_no_season", text);
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.default_season, None);
        assert_eq!(config.scheme, FeatureScheme::V1Combined);
        assert_eq!(config.pca.components, 2);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_default_season() {
        let text = default_pipeline_toml().replace("[season]", "[season]\ndefault = 3");
        let tmp = scratch_with("vs_config_season", &text);
        assert_eq!(load_config_from(&tmp).unwrap().default_season, Some(3));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let text = default_pipeline_toml().replace("scheme = \"v2\"", "scheme = \"v9\"");
        let tmp = scratch_with("vs_config_bad_scheme", &text);
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "features.scheme");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_too_many_components() {
        let text = default_pipeline_toml().replace("components = 3", "components = 4");
        let tmp = scratch_with("vs_config_components", &text);
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "pca.components");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_iterations() {
        let text = default_pipeline_toml().replace("max_iterations = 100", "max_iterations = 0");
        let tmp = scratch_with("vs_config_iterations", &text);
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "pca.max_iterations");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        let text = default_pipeline_toml().replace("tolerance = 1e-6", "tolerance = 0.0");
        let tmp = scratch_with("vs_config_tolerance", &text);
        expect_validation_field(load_config_from(&tmp).unwrap_err(), "pca.tolerance");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let tmp = scratch_with("vs_config_invalid", "this is not valid [[[ toml");
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with("pipeline.toml")),
            other => panic!("expected ParseError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_pipeline_toml() {
        let tmp = std::env::temp_dir().join("vs_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("pipeline.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_pipeline_config_copies_missing() {
        let tmp = std::env::temp_dir().join("vs_config_ensure_copies");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/pipeline.toml"), default_pipeline_toml()).unwrap();

        let copied = ensure_pipeline_config(&tmp).expect("should succeed");
        assert_eq!(copied, Some(tmp.join("config/pipeline.toml")));
        assert_eq!(
            fs::read_to_string(tmp.join("config/pipeline.toml")).unwrap(),
            default_pipeline_toml()
        );
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_pipeline_config_keeps_existing() {
        let tmp = scratch_with("vs_config_ensure_keeps", "# custom\n");
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/pipeline.toml"), default_pipeline_toml()).unwrap();

        assert_eq!(ensure_pipeline_config(&tmp).expect("should succeed"), None);
        let content = fs::read_to_string(tmp.join("config/pipeline.toml")).unwrap();
        assert_eq!(content, "# custom\n");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_pipeline_config_errors_without_defaults() {
        let tmp = std::env::temp_dir().join("vs_config_no_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        match ensure_pipeline_config(&tmp).unwrap_err() {
            ConfigError::DefaultsCopyError { message } => {
                assert!(message.contains("defaults/pipeline.toml"));
            }
            other => panic!("expected DefaultsCopyError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn load_config_in_bootstraps_from_defaults() {
        let tmp = std::env::temp_dir().join("vs_config_bootstrap");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/pipeline.toml"), default_pipeline_toml()).unwrap();

        let config = load_config_in(&tmp).expect("defaults should bootstrap");
        assert_eq!(config.min_sets_played, 10);
        assert!(tmp.join("config/pipeline.toml").exists());
        // Second run reads the copy without touching it.
        assert!(load_config_in(&tmp).is_ok());
        let _ = fs::remove_dir_all(&tmp);
    }
}
