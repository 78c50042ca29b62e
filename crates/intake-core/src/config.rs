use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "doc", "docx"];
pub const DEFAULT_SUBMIT_DELAY_MS: u64 = 2000;

/// Name of the per-directory override file.
pub const LOCAL_CONFIG_FILE: &str = ".intake.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk TOML configuration. Every field is optional so partial files merge
/// over defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub upload: Option<UploadConfig>,
    pub submit: Option<SubmitConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_file_size_mb: Option<u64>,
    pub accepted_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmitConfig {
    pub delay_ms: Option<u64>,
}

/// Resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub max_file_size_mb: u64,
    pub accepted_extensions: Vec<String>,
    pub submit_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        ConfigFile::default().resolve()
    }
}

impl Settings {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn accepts(&self, extension: &str) -> bool {
        self.accepted_extensions.iter().any(|accepted| accepted.eq_ignore_ascii_case(extension))
    }
}

impl ConfigFile {
    pub fn resolve(&self) -> Settings {
        let upload = self.upload.clone().unwrap_or_default();
        let submit = self.submit.clone().unwrap_or_default();

        let accepted_extensions = upload
            .accepted_extensions
            .map(|extensions| extensions.iter().map(|ext| normalize_extension(ext)).collect())
            .unwrap_or_else(|| {
                DEFAULT_ACCEPTED_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect()
            });

        Settings {
            max_file_size_mb: upload.max_file_size_mb.unwrap_or(DEFAULT_MAX_FILE_SIZE_MB),
            accepted_extensions,
            submit_delay: Duration::from_millis(submit.delay_ms.unwrap_or(DEFAULT_SUBMIT_DELAY_MS)),
        }
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Platform config path: `<config_dir>/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "Intake", "Intake").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Cascades `<dir>/.intake.toml` over the platform config.
pub fn load_config(dir: &Path) -> Result<ConfigFile, ConfigError> {
    let platform = match config_path() {
        Some(path) => load_from_path(&path)?,
        None => None,
    };
    let local = load_from_path(&dir.join(LOCAL_CONFIG_FILE))?;

    Ok(match (platform, local) {
        (None, None) => ConfigFile::default(),
        (Some(platform), None) => platform,
        (None, Some(local)) => local,
        (Some(platform), Some(local)) => merge(platform, local),
    })
}

/// `Ok(None)` when the file does not exist. Malformed files are errors.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
    };

    let config = toml::from_str(&content)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(Some(config))
}

/// `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let base_upload = base.upload.unwrap_or_default();
    let overlay_upload = overlay.upload.unwrap_or_default();
    let base_submit = base.submit.unwrap_or_default();
    let overlay_submit = overlay.submit.unwrap_or_default();

    ConfigFile {
        upload: Some(UploadConfig {
            max_file_size_mb: overlay_upload.max_file_size_mb.or(base_upload.max_file_size_mb),
            accepted_extensions: overlay_upload
                .accepted_extensions
                .or(base_upload.accepted_extensions),
        }),
        submit: Some(SubmitConfig { delay_ms: overlay_submit.delay_ms.or(base_submit.delay_ms) }),
    }
}
