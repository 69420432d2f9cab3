use std::path::Path;

use studybot_common::{Error, Result};
use tracing::{info, warn};

use crate::model::AppConfig;

/// Loads configuration from a TOML file with environment overrides.
///
/// Precedence, lowest to highest: built-in defaults, the TOML file,
/// `STUDYBOT_*` environment variables. A `.env` file in the working
/// directory is honored before the environment is read.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        if dotenvy::dotenv().is_ok() {
            info!("loaded environment from .env");
        }

        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?
            }
            Some(path) => {
                warn!(
                    "config file {} not found, using defaults",
                    path.display()
                );
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(config: &mut AppConfig) {
        if let Ok(url) = std::env::var("STUDYBOT_COMPLETION_URL") {
            config.completion.base_url = url;
        }
        if let Ok(model) = std::env::var("STUDYBOT_COMPLETION_MODEL") {
            config.completion.model = model;
        }
        // OPENAI_API_KEY is the conventional name for OpenAI-compatible
        // endpoints; the STUDYBOT-prefixed variable wins when both are set.
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.completion.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("STUDYBOT_API_KEY") {
            config.completion.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("STUDYBOT_TOOLS_URL") {
            config.tools.base_url = url;
        }
        if let Ok(url) = std::env::var("STUDYBOT_STT_URL") {
            config.audio.stt_url = url;
        }
        if let Ok(url) = std::env::var("STUDYBOT_TTS_URL") {
            config.audio.tts_url = url;
        }
        if let Ok(path) = std::env::var("STUDYBOT_DB_PATH") {
            config.store.db_path = path;
        }
    }

    fn validate(config: &AppConfig) -> Result<()> {
        for (name, url) in [
            ("completion.base_url", &config.completion.base_url),
            ("tools.base_url", &config.tools.base_url),
            ("audio.stt_url", &config.audio.stt_url),
            ("audio.tts_url", &config.audio.tts_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!("{name} must be an http(s) URL: {url}")));
            }
        }
        if config.context.window_turns == 0 {
            return Err(Error::Config(
                "context.window_turns must be at least 1".to_string(),
            ));
        }
        if config.audio.max_duration_secs == 0 {
            return Err(Error::Config(
                "audio.max_duration_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;
    use std::io::Write;

    #[test]
    fn load_without_file_uses_defaults() {
        let config = ConfigLoader::load(None).expect("defaults should load");
        assert_eq!(config.context.window_turns, 20);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[tools]\nbase_url = \"http://tools.internal:9000\"\ntimeout_secs = 5"
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).expect("file should load");
        assert_eq!(config.tools.base_url, "http://tools.internal:9000");
        assert_eq!(config.tools.timeout_secs, 5);
        // Untouched sections keep defaults.
        assert_eq!(config.audio.max_duration_secs, 60);
    }

    #[test]
    fn rejects_non_http_urls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[completion]\nbase_url = \"ftp://nope\"").unwrap();

        let err = ConfigLoader::load(Some(file.path())).expect_err("should fail");
        assert!(err.to_string().contains("completion.base_url"));
    }
}
