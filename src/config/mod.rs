//! Configuration: service credentials, speakers and client tuning.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identities a human can post as. The first one is the default.
    pub speakers: Vec<String>,
    /// Mirror the feed into the local cache file.
    pub cache_messages: bool,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout_secs: u64,
    pub firebase: FirebaseConfig,
    pub gemini: GeminiConfig,
    pub cloudinary: CloudinaryConfig,
}

/// Firestore project holding the message collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: String,
    pub collection: String,
    /// How often the feed re-queries the collection.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Unsigned-upload destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speakers: vec!["阿庭".to_string(), "阿金".to_string()],
            cache_messages: true,
            request_timeout_secs: 60,
            firebase: FirebaseConfig::default(),
            gemini: GeminiConfig::default(),
            cloudinary: CloudinaryConfig::default(),
        }
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            collection: "messages".to_string(),
            poll_interval_ms: 1500,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "chatroom-cli", "chatroom-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config file")?;
        anyhow::ensure!(
            !config.speakers.is_empty(),
            "Config must list at least one speaker"
        );
        Ok(config)
    }

    /// Override credentials from the environment. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 6] = [
            ("FIREBASE_PROJECT_ID", &mut self.firebase.project_id),
            ("FIREBASE_API_KEY", &mut self.firebase.api_key),
            ("GEMINI_API_KEY", &mut self.gemini.api_key),
            ("GEMINI_MODEL", &mut self.gemini.model),
            ("CLOUDINARY_CLOUD_NAME", &mut self.cloudinary.cloud_name),
            ("CLOUDINARY_UPLOAD_PRESET", &mut self.cloudinary.upload_preset),
        ];
        for (key, slot) in overrides {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value;
            }
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains API keys)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn default_speaker(&self) -> &str {
        self.speakers.first().map(String::as_str).unwrap_or("")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// A printable copy with every secret masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.firebase.api_key = mask(&copy.firebase.api_key);
        copy.gemini.api_key = mask(&copy.gemini.api_key);
        copy
    }
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
            [gemini]
            api_key = "abc"

            [cloudinary]
            cloud_name = "demo"
            upload_preset = "chatroom_unsigned"
            "#,
        )
        .unwrap();

        assert_eq!(config.gemini.api_key, "abc");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.firebase.collection, "messages");
        assert_eq!(config.firebase.poll_interval_ms, 1500);
        assert_eq!(config.speakers, vec!["阿庭", "阿金"]);
        assert_eq!(config.default_speaker(), "阿庭");
        assert_eq!(config.cloudinary.upload_preset, "chatroom_unsigned");
    }

    #[test]
    fn test_empty_speaker_list_rejected() {
        assert!(Config::parse("speakers = []").is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config::default();
        config.gemini.api_key = "from-file".into();

        let env: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", "from-env"),
            ("CLOUDINARY_CLOUD_NAME", "dh1whb4lt"),
            ("FIREBASE_PROJECT_ID", "  "),
        ]
        .into_iter()
        .collect();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.gemini.api_key, "from-env");
        assert_eq!(config.cloudinary.cloud_name, "dh1whb4lt");
        // Blank values do not clobber.
        assert_eq!(config.firebase.project_id, "");
    }

    #[test]
    fn test_redacted_masks_keys() {
        let mut config = Config::default();
        config.gemini.api_key = "AIzaSecretValue1234".into();
        let shown = config.redacted();
        assert_eq!(shown.gemini.api_key, "****1234");
        assert_eq!(shown.firebase.api_key, "");
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let mut config = Config::default();
        config.firebase.project_id = "chatroom-for-akim".into();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::parse(&text).unwrap();
        assert_eq!(back.firebase.project_id, "chatroom-for-akim");
        assert_eq!(back.request_timeout(), Duration::from_secs(60));
    }
}
