//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ferry_core::transport::HttpTransportConfig;
use ferry_core::EngineConfig;
use serde::{Deserialize, Serialize};

pub use ferry_core::util::{is_http_url, normalize_text_option};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    /// Batch endpoint of the sync server
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Engine settings applied when this profile is active
    #[serde(default)]
    pub engine: EngineConfig,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| panic!("Failed to resolve CLI config directory"))
        .join("ferry")
        .join(CONFIG_FILE_NAME)
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path();
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        if let Some(profile) = normalize_profile_name(explicit) {
            return profile;
        }
        if let Some(profile) =
            normalize_profile_name(std::env::var("FERRY_PROFILE").ok().as_deref())
        {
            return profile;
        }
        if let Some(profile) = normalize_profile_name(self.active_profile.as_deref()) {
            return profile;
        }
        "default".to_string()
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    /// Endpoint from `FERRY_ENDPOINT`, falling back to the stored one
    pub fn resolved_endpoint(&self) -> Option<String> {
        normalize_text_option(std::env::var("FERRY_ENDPOINT").ok())
            .or_else(|| normalize_text_option(self.endpoint.clone()))
    }

    /// Transport settings, when an endpoint is known
    pub fn transport_config(&self, auth_token: Option<String>) -> Option<HttpTransportConfig> {
        let endpoint = self.resolved_endpoint()?;
        let mut config = HttpTransportConfig::new(endpoint);
        if let Some(token) = normalize_text_option(auth_token) {
            config = config.with_auth_token(token);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        Some(config)
    }

    fn normalize(&mut self) {
        self.endpoint = normalize_text_option(self.endpoint.clone())
            .map(|endpoint| endpoint.trim_end_matches('/').to_string());
        self.engine.device_id = normalize_text_option(self.engine.device_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::ResolutionStrategy;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli-config.json");

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some("default".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                endpoint: Some(" https://api.example.com/v1/sync/ ".to_string()),
                timeout_secs: Some(10),
                engine: EngineConfig::default()
                    .with_batch_size(20)
                    .with_strategy(ResolutionStrategy::LastWriteWins),
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profiles.get("default").unwrap();
        assert_eq!(
            profile.endpoint.as_deref(),
            Some("https://api.example.com/v1/sync")
        );
        assert_eq!(profile.timeout_secs, Some(10));
        assert_eq!(profile.engine.batch_size, 20);
        assert_eq!(profile.engine.strategy, ResolutionStrategy::LastWriteWins);
    }

    #[test]
    fn missing_engine_section_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cli-config.json");
        std::fs::write(
            &path,
            r#"{"profiles": {"work": {"endpoint": "http://localhost:8080/sync"}}}"#,
        )
        .unwrap();

        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let profile = loaded.profile("work").unwrap();
        assert_eq!(profile.engine, EngineConfig::default());
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("work".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(config.resolve_profile_name(Some("laptop")), "laptop");
        assert_eq!(config.resolve_profile_name(None), "work");
    }

    #[test]
    fn transport_config_carries_token_and_timeout() {
        let profile = CliProfile {
            endpoint: Some("https://api.example.com/v1/sync".to_string()),
            timeout_secs: Some(5),
            engine: EngineConfig::default(),
        };
        let config = profile
            .transport_config(Some(" token ".to_string()))
            .unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("token"));
        assert_eq!(config.timeout_secs, 5);

        assert!(CliProfile::default().endpoint.is_none());
    }
}
