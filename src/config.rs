// ABOUTME: Settings for atelier — server address, model, sampling, system instruction.
// ABOUTME: Reads and writes ~/.atelier/config.toml; out-of-range values are clamped.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// User-tunable settings, persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_address: String,
    pub model: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub system_instruction: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_address: "http://localhost:11434".to_string(),
            model: String::new(),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
            system_instruction: "You are a helpful AI assistant.".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the config file, falling back to defaults when the
    /// file does not exist. Sampling values outside their valid ranges are
    /// clamped rather than rejected.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from an explicit path (for testing).
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)?;
        settings.clamp();
        Ok(settings)
    }

    /// Write settings to the config file.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&config_path())
    }

    /// Save to an explicit path (for testing).
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp sampling parameters into their valid ranges: temperature and
    /// top_p into [0, 1], top_k into [1, 100].
    pub fn clamp(&mut self) {
        let before = (self.temperature, self.top_k, self.top_p);
        self.temperature = self.temperature.clamp(0.0, 1.0);
        self.top_k = self.top_k.clamp(1, 100);
        self.top_p = self.top_p.clamp(0.0, 1.0);
        if before != (self.temperature, self.top_k, self.top_p) {
            log::warn!(
                "sampling settings out of range, clamped to temperature={} top_k={} top_p={}",
                self.temperature,
                self.top_k,
                self.top_p
            );
        }
    }
}

/// Path to the settings file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Path to the persisted sessions list.
pub fn sessions_path() -> PathBuf {
    data_dir().join("sessions.json")
}

fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".atelier")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.server_address, "http://localhost:11434");
        assert_eq!(settings.model, "");
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.top_k, 40);
        assert_eq!(settings.top_p, 0.9);
        assert_eq!(settings.system_instruction, "You are a helpful AI assistant.");
    }

    #[test]
    fn settings_roundtrip_through_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");

        let mut settings = Settings::default();
        settings.model = "llama3:8b".to_string();
        settings.temperature = 0.3;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.model, "llama3:8b");
        assert_eq!(loaded.temperature, 0.3);
        assert_eq!(loaded.top_k, 40);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing.toml");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.server_address, "http://localhost:11434");
    }

    #[test]
    fn partial_file_uses_defaults_for_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "model = \"mistral\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.model, "mistral");
        assert_eq!(settings.top_p, 0.9);
    }

    #[test]
    fn out_of_range_values_are_clamped_on_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "temperature = 3.5\ntop_k = 0\ntop_p = -0.2\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.temperature, 1.0);
        assert_eq!(settings.top_k, 1);
        assert_eq!(settings.top_p, 0.0);
    }
}
