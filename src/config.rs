use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_QUESTION_RANGE: (u32, u32) = (15, 600);
pub const STREAK_BONUS_MIN_DAYS_RANGE: (u32, u32) = (1, 30);
pub const UTC_OFFSET_MINUTES_RANGE: (i32, i32) = (-720, 840);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub question_bank_path: Option<String>,
    #[serde(default)]
    pub question_bank_url: Option<String>,
    #[serde(default = "default_shuffle_questions")]
    pub shuffle_questions: bool,
    #[serde(default = "default_seconds_per_question")]
    pub seconds_per_question: u32,
    #[serde(default = "default_streak_bonus_min_days")]
    pub streak_bonus_min_days: u32,
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
}

fn default_user_id() -> String {
    "default".to_string()
}
fn default_data_dir() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acpquiz")
        .to_string_lossy()
        .to_string()
}
fn default_shuffle_questions() -> bool {
    false
}
fn default_seconds_per_question() -> u32 {
    90
}
fn default_streak_bonus_min_days() -> u32 {
    2
}
fn default_utc_offset_minutes() -> i32 {
    chrono::Local::now().offset().local_minus_utc() / 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            data_dir: default_data_dir(),
            question_bank_path: None,
            question_bank_url: None,
            shuffle_questions: default_shuffle_questions(),
            seconds_per_question: default_seconds_per_question(),
            streak_bonus_min_days: default_streak_bonus_min_days(),
            utc_offset_minutes: default_utc_offset_minutes(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(Self::config_path, Path::to_path_buf);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else {
            Config::default()
        };
        config.validate();
        Ok(config)
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = path.map_or_else(Self::config_path, Path::to_path_buf);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Write this config as a new config file and return its path. An
    /// existing file is only replaced with `force`.
    pub fn init(&self, path: Option<&Path>, force: bool) -> Result<PathBuf> {
        let path = path.map_or_else(Self::config_path, Path::to_path_buf);
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        self.save(Some(&path))
            .with_context(|| format!("writing config {}", path.display()))?;
        Ok(path)
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("acpquiz")
            .join("config.toml")
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Where a downloaded question bank is cached.
    pub fn bank_cache_path(&self) -> PathBuf {
        self.data_path().join("cache").join("questions.json")
    }

    /// Clamp numeric fields into their allowed ranges and reset blank
    /// strings. Call after deserialization.
    pub fn validate(&mut self) {
        let (lo, hi) = SECONDS_PER_QUESTION_RANGE;
        self.seconds_per_question = self.seconds_per_question.clamp(lo, hi);
        let (lo, hi) = STREAK_BONUS_MIN_DAYS_RANGE;
        self.streak_bonus_min_days = self.streak_bonus_min_days.clamp(lo, hi);
        let (lo, hi) = UTC_OFFSET_MINUTES_RANGE;
        self.utc_offset_minutes = self.utc_offset_minutes.clamp(lo, hi);

        if self.user_id.trim().is_empty() {
            self.user_id = default_user_id();
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self
            .question_bank_path
            .as_ref()
            .is_some_and(|p| p.trim().is_empty())
        {
            self.question_bank_path = None;
        }
        if self
            .question_bank_url
            .as_ref()
            .is_some_and(|u| u.trim().is_empty())
        {
            self.question_bank_url = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_serde_defaults_from_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.user_id, "default");
        assert_eq!(config.seconds_per_question, 90);
        assert_eq!(config.streak_bonus_min_days, 2);
        assert!(!config.shuffle_questions);
        assert!(config.question_bank_path.is_none());
        assert!(config.data_dir.contains("acpquiz"));
    }

    #[test]
    fn test_config_serde_partial_fields() {
        let toml_str = r#"
user_id = "ana"
seconds_per_question = 45
question_bank_path = "/tmp/bank.json"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.user_id, "ana");
        assert_eq!(config.seconds_per_question, 45);
        assert_eq!(config.question_bank_path.as_deref(), Some("/tmp/bank.json"));
        assert_eq!(config.streak_bonus_min_days, 2);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let mut config = Config::default();
        config.question_bank_url = Some("https://example.com/q.json".to_string());
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_validate_clamps_ranges() {
        let mut config = Config::default();
        config.seconds_per_question = 1;
        config.streak_bonus_min_days = 0;
        config.utc_offset_minutes = 5000;
        config.validate();
        assert_eq!(config.seconds_per_question, 15);
        assert_eq!(config.streak_bonus_min_days, 1);
        assert_eq!(config.utc_offset_minutes, 840);

        config.seconds_per_question = 10_000;
        config.utc_offset_minutes = -5000;
        config.validate();
        assert_eq!(config.seconds_per_question, 600);
        assert_eq!(config.utc_offset_minutes, -720);
    }

    #[test]
    fn test_validate_resets_blank_strings() {
        let mut config = Config::default();
        config.user_id = "  ".to_string();
        config.question_bank_path = Some(String::new());
        config.question_bank_url = Some(" ".to_string());
        config.validate();
        assert_eq!(config.user_id, "default");
        assert!(config.question_bank_path.is_none());
        assert!(config.question_bank_url.is_none());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.seconds_per_question, 90);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.user_id = "ben".to_string();
        config.shuffle_questions = true;
        config.save(Some(&path)).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "seconds_per_question = \"lots\"").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.user_id = "ana".to_string();
        assert_eq!(config.init(Some(&path), false).unwrap(), path);

        config.user_id = "ben".to_string();
        let err = config.init(Some(&path), false).unwrap_err().to_string();
        assert!(err.contains("already exists"));
        assert_eq!(Config::load(Some(&path)).unwrap().user_id, "ana");

        config.init(Some(&path), true).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().user_id, "ben");
    }
}
