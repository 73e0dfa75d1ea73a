use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::MeetError;
use crate::pager::DEFAULT_TILES_PER_PAGE;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Settings {
    /// Base URL of the meeting-metadata service.
    #[serde(default)]
    pub server_url: String,
    #[serde(default = "default_region")]
    pub server_region: String,
    /// Data-message topics subscribed for every session.
    #[serde(default = "default_topics")]
    pub data_topics: Vec<String>,
    #[serde(default = "default_tiles_per_page")]
    pub remote_tiles_per_page: usize,
    #[serde(default = "default_true")]
    pub echo_data_messages: bool,
    #[serde(default = "default_echo_lifetime")]
    pub echo_lifetime_ms: i32,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_topics() -> Vec<String> {
    vec!["chat".to_string()]
}

fn default_tiles_per_page() -> usize {
    DEFAULT_TILES_PER_PAGE
}

fn default_true() -> bool {
    true
}

fn default_echo_lifetime() -> i32 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            server_region: default_region(),
            data_topics: default_topics(),
            remote_tiles_per_page: DEFAULT_TILES_PER_PAGE,
            echo_data_messages: true,
            echo_lifetime_ms: default_echo_lifetime(),
        }
    }
}

impl Settings {
    /// Tiles per page, never zero.
    pub fn tiles_per_page(&self) -> usize {
        self.remote_tiles_per_page.max(1)
    }
}

pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: &str) -> Self {
        let file_path = PathBuf::from(data_dir).join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_server(&self, url: String, region: String) -> Result<(), MeetError> {
        {
            let mut s = self.lock();
            s.server_url = url.trim().trim_end_matches('/').to_string();
            s.server_region = region;
        }
        self.save()
    }

    pub fn set_data_topics(&self, topics: Vec<String>) -> Result<(), MeetError> {
        self.lock().data_topics = topics;
        self.save()
    }

    pub fn set_remote_tiles_per_page(&self, per_page: usize) -> Result<(), MeetError> {
        self.lock().remote_tiles_per_page = per_page.max(1);
        self.save()
    }

    pub fn set_echo(&self, enabled: bool, lifetime_ms: i32) -> Result<(), MeetError> {
        {
            let mut s = self.lock();
            s.echo_data_messages = enabled;
            s.echo_lifetime_ms = lifetime_ms;
        }
        self.save()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self) -> Result<(), MeetError> {
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MeetError::Config(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(&settings).map_err(|e| MeetError::Config(e.to_string()))?;
        std::fs::write(&self.file_path, json).map_err(|e| {
            tracing::warn!("failed to write {}: {e}", self.file_path.display());
            MeetError::Config(e.to_string())
        })
    }

    fn load(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable settings {}: {e}", path.display());
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }
}
