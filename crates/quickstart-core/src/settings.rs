use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::engine::{ChannelMediaOptions, ChannelProfile, ClientRole, RenderMode};
use crate::errors::QuickstartError;

pub const SETTINGS_FILE: &str = "quickstart.json";

const APP_ID_PLACEHOLDER: &str = "<#Your App ID#>";
const CHANNEL_PLACEHOLDER: &str = "<#Your channel name#>";
const TOKEN_PLACEHOLDER: &str = "<#Your Token#>";

/// Project identity, channel and temporary join token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    #[serde(default = "default_token")]
    pub token: String,
}

fn default_app_id() -> String {
    APP_ID_PLACEHOLDER.to_string()
}

fn default_channel_name() -> String {
    CHANNEL_PLACEHOLDER.to_string()
}

fn default_token() -> String {
    TOKEN_PLACEHOLDER.to_string()
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            channel_name: default_channel_name(),
            token: default_token(),
        }
    }
}

impl Credentials {
    /// Fails while any value is empty or still the integrator placeholder.
    pub fn validate(&self) -> Result<(), QuickstartError> {
        let fields = [
            ("app_id", &self.app_id, APP_ID_PLACEHOLDER),
            ("channel_name", &self.channel_name, CHANNEL_PLACEHOLDER),
            ("token", &self.token, TOKEN_PLACEHOLDER),
        ];
        for (name, value, placeholder) in fields {
            let value = value.trim();
            if value.is_empty() || value == placeholder {
                return Err(QuickstartError::Config(format!("{name} is not configured")));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MediaSettings {
    #[serde(default = "default_role")]
    pub client_role: ClientRole,
    #[serde(default = "default_profile")]
    pub channel_profile: ChannelProfile,
    #[serde(default = "default_true")]
    pub publish_microphone: bool,
    #[serde(default = "default_true")]
    pub publish_camera: bool,
    #[serde(default = "default_true")]
    pub auto_subscribe_audio: bool,
    #[serde(default = "default_true")]
    pub auto_subscribe_video: bool,
    #[serde(default)]
    pub render_mode: RenderMode,
}

fn default_role() -> ClientRole {
    ClientRole::Broadcaster
}

fn default_profile() -> ChannelProfile {
    ChannelProfile::LiveBroadcasting
}

fn default_true() -> bool {
    true
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            client_role: default_role(),
            channel_profile: default_profile(),
            publish_microphone: true,
            publish_camera: true,
            auto_subscribe_audio: true,
            auto_subscribe_video: true,
            render_mode: RenderMode::Fit,
        }
    }
}

impl MediaSettings {
    pub fn channel_options(&self) -> ChannelMediaOptions {
        ChannelMediaOptions {
            client_role: self.client_role,
            channel_profile: self.channel_profile,
            publish_microphone_track: self.publish_microphone,
            publish_camera_track: self.publish_camera,
            auto_subscribe_audio: self.auto_subscribe_audio,
            auto_subscribe_video: self.auto_subscribe_video,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub media: MediaSettings,
    /// `tracing` filter directive used by the host when installing logging.
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// JSON-backed settings in the host's data directory.
pub struct SettingsStore {
    settings: Mutex<Settings>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join(SETTINGS_FILE);
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            file_path,
        }
    }

    pub fn get(&self) -> Settings {
        self.lock().clone()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.lock().credentials = credentials;
        self.save();
    }

    pub fn set_media(&self, media: MediaSettings) {
        self.lock().media = media;
        self.save();
    }

    pub fn set_log_filter(&self, filter: Option<String>) {
        self.lock().log_filter = filter;
        self.save();
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self) {
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("failed to write {}: {e}", self.file_path.display());
                }
            }
            Err(e) => tracing::warn!("failed to serialize settings: {e}"),
        }
    }

    fn load(path: &Path) -> Settings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable {}: {e}", path.display());
                Settings::default()
            }),
            Err(_) => Settings::default(),
        }
    }
}
