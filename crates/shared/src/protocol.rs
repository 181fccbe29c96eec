use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{domain::RobotStatusSnapshot, error::ResponseStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub commands: String,
}

/// Outcome of one sub-command inside a submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub motion_started: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_status: Option<RobotStatusSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_results: Option<Vec<CommandResult>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_status: Option<RobotStatusSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfoResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<BackendSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
}

/// Backend configuration document served by `/api/settings`.
///
/// Sections the console does not model are kept in `extra` so an edit
/// round-trips without dropping them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub robot: RobotLinkSettings,
    #[serde(default)]
    pub motion: MotionSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm_config: LlmSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotLinkSettings {
    #[serde(default)]
    pub ip: String,
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,
}

impl Default for RobotLinkSettings {
    fn default() -> Self {
        Self {
            ip: String::new(),
            port: default_modbus_port(),
            slave_id: default_slave_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    #[serde(default = "default_speed")]
    pub default_speed: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            default_speed: default_speed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
}

fn default_modbus_port() -> u16 {
    502
}

fn default_slave_id() -> u8 {
    1
}

fn default_speed() -> f64 {
    100.0
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}
