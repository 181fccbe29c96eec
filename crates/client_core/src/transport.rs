//! HTTP seam between the controller and the motion backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{
        BackendSettings, CommandRequest, CommandResponse, MessageResponse, ServerInfoResponse,
        SettingsResponse, StatusResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::error::ControllerError;

const COMMAND_PATH: &str = "api/command";
const STATUS_PATH: &str = "api/status";
const SERVER_INFO_PATH: &str = "api/server_info";
const SETTINGS_PATH: &str = "api/settings";

#[async_trait]
pub trait RobotBackend: Send + Sync {
    async fn submit_commands(&self, commands: &str) -> Result<CommandResponse, ControllerError>;
    async fn fetch_status(&self) -> Result<StatusResponse, ControllerError>;
    async fn fetch_server_info(&self) -> Result<ServerInfoResponse, ControllerError>;
    async fn fetch_settings(&self) -> Result<SettingsResponse, ControllerError>;
    async fn update_settings(
        &self,
        settings: &BackendSettings,
    ) -> Result<MessageResponse, ControllerError>;
}

pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ControllerError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| ControllerError::transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ControllerError> {
        self.base_url
            .join(path)
            .map_err(|err| ControllerError::transport(format!("invalid endpoint {path}: {err}")))
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, ControllerError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|err| ControllerError::validation(format!("invalid backend url '{raw}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ControllerError::validation(format!(
            "backend url must start with http:// or https://, got '{raw}'"
        )));
    }
    Ok(url)
}

/// Treats non-2xx results and undecodable bodies as transport failures.
async fn decode_json<T: DeserializeOwned>(res: Response) -> Result<T, ControllerError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiError>(&body)
            .ok()
            .map(|err| err.message)
            .filter(|message| !message.is_empty());
        return Err(ControllerError::transport(match detail {
            Some(message) => format!("HTTP {status}: {message}"),
            None => format!("HTTP {status}"),
        }));
    }

    let body = res.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|err| ControllerError::transport(format!("malformed response body: {err}")))
}

#[async_trait]
impl RobotBackend for HttpBackend {
    async fn submit_commands(&self, commands: &str) -> Result<CommandResponse, ControllerError> {
        let url = self.endpoint(COMMAND_PATH)?;
        debug!(%url, bytes = commands.len(), "backend: submitting command batch");
        let res = self
            .http
            .post(url)
            .json(&CommandRequest {
                commands: commands.to_string(),
            })
            .send()
            .await?;
        decode_json(res).await
    }

    async fn fetch_status(&self) -> Result<StatusResponse, ControllerError> {
        let url = self.endpoint(STATUS_PATH)?;
        let res = self.http.get(url).send().await?;
        decode_json(res).await
    }

    async fn fetch_server_info(&self) -> Result<ServerInfoResponse, ControllerError> {
        let url = self.endpoint(SERVER_INFO_PATH)?;
        let res = self.http.get(url).send().await?;
        decode_json(res).await
    }

    async fn fetch_settings(&self) -> Result<SettingsResponse, ControllerError> {
        let url = self.endpoint(SETTINGS_PATH)?;
        let res = self.http.get(url).send().await?;
        decode_json(res).await
    }

    async fn update_settings(
        &self,
        settings: &BackendSettings,
    ) -> Result<MessageResponse, ControllerError> {
        let url = self.endpoint(SETTINGS_PATH)?;
        let res = self.http.post(url).json(settings).send().await?;
        decode_json(res).await
    }
}
