use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use shared::{
    domain::{RobotStatusSnapshot, SessionId},
    protocol::{BackendSettings, StatusResponse},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

mod dispatcher;
pub mod error;
pub mod log_sink;
mod poller;
pub mod settings;
pub mod state;
pub mod transport;
pub mod types;

pub use error::ControllerError;
pub use log_sink::LogEntry;
use log_sink::LogSink;
pub use settings::{ControllerSettings, LogRetention};
pub use state::ConnectionState;
pub use transport::{HttpBackend, RobotBackend};
pub use types::{
    ControllerEvent, DispatchOutcome, Notice, NoticeLevel, SessionEndReason,
};

use poller::PollingSession;
use state::{Attempt, StateModel};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Client-side controller mediating between operator commands and the motion backend.
///
/// Owns the connection state, the operator log and at most one polling session.
/// All mutation goes through [`RobotController::lock_inner`], which is never held
/// across an `.await`.
pub struct RobotController {
    backend: Arc<dyn RobotBackend>,
    settings: ControllerSettings,
    inner: Mutex<ControllerInner>,
    last_session_id: AtomicU64,
    events: broadcast::Sender<ControllerEvent>,
}

struct ControllerInner {
    state: StateModel,
    log: LogSink,
    session: Option<PollingSession>,
}

impl RobotController {
    pub fn new(settings: ControllerSettings) -> Result<Arc<Self>, ControllerError> {
        let backend = HttpBackend::new(&settings.backend_url, settings.request_timeout)?;
        Ok(Self::with_backend(settings, Arc::new(backend)))
    }

    pub fn with_backend(settings: ControllerSettings, backend: Arc<dyn RobotBackend>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let log = LogSink::new(settings.log_display_limit, settings.log_retention);
        Arc::new(Self {
            backend,
            settings,
            inner: Mutex::new(ControllerInner {
                state: StateModel::new(),
                log,
                session: None,
            }),
            last_session_id: AtomicU64::new(0),
            events,
        })
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state.view().clone()
    }

    /// Log entries presentation should render, most recent first.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.lock_inner().log.visible()
    }

    pub fn log_len(&self) -> usize {
        self.lock_inner().log.len()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.lock_inner().session.as_ref().map(PollingSession::id)
    }

    pub fn is_polling(&self) -> bool {
        self.active_session().is_some()
    }

    /// Single status query outside any polling session.
    pub async fn refresh_status(&self) -> Result<RobotStatusSnapshot, ControllerError> {
        let _loading = self.begin_attempt(Attempt::Refresh);
        let result = self
            .backend
            .fetch_status()
            .await
            .and_then(snapshot_from_status);

        let mut inner = self.lock_inner();
        match &result {
            Ok(snapshot) => {
                inner.state.apply_snapshot(snapshot.clone());
                self.publish_state(&inner);
            }
            Err(err) => {
                inner.state.apply_failure(err.message());
                self.publish_state(&inner);
                self.append_log(&mut inner, format!("Status query failed: {}", err.message()));
                warn!(error = %err, "status: refresh failed");
            }
        }
        result
    }

    /// Link other devices can open to reach the backend, for QR sharing.
    pub async fn share_url(&self) -> Result<String, ControllerError> {
        let info = self.backend.fetch_server_info().await?;
        if !info.status.is_success() {
            return Err(ControllerError::backend(
                info.message
                    .unwrap_or_else(|| "server info request was rejected".to_string()),
            ));
        }
        match (info.ip, info.port) {
            (Some(ip), Some(port)) => Ok(format!("http://{ip}:{port}/")),
            _ => Err(ControllerError::backend(
                "server info response is missing ip or port",
            )),
        }
    }

    pub async fn fetch_backend_settings(&self) -> Result<BackendSettings, ControllerError> {
        let result = self.backend.fetch_settings().await.and_then(|response| {
            if !response.status.is_success() {
                return Err(ControllerError::backend(
                    response
                        .message
                        .unwrap_or_else(|| "settings request was rejected".to_string()),
                ));
            }
            response
                .settings
                .ok_or_else(|| ControllerError::backend("settings response is missing settings"))
        });

        match &result {
            Ok(_) => {
                {
                    let mut inner = self.lock_inner();
                    self.append_log(&mut inner, "Loaded backend settings");
                }
                self.notify(NoticeLevel::Info, "Loaded backend settings");
            }
            Err(err) => self.report_failure(format!("Failed to load backend settings: {}", err.message())),
        }
        result
    }

    pub async fn update_backend_settings(
        &self,
        settings: &BackendSettings,
    ) -> Result<String, ControllerError> {
        let result = self
            .backend
            .update_settings(settings)
            .await
            .and_then(|response| {
                if response.status.is_success() {
                    Ok(response.message)
                } else {
                    Err(ControllerError::backend(response.message))
                }
            });

        match &result {
            Ok(message) => {
                let text = if message.is_empty() {
                    "Backend settings saved".to_string()
                } else {
                    format!("Backend settings saved: {message}")
                };
                {
                    let mut inner = self.lock_inner();
                    self.append_log(&mut inner, text.clone());
                }
                self.notify(NoticeLevel::Success, text);
            }
            Err(err) => self.report_failure(format!("Failed to save backend settings: {}", err.message())),
        }
        result
    }

    fn lock_inner(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_session_id(&self) -> SessionId {
        SessionId(self.last_session_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn begin_attempt(&self, attempt: Attempt) -> InFlightGuard<'_> {
        let mut inner = self.lock_inner();
        if inner.state.set_in_flight(attempt, true) {
            self.publish_state(&inner);
        }
        InFlightGuard {
            controller: self,
            attempt,
        }
    }

    fn append_log(&self, inner: &mut ControllerInner, text: impl Into<String>) {
        let entry = inner.log.push(text);
        info!(target: "robot_console::log", "{}", entry.text);
        let _ = self.events.send(ControllerEvent::LogAppended(entry));
    }

    fn publish_state(&self, inner: &ControllerInner) {
        let _ = self
            .events
            .send(ControllerEvent::StateChanged(inner.state.view().clone()));
    }

    fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let _ = self.events.send(ControllerEvent::Notice(Notice {
            level,
            message: message.into(),
        }));
    }

    fn report_failure(&self, text: String) {
        {
            let mut inner = self.lock_inner();
            self.append_log(&mut inner, text.clone());
        }
        warn!("{text}");
        self.notify(NoticeLevel::Error, text);
    }
}

/// Clears the attempt's share of `loading` on every exit path, including cancellation.
struct InFlightGuard<'a> {
    controller: &'a RobotController,
    attempt: Attempt,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.controller.lock_inner();
        if inner.state.set_in_flight(self.attempt, false) {
            self.controller.publish_state(&inner);
        }
    }
}

fn snapshot_from_status(response: StatusResponse) -> Result<RobotStatusSnapshot, ControllerError> {
    if !response.status.is_success() {
        return Err(ControllerError::backend(response.message.unwrap_or_else(|| {
            format!("status query reported {:?}", response.status).to_ascii_lowercase()
        })));
    }
    response
        .robot_status
        .ok_or_else(|| ControllerError::backend("status response is missing robot_status"))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
