//! Command dispatch: submits one operator batch and decides whether to monitor motion.

use std::sync::Arc;

use shared::{error::ResponseStatus, protocol::CommandResponse};
use tracing::{info, warn};

use crate::{
    state::Attempt, ControllerError, DispatchOutcome, InFlightGuard, NoticeLevel,
    RobotController, SessionEndReason,
};

const EMPTY_COMMAND_MESSAGE: &str = "command text must not be empty";
const SUMMARY_PREVIEW_CHARS: usize = 120;

impl RobotController {
    /// Submits `text` as a single batch.
    ///
    /// Any active polling session is torn down before the request is sent. When
    /// the backend reports that motion started, a fresh session is started once
    /// the response has been fully applied. Failures have already been folded
    /// into the connection state and log when an error is returned.
    pub async fn dispatch(self: &Arc<Self>, text: &str) -> Result<DispatchOutcome, ControllerError> {
        if text.trim().is_empty() {
            let err = ControllerError::validation(EMPTY_COMMAND_MESSAGE);
            self.notify(NoticeLevel::Warning, err.message());
            return Err(err);
        }

        let _loading = self.begin_dispatch(text);
        match self.backend.submit_commands(text).await {
            Ok(response) => self.apply_command_response(response),
            Err(err) => {
                self.apply_dispatch_failure(&err);
                Err(err)
            }
        }
    }

    fn begin_dispatch(&self, text: &str) -> InFlightGuard<'_> {
        let guard = self.begin_attempt(Attempt::Dispatch);
        let mut inner = self.lock_inner();
        if let Some(session) = inner.session.take() {
            let session_id = session.id();
            self.end_session(&mut inner, session, SessionEndReason::Superseded);
            self.append_log(
                &mut inner,
                format!("Monitoring stopped (session {session_id}): new command submitted"),
            );
        }
        self.append_log(&mut inner, summarize_batch(text));
        guard
    }

    fn apply_command_response(
        self: &Arc<Self>,
        response: CommandResponse,
    ) -> Result<DispatchOutcome, ControllerError> {
        let mut inner = self.lock_inner();
        for result in response.detailed_results.iter().flatten() {
            self.append_log(
                &mut inner,
                format!(
                    "> \"{}\": {} ({})",
                    result.command, result.message, result.status
                ),
            );
        }

        if let Some(snapshot) = response.robot_status {
            inner.state.apply_snapshot(snapshot);
            self.publish_state(&inner);
        }

        match response.status {
            ResponseStatus::Success if response.motion_started => {
                let interval = self.settings.poll_interval;
                let session_id = self.start_session(&mut inner, interval);
                drop(inner);
                info!(session_id = session_id.0, "dispatch: motion started, monitoring");
                self.notify(
                    NoticeLevel::Info,
                    format!(
                        "Motion started; monitoring robot status every {} ms",
                        interval.as_millis()
                    ),
                );
                Ok(DispatchOutcome::MonitoringStarted(session_id))
            }
            ResponseStatus::Success => {
                drop(inner);
                self.notify(
                    NoticeLevel::Success,
                    response.message.unwrap_or_else(|| {
                        "Command completed without starting monitored motion".to_string()
                    }),
                );
                Ok(DispatchOutcome::Completed)
            }
            ResponseStatus::Error | ResponseStatus::Unknown => {
                let message = response
                    .message
                    .unwrap_or_else(|| "command batch was rejected".to_string());
                self.append_log(&mut inner, format!("Command batch failed: {message}"));
                drop(inner);
                warn!(%message, "dispatch: backend rejected command batch");
                self.notify(NoticeLevel::Error, message.clone());
                Err(ControllerError::backend(message))
            }
        }
    }

    fn apply_dispatch_failure(&self, err: &ControllerError) {
        {
            let mut inner = self.lock_inner();
            inner.state.apply_failure(err.message());
            self.publish_state(&inner);
            self.append_log(
                &mut inner,
                format!("Command submission failed: {}", err.message()),
            );
        }
        warn!(error = %err, "dispatch: command submission failed");
        self.notify(NoticeLevel::Error, format!("Command failed: {}", err.message()));
    }
}

fn summarize_batch(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let noun = if lines.len() == 1 { "command" } else { "commands" };
    let joined = lines.join(" | ");
    let preview = if joined.chars().count() > SUMMARY_PREVIEW_CHARS {
        let cut: String = joined.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        joined
    };
    format!("Sending {} {noun}: {preview}", lines.len())
}
