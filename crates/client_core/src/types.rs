use std::time::Duration;

use shared::domain::SessionId;

use crate::{log_sink::LogEntry, state::ConnectionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient operator notification; presentation decides how long to show it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    MotionComplete,
    Failed,
    Stopped,
    Superseded,
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(ConnectionState),
    LogAppended(LogEntry),
    Notice(Notice),
    SessionStarted {
        session_id: SessionId,
        interval: Duration,
    },
    SessionEnded {
        session_id: SessionId,
        reason: SessionEndReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    MonitoringStarted(SessionId),
    Completed,
}
