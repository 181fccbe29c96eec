//! Plain-text rendering of controller events for the terminal.

use client_core::{ConnectionState, ControllerEvent, LogEntry, Notice, NoticeLevel};
use shared::domain::RobotStatusSnapshot;

/// Turns events into output lines. State lines are only produced when the
/// visible state actually changed, so `loading` flips alone stay quiet.
#[derive(Debug)]
pub struct EventPrinter {
    last_state: Option<ConnectionState>,
}

impl Default for EventPrinter {
    fn default() -> Self {
        Self {
            last_state: Some(ConnectionState::connecting()),
        }
    }
}

impl EventPrinter {
    pub fn render(&mut self, event: &ControllerEvent) -> Option<String> {
        match event {
            ControllerEvent::LogAppended(entry) => Some(format_log_entry(entry)),
            ControllerEvent::Notice(notice) => Some(format_notice(notice)),
            ControllerEvent::StateChanged(state) => {
                let changed = self.last_state.as_ref().map_or(true, |last| {
                    last.connected != state.connected
                        || last.error_message != state.error_message
                        || last.data != state.data
                });
                self.last_state = Some(state.clone());
                changed.then(|| format_state(state))
            }
            // Session boundaries already show up as log entries.
            ControllerEvent::SessionStarted { .. } | ControllerEvent::SessionEnded { .. } => None,
        }
    }
}

pub fn format_log_entry(entry: &LogEntry) -> String {
    format!("[{}] {}", entry.timestamp, entry.text)
}

pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    format!("{tag}: {}", notice.message)
}

pub fn format_state(state: &ConnectionState) -> String {
    if !state.connected {
        return match &state.error_message {
            Some(message) => format!("robot: disconnected ({message})"),
            None => format!("robot: {}", state.data.mode),
        };
    }
    format!("robot: {}", format_snapshot(&state.data))
}

pub fn format_snapshot(snapshot: &RobotStatusSnapshot) -> String {
    let mut line = format!(
        "mode={} run={} alarm={}",
        snapshot.mode, snapshot.run_status, snapshot.alarm_status
    );
    if let Some(code) = snapshot.alarm_code {
        line.push_str(&format!(" code={code}"));
    }
    if let Some(gv0) = snapshot.gv0_value {
        line.push_str(&format!(" gv0={gv0:.2}"));
    }
    let alarms = snapshot.alarms();
    if !alarms.is_empty() {
        let labels: Vec<String> = alarms.iter().map(ToString::to_string).collect();
        line.push_str(&format!(" [{}]", labels.join(", ")));
    }
    line
}
