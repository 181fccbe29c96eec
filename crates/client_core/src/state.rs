//! Connection state record rendered by presentation.

use shared::domain::RobotStatusSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub connected: bool,
    pub loading: bool,
    pub error_message: Option<String>,
    pub data: RobotStatusSnapshot,
}

impl ConnectionState {
    pub fn connecting() -> Self {
        Self {
            connected: false,
            loading: false,
            error_message: None,
            data: RobotStatusSnapshot::connecting(),
        }
    }
}

/// Backend calls that hold `loading` while outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    Dispatch,
    FirstTick,
    Refresh,
}

/// Single-writer owner of the [`ConnectionState`].
///
/// `loading` is derived from the attempts currently outstanding, so a dispatch
/// finishing cannot clear the loading flag of a poll tick or of another
/// dispatch that is still in flight. Dispatches and refreshes are counted since
/// callers may overlap them; at most one session exists, so its first tick is a flag.
#[derive(Debug)]
pub(crate) struct StateModel {
    current: ConnectionState,
    dispatches_in_flight: usize,
    refreshes_in_flight: usize,
    first_tick_in_flight: bool,
}

impl StateModel {
    pub(crate) fn new() -> Self {
        Self {
            current: ConnectionState::connecting(),
            dispatches_in_flight: 0,
            refreshes_in_flight: 0,
            first_tick_in_flight: false,
        }
    }

    pub(crate) fn view(&self) -> &ConnectionState {
        &self.current
    }

    /// Records one attempt starting (`true`) or finishing (`false`).
    /// Returns whether `loading` changed.
    pub(crate) fn set_in_flight(&mut self, attempt: Attempt, in_flight: bool) -> bool {
        match attempt {
            Attempt::Dispatch => adjust(&mut self.dispatches_in_flight, in_flight),
            Attempt::Refresh => adjust(&mut self.refreshes_in_flight, in_flight),
            Attempt::FirstTick => self.first_tick_in_flight = in_flight,
        }
        let loading = self.dispatches_in_flight > 0
            || self.refreshes_in_flight > 0
            || self.first_tick_in_flight;
        let changed = self.current.loading != loading;
        self.current.loading = loading;
        changed
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: RobotStatusSnapshot) {
        self.current.connected = true;
        self.current.error_message = None;
        self.current.data = snapshot;
    }

    pub(crate) fn apply_failure(&mut self, message: impl Into<String>) {
        self.current.connected = false;
        self.current.error_message = Some(message.into());
        self.current.data = RobotStatusSnapshot::failed();
    }
}

fn adjust(count: &mut usize, in_flight: bool) {
    *count = if in_flight {
        count.saturating_add(1)
    } else {
        count.saturating_sub(1)
    };
}
