//! Status polling sessions.
//!
//! A session is one spawned task ticking at a fixed cadence. Every tick checks
//! that its session is still the controller's current one before touching state,
//! so a response that lands after a stop or restart is dropped.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::{RobotStatusSnapshot, SessionId};
use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    snapshot_from_status, state::Attempt, ControllerError, ControllerEvent, ControllerInner,
    RobotController, SessionEndReason,
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct PollingSession {
    ticket: SessionTicket,
    task: JoinHandle<()>,
}

impl PollingSession {
    pub(crate) fn id(&self) -> SessionId {
        self.ticket.id
    }
}

#[derive(Clone)]
struct SessionTicket {
    id: SessionId,
    alive: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Ended,
}

impl RobotController {
    /// Starts a polling session, replacing any session already running.
    pub fn start_polling(self: &Arc<Self>, interval: Duration) -> SessionId {
        let mut inner = self.lock_inner();
        self.start_session(&mut inner, interval)
    }

    /// Stops the active session. Returns `false` when nothing was running.
    pub fn stop_polling(&self) -> bool {
        let mut inner = self.lock_inner();
        let Some(session) = inner.session.take() else {
            return false;
        };
        let session_id = session.id();
        self.end_session(&mut inner, session, SessionEndReason::Stopped);
        self.append_log(&mut inner, format!("Monitoring stopped (session {session_id})"));
        true
    }

    pub(crate) fn start_session(
        self: &Arc<Self>,
        inner: &mut ControllerInner,
        interval: Duration,
    ) -> SessionId {
        if let Some(previous) = inner.session.take() {
            self.end_session(inner, previous, SessionEndReason::Superseded);
        }

        let interval = interval.max(MIN_POLL_INTERVAL);
        let ticket = SessionTicket {
            id: self.next_session_id(),
            alive: Arc::new(AtomicBool::new(true)),
        };
        let session_id = ticket.id;

        let controller = Arc::clone(self);
        let task_ticket = ticket.clone();
        let task = tokio::spawn(async move {
            controller.run_session(task_ticket, interval).await;
        });
        inner.session = Some(PollingSession { ticket, task });

        self.append_log(
            inner,
            format!(
                "Monitoring started (session {session_id}), polling every {} ms",
                interval.as_millis()
            ),
        );
        info!(
            session_id = session_id.0,
            interval_ms = interval_millis(interval),
            "poller: session started"
        );
        let _ = self.events.send(ControllerEvent::SessionStarted {
            session_id,
            interval,
        });
        session_id
    }

    /// Tears down `session`, which the caller has already taken out of `inner`.
    pub(crate) fn end_session(
        &self,
        inner: &mut ControllerInner,
        session: PollingSession,
        reason: SessionEndReason,
    ) {
        let PollingSession { ticket, task } = session;
        ticket.alive.store(false, Ordering::SeqCst);
        if matches!(reason, SessionEndReason::Stopped | SessionEndReason::Superseded) {
            task.abort();
        }
        if inner.state.set_in_flight(Attempt::FirstTick, false) {
            self.publish_state(inner);
        }
        debug!(session_id = ticket.id.0, ?reason, "poller: session ended");
        let _ = self.events.send(ControllerEvent::SessionEnded {
            session_id: ticket.id,
            reason,
        });
    }

    async fn run_session(self: Arc<Self>, ticket: SessionTicket, interval: Duration) {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first_tick = true;

        loop {
            ticker.tick().await;
            if !self.begin_tick(&ticket, first_tick) {
                break;
            }
            let result = self.backend.fetch_status().await;
            if self.finish_tick(&ticket, first_tick, result.and_then(snapshot_from_status))
                == TickOutcome::Ended
            {
                break;
            }
            first_tick = false;
        }
    }

    fn is_current(inner: &ControllerInner, ticket: &SessionTicket) -> bool {
        ticket.alive.load(Ordering::SeqCst)
            && inner.session.as_ref().map(PollingSession::id) == Some(ticket.id)
    }

    fn begin_tick(&self, ticket: &SessionTicket, first_tick: bool) -> bool {
        let mut inner = self.lock_inner();
        if !Self::is_current(&inner, ticket) {
            return false;
        }
        if first_tick && inner.state.set_in_flight(Attempt::FirstTick, true) {
            self.publish_state(&inner);
        }
        true
    }

    fn finish_tick(
        &self,
        ticket: &SessionTicket,
        first_tick: bool,
        result: Result<RobotStatusSnapshot, ControllerError>,
    ) -> TickOutcome {
        let mut inner = self.lock_inner();
        if !Self::is_current(&inner, ticket) {
            debug!(
                session_id = ticket.id.0,
                "poller: discarding status response from a session that is no longer current"
            );
            return TickOutcome::Ended;
        }
        if first_tick {
            inner.state.set_in_flight(Attempt::FirstTick, false);
        }

        match result {
            Ok(snapshot) => {
                let complete = snapshot.is_motion_complete(&self.settings.stopped_run_status);
                inner.state.apply_snapshot(snapshot);
                self.publish_state(&inner);
                if !complete {
                    return TickOutcome::Continue;
                }
                if let Some(session) = inner.session.take() {
                    self.end_session(&mut inner, session, SessionEndReason::MotionComplete);
                }
                self.append_log(
                    &mut inner,
                    format!("Motion complete; monitoring ended (session {})", ticket.id),
                );
                info!(session_id = ticket.id.0, "poller: stop condition reached");
                TickOutcome::Ended
            }
            Err(err) => {
                inner.state.apply_failure(err.message());
                self.publish_state(&inner);
                if let Some(session) = inner.session.take() {
                    self.end_session(&mut inner, session, SessionEndReason::Failed);
                }
                self.append_log(
                    &mut inner,
                    format!("Status query failed, monitoring stopped: {}", err.message()),
                );
                warn!(session_id = ticket.id.0, error = %err, "poller: status query failed");
                TickOutcome::Ended
            }
        }
    }
}

/// Whole milliseconds in `interval`, saturating at `u64::MAX`.
fn interval_millis(interval: Duration) -> u64 {
    u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)
}
