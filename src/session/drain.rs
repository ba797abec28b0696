//! Drain mode
//!
//! While drain mode is on, the owning session is not allowed to stop until
//! every task is closed. Other sessions are never held back.

use anyhow::Result;

use super::store::{Session, SessionStore};
use crate::domain::{RemainingWork, Task, TaskLifecycle, TaskRepository};

/// Whether a session may stop
#[derive(Debug, Clone, PartialEq)]
pub enum StopDecision {
    /// Nothing holds the caller back
    Allow,
    /// The active task must be finished first
    BlockActive(Task),
    /// This many open tasks remain
    BlockOpen(usize),
}

/// Outcome of turning drain mode off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainRelease {
    Released,
    /// Work remains, drain mode stays on
    Refused { active: usize, open: usize },
}

/// Decides whether `caller` may stop given the session and remaining work
///
/// Blocks only the recorded owner, only while draining, and only while an
/// active or open task remains. An active task takes precedence over the
/// open count.
pub fn decide(session: &Session, caller: &str, work: &RemainingWork) -> StopDecision {
    if !session.is_owned_by(caller) || !session.drain_active {
        return StopDecision::Allow;
    }

    match &work.active {
        Some(task) => StopDecision::BlockActive(task.clone()),
        None if work.open > 0 => StopDecision::BlockOpen(work.open),
        None => StopDecision::Allow,
    }
}

/// Coordinates the session record with the task store
pub struct DrainCoordinator<R> {
    sessions: SessionStore,
    lifecycle: TaskLifecycle<R>,
}

impl<R: TaskRepository> DrainCoordinator<R> {
    pub fn new(sessions: SessionStore, lifecycle: TaskLifecycle<R>) -> Self {
        Self {
            sessions,
            lifecycle,
        }
    }

    /// Termination check for the stop hook
    ///
    /// Tasks are only read when the caller owns a draining session.
    pub fn check_termination(&self, caller: &str) -> Result<StopDecision> {
        let session = match self.sessions.load()? {
            Some(session) => session,
            None => return Ok(StopDecision::Allow),
        };

        if !session.is_owned_by(caller) || !session.drain_active {
            return Ok(StopDecision::Allow);
        }

        let work = self.lifecycle.remaining_work()?;
        Ok(decide(&session, caller, &work))
    }

    /// Turns drain mode on for the recorded owner
    ///
    /// Fails with `SessionError::NoSession` when nobody has claimed the store.
    pub fn activate(&self) -> Result<()> {
        let session = self.sessions.require()?;
        self.sessions.set_drain_active(&session.session_id, true)?;
        Ok(())
    }

    /// Turns drain mode off unless active or open tasks remain
    pub fn release(&self) -> Result<DrainRelease> {
        let session = self.sessions.require()?;

        let work = self.lifecycle.remaining_work()?;
        if !work.is_empty() {
            return Ok(DrainRelease::Refused {
                active: usize::from(work.active.is_some()),
                open: work.open,
            });
        }

        self.sessions.set_drain_active(&session.session_id, false)?;
        Ok(DrainRelease::Released)
    }
}
