/*!
 * Barrier
 *
 * Cyclic barrier for a fixed number of parties.
 *
 * # State Machine
 *
 * ```text
 * Filling --last arrival--> Draining --last exit--> Filling
 * Filling | Draining | Broken --reset()--> Resetting --last exit--> Filling
 * any --abort()--> Broken
 * ```
 *
 * Two events coordinate the phases: `waiting` releases tasks parked in
 * the barrier, `blocking` holds back new arrivals while a cycle drains
 * or resets.
 */

use super::cancel::Cx;
use super::event::Event;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Callback run by the releasing task once a cycle fills
pub type BarrierAction = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Barrier phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierState {
    Filling,
    Draining,
    Resetting,
    Broken,
}

impl BarrierState {
    /// Numeric code used in diagnostics
    #[inline]
    pub const fn code(self) -> i8 {
        match self {
            BarrierState::Filling => 0,
            BarrierState::Draining => 1,
            BarrierState::Resetting => -1,
            BarrierState::Broken => -2,
        }
    }
}

#[derive(Debug)]
struct Phase {
    state: BarrierState,
    count: usize,
}

/// Cyclic barrier
pub struct Barrier {
    parties: usize,
    phase: Mutex<Phase>,
    action: Mutex<Option<BarrierAction>>,
    waiting: Event,
    blocking: Event,
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = self.phase.lock();
        let wait = if self.waiting.is_set() { "set" } else { "unset" };
        let block = if self.blocking.is_set() { "set" } else { "unset" };
        write!(
            f,
            "Barrier [{}, count:{}/{}, {}, state:{}]",
            wait,
            phase.count,
            self.parties,
            block,
            phase.state.code()
        )
    }
}

impl Barrier {
    /// Create a barrier for `parties` tasks
    pub fn new(parties: usize) -> SyncResult<Self> {
        if parties < 1 {
            return Err(SyncError::InvalidArgument("parties must be > 0".to_string()));
        }
        Ok(Self {
            parties,
            phase: Mutex::new(Phase {
                state: BarrierState::Filling,
                count: 0,
            }),
            action: Mutex::new(None),
            waiting: Event::new(),
            blocking: Event::new(),
        })
    }

    /// Create a barrier whose `action` runs once per cycle, before release
    ///
    /// The action must not call back into the barrier.
    pub fn with_action<F>(parties: usize, action: F) -> SyncResult<Self>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        let barrier = Self::new(parties)?;
        *barrier.action.lock() = Some(Box::new(action));
        Ok(barrier)
    }

    /// Wait until every party has arrived
    ///
    /// Returns this task's arrival index in `0..parties`.
    pub async fn wait(&self, cx: &Cx) -> SyncResult<usize> {
        self.block(cx).await?;

        let index = {
            let mut phase = self.phase.lock();
            let index = phase.count;
            phase.count += 1;
            index
        };
        let _exit = Departure { barrier: self };

        if index + 1 == self.parties {
            self.release()?;
        } else {
            self.wait_released(cx).await?;
        }
        Ok(index)
    }

    /// Hold new arrivals while the barrier drains or resets
    async fn block(&self, cx: &Cx) -> SyncResult<()> {
        loop {
            let state = self.phase.lock().state;
            match state {
                BarrierState::Draining | BarrierState::Resetting => {
                    self.blocking.wait(cx).await?;
                }
                BarrierState::Broken => return Err(SyncError::BrokenBarrier),
                BarrierState::Filling => return Ok(()),
            }
        }
    }

    /// Run the action and open the barrier
    fn release(&self) -> SyncResult<()> {
        let outcome = match self.action.lock().as_mut() {
            Some(action) => action(),
            None => Ok(()),
        };

        if let Err(err) = outcome {
            tracing::warn!(error = %err, "Barrier action failed, aborting barrier");
            self.abort();
            return Err(SyncError::ActionFailed(format!("{:#}", err)));
        }

        let mut phase = self.phase.lock();
        phase.state = BarrierState::Draining;
        self.blocking.clear();
        self.waiting.set();
        Ok(())
    }

    async fn wait_released(&self, cx: &Cx) -> SyncResult<()> {
        self.waiting.wait(cx).await?;
        match self.phase.lock().state {
            BarrierState::Resetting | BarrierState::Broken => Err(SyncError::BrokenBarrier),
            _ => Ok(()),
        }
    }

    /// Return to the initial state
    ///
    /// Tasks currently inside fail with [`SyncError::BrokenBarrier`]; the
    /// last one out completes the reset.
    pub fn reset(&self) {
        let mut phase = self.phase.lock();
        if phase.count > 0 {
            phase.state = BarrierState::Resetting;
            self.waiting.set();
            self.blocking.clear();
        } else {
            phase.state = BarrierState::Filling;
        }
        tracing::debug!(count = phase.count, "Barrier reset");
    }

    /// Break the barrier; current and future waiters fail until `reset()`
    pub fn abort(&self) {
        let mut phase = self.phase.lock();
        phase.state = BarrierState::Broken;
        self.waiting.set();
        self.blocking.clear();
    }

    #[inline]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Tasks parked in the current cycle; zero unless filling
    pub fn n_waiting(&self) -> usize {
        let phase = self.phase.lock();
        match phase.state {
            BarrierState::Filling => phase.count,
            _ => 0,
        }
    }

    #[inline]
    pub fn broken(&self) -> bool {
        self.phase.lock().state == BarrierState::Broken
    }

    #[inline]
    pub fn state(&self) -> BarrierState {
        self.phase.lock().state
    }
}

/// Exit bookkeeping for a task that entered the barrier
struct Departure<'a> {
    barrier: &'a Barrier,
}

impl Drop for Departure<'_> {
    fn drop(&mut self) {
        let barrier = self.barrier;
        let mut phase = barrier.phase.lock();
        phase.count -= 1;
        if phase.count == 0 {
            if matches!(phase.state, BarrierState::Draining | BarrierState::Resetting) {
                phase.state = BarrierState::Filling;
            }
            barrier.waiting.clear();
            barrier.blocking.set();
        }
    }
}
