//! Countdown clock
//!
//! [`Countdown`] is the per-session clock state. It knows nothing about game
//! rules; it only counts down. [`Timers`] owns the background tasks that
//! drive each running countdown, one task per session at most.
//!
//! Every countdown run carries a generation number. `start`, `stop`, `reset`
//! and expiry all bump it, and a tick is only applied when the generation it
//! was scheduled for is still current. Because ticks are applied under the
//! same session lock as `stop`, no tick can land after `stop` returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const TICK: Duration = Duration::from_secs(1);

/// A stopped countdown charges the second in progress once at least this
/// much of it has elapsed
const PARTIAL_SECOND_CHARGE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Countdown {
    pub remaining_seconds: u32,
    pub running: bool,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    last_tick_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The run this tick belonged to was stopped, reset or replaced
    Stale,
    Ticked { remaining: u32, expired: bool },
}

impl Countdown {
    pub fn new(duration_seconds: u32) -> Self {
        Self {
            remaining_seconds: duration_seconds,
            running: false,
            generation: 0,
            last_tick_at: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Begin a fresh run, replacing any run in progress
    pub fn start(&mut self, duration_seconds: u32) -> u64 {
        self.generation += 1;
        self.remaining_seconds = duration_seconds;
        self.running = duration_seconds > 0;
        self.last_tick_at = Some(Instant::now());
        self.generation
    }

    /// Continue a stopped countdown from its preserved value
    pub fn resume(&mut self) -> Option<u64> {
        if self.running || self.remaining_seconds == 0 {
            return None;
        }
        self.generation += 1;
        self.running = true;
        self.last_tick_at = Some(Instant::now());
        Some(self.generation)
    }

    /// Returns false if the countdown was not running
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let partial = self
            .last_tick_at
            .map(|at| at.elapsed())
            .unwrap_or_default();
        if partial >= PARTIAL_SECOND_CHARGE {
            self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        }
        self.running = false;
        self.generation += 1;
        self.last_tick_at = None;
        true
    }

    pub fn reset(&mut self, duration_seconds: u32) {
        self.generation += 1;
        self.running = false;
        self.remaining_seconds = duration_seconds;
        self.last_tick_at = None;
    }

    /// Apply one elapsed second for the given run
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if !self.running || generation != self.generation {
            return TickOutcome::Stale;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        self.last_tick_at = Some(Instant::now());

        let expired = self.remaining_seconds == 0;
        if expired {
            self.running = false;
            self.generation += 1;
            self.last_tick_at = None;
        }
        TickOutcome::Ticked {
            remaining: self.remaining_seconds,
            expired,
        }
    }
}

/// Background countdown tasks, keyed by session
#[derive(Default)]
pub struct Timers {
    tasks: Mutex<HashMap<String, (u64, JoinHandle<()>)>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a driver for countdown run `generation` that calls `on_tick`
    /// once per second until it returns false.
    ///
    /// A driver for an older run is aborted. If a newer run already has a
    /// driver, the new one is dropped instead, so the order in which
    /// concurrent commands reach this point does not matter.
    pub fn spawn<F, Fut>(&self, session_id: &str, generation: u64, mut on_tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            loop {
                interval.tick().await;
                if !on_tick().await {
                    break;
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.get(session_id) {
            Some((current, _)) if *current > generation => task.abort(),
            _ => {
                if let Some((_, old)) = tasks.insert(session_id.to_string(), (generation, task)) {
                    old.abort();
                }
            }
        }
    }

    /// Abort the driver for a session. Returns true if one existed.
    pub fn cancel(&self, session_id: &str) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        match tasks.remove(session_id) {
            Some((_, task)) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|_, (_, task)| !task.is_finished());
        tasks.len()
    }
}
