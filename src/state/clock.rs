//! Countdown commands and the per-second tick

use std::sync::Arc;

use super::{AppState, Session, SessionHandle};
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::timer::{Countdown, TickOutcome};

impl Session {
    fn check_timer_allowed(&self, action: &'static str) -> GameResult<()> {
        if self.status.is_active() {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                action,
                status: self.status,
            })
        }
    }

    /// Start a fresh countdown, replacing any run in progress. Returns the
    /// run's generation for the driver.
    pub fn start_timer(&mut self, duration: Option<u32>) -> GameResult<u64> {
        self.check_timer_allowed("start the timer")?;
        let duration = duration.unwrap_or(self.settings.round_duration_seconds);
        if duration == 0 {
            return Err(GameError::InvalidInput(
                "timer duration must be at least 1 second".to_string(),
            ));
        }
        let generation = self.timer.start(duration);
        self.emit_timer(false);
        Ok(generation)
    }

    /// Stop the countdown, keeping the remaining value. Stopping a stopped
    /// timer changes nothing.
    pub fn stop_timer(&mut self) -> Countdown {
        if self.timer.stop() {
            self.emit_timer(false);
        }
        self.timer.clone()
    }

    pub fn resume_timer(&mut self) -> GameResult<u64> {
        self.check_timer_allowed("resume the timer")?;
        let generation = self.timer.resume().ok_or_else(|| {
            GameError::InvalidInput("timer is already running or has run out".to_string())
        })?;
        self.emit_timer(false);
        Ok(generation)
    }

    pub fn reset_timer(&mut self, duration: Option<u32>) -> Countdown {
        self.timer
            .reset(duration.unwrap_or(self.settings.round_duration_seconds));
        self.emit_timer(false);
        self.timer.clone()
    }

    /// Apply one second of countdown run `generation`. Returns whether the
    /// driver should keep going.
    pub fn apply_tick(&mut self, generation: u64) -> bool {
        match self.timer.tick(generation) {
            TickOutcome::Stale => false,
            TickOutcome::Ticked { remaining, expired } => {
                self.emit(ServerMessage::TimerTick {
                    remaining_seconds: remaining,
                });
                if expired {
                    self.emit_timer(true);
                }
                !expired
            }
        }
    }
}

impl AppState {
    fn spawn_countdown(&self, handle: &Arc<SessionHandle>, generation: u64) {
        let driver = handle.clone();
        self.timers.spawn(&handle.id, generation, move || {
            let driver = driver.clone();
            async move {
                driver
                    .apply(|s| Ok(s.apply_tick(generation)))
                    .await
                    .unwrap_or(false)
            }
        });
    }

    pub async fn start_timer(&self, key: &str, duration: Option<u32>) -> GameResult<Countdown> {
        let handle = self.handle(key).await?;
        let (generation, timer) = handle
            .apply(|s| {
                let generation = s.start_timer(duration)?;
                Ok((generation, s.timer.clone()))
            })
            .await?;
        self.spawn_countdown(&handle, generation);
        tracing::debug!(
            "Session {} timer started at {}s",
            handle.code,
            timer.remaining_seconds
        );
        Ok(timer)
    }

    pub async fn stop_timer(&self, key: &str) -> GameResult<Countdown> {
        let handle = self.handle(key).await?;
        let timer = handle.apply(|s| Ok(s.stop_timer())).await?;
        self.timers.cancel(&handle.id);
        Ok(timer)
    }

    pub async fn resume_timer(&self, key: &str) -> GameResult<Countdown> {
        let handle = self.handle(key).await?;
        let (generation, timer) = handle
            .apply(|s| {
                let generation = s.resume_timer()?;
                Ok((generation, s.timer.clone()))
            })
            .await?;
        self.spawn_countdown(&handle, generation);
        Ok(timer)
    }

    pub async fn reset_timer(&self, key: &str, duration: Option<u32>) -> GameResult<Countdown> {
        let handle = self.handle(key).await?;
        let timer = handle.apply(|s| Ok(s.reset_timer(duration))).await?;
        self.timers.cancel(&handle.id);
        Ok(timer)
    }
}
