use serde::Serialize;

use super::{AppState, Session};
use crate::error::{GameError, GameResult};
use crate::protocol::{ServerMessage, SessionSnapshot};
use crate::types::*;

pub const MIN_PLAYERS: usize = 2;

/// Returned to whoever created the game. The host token is only ever sent here.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedGame {
    pub session_id: SessionId,
    pub code: GameCode,
    pub host_token: String,
    pub state: SessionSnapshot,
}

impl Session {
    pub fn start_game(&mut self, host_id: &str) -> GameResult<()> {
        if host_id != self.host_id {
            return Err(GameError::Unauthorized("start the game"));
        }
        self.require_status("start the game", &[SessionStatus::Waiting])?;

        let connected = self.players.iter().filter(|p| p.connected).count();
        if connected < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                required: MIN_PLAYERS,
                actual: connected,
            });
        }

        self.current_round = 1;
        self.round_multiplier = self.settings.multiplier_for_round(1);
        self.active_team_index = 0;
        self.clear_round();
        self.timer.reset(self.settings.round_duration_seconds);
        self.status = SessionStatus::Clock;

        let board = self.board();
        self.emit(ServerMessage::GameStarted { board });
        Ok(())
    }

    /// Force the game over from any state. Safe to repeat.
    pub fn end_game(&mut self) -> Winner {
        if self.timer.stop() {
            self.emit_timer(false);
        }
        let winner = self.leader();
        self.status = SessionStatus::GameOver;
        self.paused_from = None;
        self.fast_money = None;
        self.current_question = None;
        self.clear_round();
        self.winner = Some(winner.clone());

        let teams = self.teams.to_vec();
        self.emit(ServerMessage::GameEnded {
            winner: winner.clone(),
            teams,
        });
        winner
    }

    pub fn pause(&mut self) -> GameResult<()> {
        if !self.status.is_active() {
            return Err(GameError::InvalidPhase {
                action: "pause",
                status: self.status,
            });
        }
        if self.timer.stop() {
            self.emit_timer(false);
        }
        self.paused_from = Some(self.status);
        self.status = SessionStatus::Paused;

        let board = self.board();
        self.emit(ServerMessage::StatusUpdate { board });
        Ok(())
    }

    /// Restore the status the game was paused from. The timer stays stopped.
    pub fn resume(&mut self) -> GameResult<()> {
        self.require_status("resume", &[SessionStatus::Paused])?;
        self.status = self.paused_from.take().unwrap_or(SessionStatus::Clock);

        let board = self.board();
        self.emit(ServerMessage::StatusUpdate { board });
        Ok(())
    }
}

impl AppState {
    /// Create a new session in the lobby
    pub async fn create_game(
        &self,
        host_id: String,
        settings: GameSettings,
    ) -> GameResult<CreatedGame> {
        if host_id.trim().is_empty() {
            return Err(GameError::InvalidInput("host id cannot be empty".to_string()));
        }
        let handle = self.insert_session(host_id.clone(), settings).await?;
        let created = handle
            .read(|s| CreatedGame {
                session_id: s.id.clone(),
                code: s.code.clone(),
                host_token: s.host_token.clone(),
                state: s.snapshot(),
            })
            .await;

        tracing::info!(
            "Created session {} (code {}) for host {}",
            created.session_id,
            created.code,
            host_id
        );
        Ok(created)
    }

    pub async fn start_game(&self, key: &str, host_id: &str) -> GameResult<SessionStatus> {
        let status = self
            .with_session(key, |s| {
                s.start_game(host_id)?;
                Ok(s.status)
            })
            .await?;
        tracing::info!("Session {} started", key);
        Ok(status)
    }

    pub async fn end_game(&self, key: &str) -> GameResult<(Winner, Vec<Team>)> {
        let handle = self.handle(key).await?;
        let result = handle
            .apply(|s| {
                let winner = s.end_game();
                Ok((winner, s.teams.to_vec()))
            })
            .await?;
        self.timers.cancel(&handle.id);
        tracing::info!("Session {} ended: {:?}", handle.code, result.0);
        Ok(result)
    }

    pub async fn pause_game(&self, key: &str) -> GameResult<()> {
        let handle = self.handle(key).await?;
        handle.apply(|s| s.pause()).await?;
        self.timers.cancel(&handle.id);
        tracing::info!("Session {} paused", handle.code);
        Ok(())
    }

    pub async fn resume_game(&self, key: &str) -> GameResult<SessionStatus> {
        let status = self
            .with_session(key, |s| {
                s.resume()?;
                Ok(s.status)
            })
            .await?;
        tracing::info!("Session {} resumed to {}", key, status);
        Ok(status)
    }

    pub async fn snapshot(&self, key: &str) -> GameResult<SessionSnapshot> {
        Ok(self.handle(key).await?.read(|s| s.snapshot()).await)
    }
}
