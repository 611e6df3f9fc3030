use super::{AppState, Session};
use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::types::*;

const MAX_NAME_CHARS: usize = 32;

impl Session {
    /// Add a player to a team while the lobby is open
    pub fn register_player(&mut self, name: &str, team_id: &str) -> GameResult<Player> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GameError::InvalidInput("name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(GameError::InvalidInput(format!(
                "name is longer than {} characters",
                MAX_NAME_CHARS
            )));
        }
        let team_idx = self.team_index(team_id)?;
        if !self.status.accepts_players() {
            return Err(GameError::InvalidPhase {
                action: "join",
                status: self.status,
            });
        }

        let player = Player {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            team_id: self.teams[team_idx].id.clone(),
            joined_at: chrono::Utc::now().to_rfc3339(),
            connected: true,
        };
        self.players.push(player.clone());

        let team_counts = self.team_counts();
        self.emit(ServerMessage::PlayerJoined {
            player: player.clone(),
            team_counts,
        });
        Ok(player)
    }

    /// Mark a player inactive. Repeating it is a no-op.
    pub fn disconnect_player(&mut self, player_id: &str) -> GameResult<()> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))?;
        if !player.connected {
            return Ok(());
        }
        player.connected = false;

        let team_counts = self.team_counts();
        self.emit(ServerMessage::PlayerLeft {
            player_id: player_id.to_string(),
            team_counts,
        });
        Ok(())
    }

    /// Host connection dropped: pause a game in progress
    pub fn host_disconnected(&mut self) -> bool {
        self.status.is_active() && self.pause().is_ok()
    }
}

impl AppState {
    pub async fn register_player(
        &self,
        key: &str,
        name: &str,
        team_id: &str,
    ) -> GameResult<(Player, TeamCounts)> {
        let (player, counts) = self
            .with_session(key, |s| {
                let player = s.register_player(name, team_id)?;
                Ok((player, s.team_counts()))
            })
            .await?;
        tracing::info!(
            "Player {} ({}) joined team {} in {}",
            player.name,
            player.id,
            player.team_id,
            key
        );
        Ok((player, counts))
    }

    /// Team a registered player belongs to
    pub async fn player_team(&self, key: &str, player_id: &str) -> GameResult<TeamId> {
        self.handle(key)
            .await?
            .read(|s| {
                s.players
                    .iter()
                    .find(|p| p.id == player_id)
                    .map(|p| p.team_id.clone())
                    .ok_or_else(|| GameError::PlayerNotFound(player_id.to_string()))
            })
            .await
    }

    /// Best-effort cleanup when a connection goes away
    pub async fn handle_disconnect(&self, key: &str, role: Role, player_id: Option<&str>) {
        let result = match (role, player_id) {
            (Role::Host, _) => self
                .with_session(key, |s| Ok(s.host_disconnected()))
                .await
                .map(|paused| {
                    if paused {
                        tracing::info!("Host left session {}, game paused", key);
                    }
                }),
            (Role::Player, Some(id)) => {
                self.with_session(key, |s| s.disconnect_player(id)).await
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            tracing::debug!("Disconnect cleanup for {} skipped: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::session::test_support::*;
    use super::*;

    #[test]
    fn test_register_player() {
        let mut session = session_with_players();
        let player = session.register_player("  Carol ", TEAM_A).unwrap();
        assert_eq!(player.name, "Carol");
        assert_eq!(player.team_id, TEAM_A);
        assert_eq!(session.team_counts(), TeamCounts { a: 2, b: 1 });
    }

    #[test]
    fn test_register_validates_input() {
        let mut session = session_with_players();
        assert_eq!(
            session.register_player("   ", TEAM_A).unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            session.register_player("Dan", "Z").unwrap_err().code(),
            "INVALID_TEAM"
        );
        let long = "x".repeat(MAX_NAME_CHARS + 1);
        assert_eq!(
            session.register_player(&long, TEAM_A).unwrap_err().code(),
            "INVALID_INPUT"
        );
    }

    #[test]
    fn test_lobby_closes_once_board_is_live() {
        let mut session = playing_session();
        assert_eq!(
            session.register_player("Late", TEAM_A).unwrap_err().code(),
            "INVALID_PHASE"
        );
    }

    #[test]
    fn test_disconnect_player() {
        let mut session = session_with_players();
        let id = session.players[0].id.clone();
        session.take_events();

        session.disconnect_player(&id).unwrap();
        assert!(!session.players[0].connected);
        assert_eq!(session.team_counts(), TeamCounts { a: 0, b: 1 });
        assert_eq!(session.take_events().len(), 1);

        // Second disconnect is silent
        session.disconnect_player(&id).unwrap();
        assert!(session.take_events().is_empty());

        assert_eq!(
            session.disconnect_player("ghost").unwrap_err().code(),
            "PLAYER_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_player_team_lookup() {
        let state = AppState::new(std::sync::Arc::new(
            crate::questions::InMemoryQuestionStore::seeded().unwrap(),
        ));
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();
        let (bob, counts) = state
            .register_player(&created.code, "Bob", TEAM_B)
            .await
            .unwrap();
        assert_eq!(counts, TeamCounts { a: 0, b: 1 });

        assert_eq!(
            state.player_team(&created.code, &bob.id).await.unwrap(),
            TEAM_B
        );
        assert_eq!(
            state
                .player_team(&created.code, "ghost")
                .await
                .unwrap_err()
                .code(),
            "PLAYER_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_disconnect_broadcasts_player_left() {
        let state = AppState::new(std::sync::Arc::new(
            crate::questions::InMemoryQuestionStore::seeded().unwrap(),
        ));
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();
        let (alice, _) = state
            .register_player(&created.code, "Alice", TEAM_A)
            .await
            .unwrap();
        let mut rx = state.subscribe(&created.code).await.unwrap();

        state
            .handle_disconnect(&created.session_id, Role::Player, Some(&alice.id))
            .await;

        match rx.recv().await.unwrap() {
            ServerMessage::PlayerLeft {
                player_id,
                team_counts,
            } => {
                assert_eq!(player_id, alice.id);
                assert_eq!(team_counts.a, 0);
            }
            other => panic!("Expected PlayerLeft, got {:?}", other),
        }
    }

    #[test]
    fn test_host_disconnect_pauses_live_game() {
        let mut session = playing_session();
        assert!(session.host_disconnected());
        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.paused_from, Some(SessionStatus::Playing));

        let mut lobby = session_with_players();
        assert!(!lobby.host_disconnected());
        assert_eq!(lobby.status, SessionStatus::Waiting);
    }
}
