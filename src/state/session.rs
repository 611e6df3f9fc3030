//! The session aggregate: one game's complete truth

use std::collections::HashSet;
use tokio::time::Instant;

use crate::error::{GameError, GameResult};
use crate::protocol::{BoardView, FastMoneyView, RoundInfo, ServerMessage, SessionSnapshot};
use crate::timer::Countdown;
use crate::types::*;

/// Fast Money bookkeeping, present only while the bonus round runs
#[derive(Debug, Clone, PartialEq)]
pub struct FastMoneyState {
    pub questions: Vec<Question>,
    pub player1: Vec<FastMoneyEntry>,
    pub player2: Vec<FastMoneyEntry>,
    /// Set once the bonus has been settled so recalculation never pays twice
    pub results: Option<FastMoneyResults>,
}

impl FastMoneyState {
    pub fn entries(&self, player_number: u8) -> &[FastMoneyEntry] {
        if player_number == 1 {
            &self.player1
        } else {
            &self.player2
        }
    }

    pub fn total(&self, player_number: u8) -> u32 {
        self.entries(player_number)
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.points))
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub code: GameCode,
    pub host_id: String,
    pub host_token: String,
    pub status: SessionStatus,
    /// Status to return to when a paused game resumes
    pub paused_from: Option<SessionStatus>,
    pub teams: [Team; 2],
    pub players: Vec<Player>,
    pub current_round: u32,
    pub round_multiplier: u32,
    pub current_question: Option<Question>,
    pub revealed_answers: Vec<RevealedAnswer>,
    pub strikes: u32,
    pub active_team_index: usize,
    pub round_points: [u32; 2],
    pub timer: Countdown,
    pub settings: GameSettings,
    pub used_question_ids: HashSet<QuestionId>,
    pub fast_money: Option<FastMoneyState>,
    pub winner: Option<Winner>,
    pub created_at: String,
    pub last_activity: Instant,
    outbox: Vec<ServerMessage>,
}

impl Session {
    pub fn new(
        id: SessionId,
        code: GameCode,
        host_id: String,
        settings: GameSettings,
    ) -> GameResult<Self> {
        settings.validate().map_err(GameError::InvalidSettings)?;

        let make_team = |id: &str, idx: usize| Team {
            id: id.to_string(),
            name: settings.teams[idx].name.trim().to_string(),
            score: 0,
            color: settings.teams[idx].color.clone(),
        };

        Ok(Self {
            id,
            code,
            host_id,
            host_token: ulid::Ulid::new().to_string(),
            status: SessionStatus::Waiting,
            paused_from: None,
            teams: [make_team(TEAM_A, 0), make_team(TEAM_B, 1)],
            players: Vec::new(),
            current_round: 0,
            round_multiplier: settings.multiplier_for_round(1),
            current_question: None,
            revealed_answers: Vec::new(),
            strikes: 0,
            active_team_index: 0,
            round_points: [0, 0],
            timer: Countdown::new(settings.round_duration_seconds),
            settings,
            used_question_ids: HashSet::new(),
            fast_money: None,
            winner: None,
            created_at: chrono::Utc::now().to_rfc3339(),
            last_activity: Instant::now(),
            outbox: Vec::new(),
        })
    }

    /// Queue an event for delivery once the current command commits
    pub fn emit(&mut self, msg: ServerMessage) {
        self.outbox.push(msg);
    }

    pub(crate) fn take_events(&mut self) -> Vec<ServerMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn team_index(&self, team_id: &str) -> GameResult<usize> {
        self.teams
            .iter()
            .position(|t| t.id == team_id)
            .ok_or_else(|| GameError::InvalidTeam(team_id.to_string()))
    }

    pub fn active_team(&self) -> &Team {
        &self.teams[self.active_team_index]
    }

    pub fn team_counts(&self) -> TeamCounts {
        let count = |id: &str| {
            self.players
                .iter()
                .filter(|p| p.connected && p.team_id == id)
                .count()
        };
        TeamCounts {
            a: count(TEAM_A),
            b: count(TEAM_B),
        }
    }

    /// Fail unless the session is in one of `allowed`
    pub fn require_status(
        &self,
        action: &'static str,
        allowed: &[SessionStatus],
    ) -> GameResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(GameError::InvalidPhase {
                action,
                status: self.status,
            })
        }
    }

    /// Higher score wins; equal scores tie
    pub fn leader(&self) -> Winner {
        let [a, b] = &self.teams;
        match a.score.cmp(&b.score) {
            std::cmp::Ordering::Greater => Winner::Team {
                team_id: a.id.clone(),
                name: a.name.clone(),
            },
            std::cmp::Ordering::Less => Winner::Team {
                team_id: b.id.clone(),
                name: b.name.clone(),
            },
            std::cmp::Ordering::Equal => Winner::Tie,
        }
    }

    /// Normalized texts already on the board this round
    pub fn revealed_texts(&self) -> HashSet<String> {
        self.revealed_answers
            .iter()
            .map(|a| crate::matcher::normalize(&a.text))
            .collect()
    }

    pub fn round_info(&self) -> RoundInfo {
        RoundInfo {
            number: self.current_round,
            multiplier: self.round_multiplier,
        }
    }

    pub fn board(&self) -> BoardView {
        BoardView {
            session_id: self.id.clone(),
            code: self.code.clone(),
            status: self.status,
            round: self.round_info(),
            max_rounds: self.settings.max_rounds,
            question: self.current_question.as_ref().map(PublicQuestion::from),
            revealed: self.revealed_answers.clone(),
            strikes: self.strikes,
            max_strikes: self.settings.max_strikes,
            active_team_index: self.active_team_index,
            teams: self.teams.to_vec(),
            timer: self.timer.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            board: self.board(),
            players: self.players.clone(),
            team_counts: self.team_counts(),
            settings: self.settings.clone(),
            winner: self.winner.clone(),
            fast_money: self.fast_money.as_ref().map(|fm| FastMoneyView {
                questions: fm.questions.iter().map(PublicQuestion::from).collect(),
                player1: fm.player1.clone(),
                player2: fm.player2.clone(),
                results: fm.results.clone(),
            }),
        }
    }

    /// Clear per-round state ahead of a new question or round
    pub(crate) fn clear_round(&mut self) {
        self.revealed_answers.clear();
        self.strikes = 0;
        self.round_points = [0, 0];
    }

    pub(crate) fn emit_scores(&mut self) {
        let teams = self.teams.to_vec();
        self.emit(ServerMessage::ScoreUpdate { teams });
    }

    pub(crate) fn emit_timer(&mut self, expired: bool) {
        let msg = ServerMessage::TimerUpdate {
            remaining_seconds: self.timer.remaining_seconds,
            running: self.timer.running,
            expired,
        };
        self.emit(msg);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn snack_question() -> Question {
        Question {
            id: "snacks".to_string(),
            text: "Name a popular snack".to_string(),
            answers: vec![
                Answer::new("Pizza", 34),
                Answer::new("Chips", 28),
                Answer::new("Ice Cream", 22),
            ],
            category: Some("food".to_string()),
            is_fast_money: false,
        }
    }

    pub fn fast_money_question(id: &str, answers: &[(&str, u32)]) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Fast money {}", id),
            answers: answers.iter().map(|(t, f)| Answer::new(*t, *f)).collect(),
            category: None,
            is_fast_money: true,
        }
    }

    pub fn session_with_players() -> Session {
        let mut session = Session::new(
            "sess".to_string(),
            "ABC234".to_string(),
            "host".to_string(),
            GameSettings::default(),
        )
        .unwrap();
        session.register_player("Alice", TEAM_A).unwrap();
        session.register_player("Bob", TEAM_B).unwrap();
        session
    }

    /// A session in `playing` with the snack question on the board
    pub fn playing_session() -> Session {
        let mut session = session_with_players();
        session.start_game("host").unwrap();
        session.load_question(snack_question(), None).unwrap();
        session.take_events();
        session
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(
            "id".to_string(),
            "CODE23".to_string(),
            "host".to_string(),
            GameSettings::default(),
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.teams[0].id, TEAM_A);
        assert_eq!(session.teams[1].id, TEAM_B);
        assert_eq!(session.timer.remaining_seconds, 20);
        assert!(!session.host_token.is_empty());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = GameSettings {
            max_strikes: 0,
            ..GameSettings::default()
        };
        let err = Session::new("id".into(), "C".into(), "h".into(), settings).unwrap_err();
        assert_eq!(err.code(), "INVALID_SETTINGS");
    }

    #[test]
    fn test_leader() {
        let mut session = session_with_players();
        assert_eq!(session.leader(), Winner::Tie);
        session.teams[1].score = 10;
        assert!(matches!(session.leader(), Winner::Team { ref team_id, .. } if team_id == TEAM_B));
    }

    #[test]
    fn test_snapshot_hides_unrevealed_answers() {
        let session = playing_session();
        let json = serde_json::to_string(&session.snapshot()).unwrap();
        assert!(json.contains("Name a popular snack"));
        assert!(!json.contains("Chips"));
        assert!(!json.contains(&session.host_token));
    }

    #[test]
    fn test_unknown_team_rejected() {
        let session = session_with_players();
        assert_eq!(
            session.team_index("C").unwrap_err(),
            GameError::InvalidTeam("C".to_string())
        );
    }
}
