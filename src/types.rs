use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ID types for type safety
pub type SessionId = String;
pub type GameCode = String;
pub type TeamId = String;
pub type PlayerId = String;
pub type QuestionId = String;

pub const TEAM_A: &str = "A";
pub const TEAM_B: &str = "B";

/// Number of questions in a Fast Money round
pub const FAST_MONEY_QUESTIONS: usize = 5;
/// Survey share of a single answer, in percent
pub const MAX_FREQUENCY: u32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Lobby open, game not started
    Waiting,
    /// Round started, board empty, waiting for the host to load a question
    Clock,
    /// Question on the board, answers being taken
    Playing,
    RoundEnd,
    FastMoney,
    GameOver,
    Paused,
}

impl SessionStatus {
    /// Started and not yet over (the "active" band of the lifecycle)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::Clock
                | SessionStatus::Playing
                | SessionStatus::RoundEnd
                | SessionStatus::FastMoney
        )
    }

    /// Lobby is open for new players
    pub fn accepts_players(&self) -> bool {
        matches!(self, SessionStatus::Waiting | SessionStatus::Clock)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Waiting => "waiting",
            SessionStatus::Clock => "clock",
            SessionStatus::Playing => "playing",
            SessionStatus::RoundEnd => "round-end",
            SessionStatus::FastMoney => "fast-money",
            SessionStatus::GameOver => "game-over",
            SessionStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Strict,
    #[default]
    Fuzzy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub frequency: u32,
}

impl Answer {
    pub fn new(text: impl Into<String>, frequency: u32) -> Self {
        Self {
            text: text.into(),
            frequency,
        }
    }
}

impl Question {
    /// Whether the question can go on a board: it has answers and every
    /// frequency is a survey share
    pub fn is_playable(&self) -> bool {
        !self.answers.is_empty()
            && self.answers.iter().all(|a| a.frequency <= MAX_FREQUENCY)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "isFastMoney", alias = "is_fast_money")]
    pub is_fast_money: bool,
}

/// What clients see of a question before its answers are revealed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub text: String,
    pub category: Option<String>,
    pub answer_count: usize,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            category: q.category.clone(),
            answer_count: q.answers.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RevealedAnswer {
    pub text: String,
    pub frequency: u32,
    /// Position of the answer on the board (0 = most popular)
    pub slot: usize,
    pub revealed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub score: u32,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub team_id: TeamId,
    pub joined_at: String,
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamConfig {
    pub name: String,
    pub color: String,
}

/// Per-session rules, fixed once the session exists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameSettings {
    pub max_strikes: u32,
    pub round_duration_seconds: u32,
    pub round_multipliers: Vec<u32>,
    pub max_rounds: u32,
    pub fast_money_target: u32,
    pub fast_money_bonus: u32,
    pub match_mode: MatchMode,
    pub teams: [TeamConfig; 2],
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            max_strikes: 3,
            round_duration_seconds: 20,
            round_multipliers: vec![1, 2, 3],
            max_rounds: 3,
            fast_money_target: 200,
            fast_money_bonus: 100,
            match_mode: MatchMode::Fuzzy,
            teams: [
                TeamConfig {
                    name: "Team A".to_string(),
                    color: "#d62828".to_string(),
                },
                TeamConfig {
                    name: "Team B".to_string(),
                    color: "#1d4ed8".to_string(),
                },
            ],
        }
    }
}

impl GameSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_strikes == 0 {
            return Err("max_strikes must be at least 1".to_string());
        }
        if self.max_rounds == 0 {
            return Err("max_rounds must be at least 1".to_string());
        }
        if self.round_duration_seconds == 0 {
            return Err("round_duration_seconds must be at least 1".to_string());
        }
        if self.round_multipliers.is_empty() || self.round_multipliers.contains(&0) {
            return Err("round_multipliers must be non-empty and positive".to_string());
        }
        if self.teams.iter().any(|t| t.name.trim().is_empty()) {
            return Err("team names cannot be empty".to_string());
        }
        Ok(())
    }

    /// Multiplier for a 1-based round number; rounds past the end of the
    /// table reuse its last entry
    pub fn multiplier_for_round(&self, round: u32) -> u32 {
        let idx = (round.max(1) as usize).min(self.round_multipliers.len()) - 1;
        self.round_multipliers[idx]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Winner {
    Team { team_id: TeamId, name: String },
    Tie,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FastMoneyEntry {
    pub question_index: usize,
    pub submitted_text: String,
    pub matched_text: Option<String>,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FastMoneyResults {
    pub player1_total: u32,
    pub player2_total: u32,
    pub total: u32,
    pub target: u32,
    pub target_reached: bool,
    pub bonus: u32,
    /// Team that received the bonus; None when the target was missed or the
    /// teams were level
    pub awarded_to: Option<TeamId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TeamCounts {
    pub a: usize,
    pub b: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
    Audience,
}
