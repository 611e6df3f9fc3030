use crate::timer::Countdown;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    RegisterPlayer {
        name: String,
        team_id: TeamId,
    },
    GetState,
    SubmitAnswer {
        text: String,
        team_id: TeamId,
        #[serde(default)]
        mode: Option<MatchMode>,
    },
    SubmitFastMoneyAnswer {
        player_number: u8,
        question_index: usize,
        text: String,
    },
    // Host-only messages
    HostStartGame,
    HostLoadQuestion {
        #[serde(default)]
        question_id: Option<QuestionId>,
        #[serde(default)]
        multiplier: Option<u32>,
    },
    HostSwitchTeam,
    HostEndRound,
    HostNextRound,
    HostStartFastMoney,
    HostFastMoneyResults,
    HostEndGame,
    HostPauseGame,
    HostResumeGame,
    HostTimerStart {
        #[serde(default)]
        duration: Option<u32>,
    },
    HostTimerStop,
    HostTimerResume,
    HostTimerReset {
        #[serde(default)]
        duration: Option<u32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        role: Role,
        server_now: String,
        state: SessionSnapshot,
    },
    GameState {
        state: SessionSnapshot,
    },
    /// Reply to the registering connection
    PlayerRegistered {
        player: Player,
        team_counts: TeamCounts,
    },
    PlayerJoined {
        player: Player,
        team_counts: TeamCounts,
    },
    PlayerLeft {
        player_id: PlayerId,
        team_counts: TeamCounts,
    },
    GameStarted {
        board: BoardView,
    },
    /// Pause/resume and other status-only changes
    StatusUpdate {
        board: BoardView,
    },
    QuestionLoaded {
        question: PublicQuestion,
        round: RoundInfo,
        board: BoardView,
    },
    /// Reply to the submitting connection
    AnswerResult {
        correct: bool,
        answer: Option<RevealedAnswer>,
        points: u32,
        strikes: u32,
        team_switched: bool,
        round_complete: bool,
    },
    AnswerRevealed {
        answer: RevealedAnswer,
        points: u32,
        team_id: TeamId,
        board: BoardView,
    },
    AnswerWrong {
        text: String,
        strikes: u32,
        max_strikes: u32,
        team_switched: bool,
        board: BoardView,
    },
    TeamSwitched {
        active_team_index: usize,
        team_id: TeamId,
        board: BoardView,
    },
    RoundCompleted {
        summary: RoundSummary,
        board: BoardView,
    },
    ScoreUpdate {
        teams: Vec<Team>,
    },
    FastMoneyStarted {
        /// Question texts only, answers withheld
        questions: Vec<String>,
        board: BoardView,
    },
    FastMoneyAnswer {
        player_number: u8,
        entry: FastMoneyEntry,
        player_total: u32,
    },
    FastMoneyResults {
        results: FastMoneyResults,
        teams: Vec<Team>,
    },
    GameEnded {
        winner: Winner,
        teams: Vec<Team>,
    },
    TimerTick {
        remaining_seconds: u32,
    },
    TimerUpdate {
        remaining_seconds: u32,
        running: bool,
        expired: bool,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn error(err: &crate::error::GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoundInfo {
    pub number: u32,
    pub multiplier: u32,
}

/// Everything a passive observer needs to draw the board
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardView {
    pub session_id: SessionId,
    pub code: GameCode,
    pub status: SessionStatus,
    pub round: RoundInfo,
    pub max_rounds: u32,
    pub question: Option<PublicQuestion>,
    pub revealed: Vec<RevealedAnswer>,
    pub strikes: u32,
    pub max_strikes: u32,
    pub active_team_index: usize,
    pub teams: Vec<Team>,
    pub timer: Countdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundSummary {
    pub round: RoundInfo,
    pub question: Option<PublicQuestion>,
    /// Full answer list, now that the round is over
    pub answers: Vec<Answer>,
    pub revealed_count: usize,
    /// Points each team earned this round, indexed like `teams`
    pub round_points: [u32; 2],
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FastMoneyView {
    pub questions: Vec<PublicQuestion>,
    pub player1: Vec<FastMoneyEntry>,
    pub player2: Vec<FastMoneyEntry>,
    pub results: Option<FastMoneyResults>,
}

/// Full session view sent on join and on request. Never carries the host
/// token or unrevealed answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub board: BoardView,
    pub players: Vec<Player>,
    pub team_counts: TeamCounts,
    pub settings: GameSettings,
    pub winner: Option<Winner>,
    pub fast_money: Option<FastMoneyView>,
}
