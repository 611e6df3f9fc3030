//! Round rules: loading questions, taking answers, strikes and turn control

use serde::Serialize;
use std::collections::HashSet;

use super::{AppState, Session};
use crate::error::{GameError, GameResult};
use crate::matcher::{calculate_points, match_answer};
use crate::protocol::{RoundInfo, RoundSummary, ServerMessage};
use crate::questions::fetch_with_timeout;
use crate::types::*;

const MAX_ANSWER_CHARS: usize = 200;

/// Result of one answer submission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub answer: Option<RevealedAnswer>,
    pub points: u32,
    /// Strike count reached by this submission (before any reset on switch)
    pub strikes: u32,
    pub team_switched: bool,
    pub round_complete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextRound {
    Round(RoundInfo),
    GameOver(Winner),
}

impl Session {
    fn check_can_load(&self) -> GameResult<()> {
        self.require_status(
            "load a question",
            &[SessionStatus::Clock, SessionStatus::Playing],
        )
    }

    /// Put a question on the board for the current round.
    ///
    /// The question is snapshotted, so later edits to the bank do not reach
    /// a round in progress.
    pub fn load_question(
        &mut self,
        question: Question,
        multiplier: Option<u32>,
    ) -> GameResult<(PublicQuestion, RoundInfo)> {
        self.check_can_load()?;
        if multiplier == Some(0) {
            return Err(GameError::InvalidInput(
                "multiplier must be at least 1".to_string(),
            ));
        }
        if question.is_fast_money {
            return Err(GameError::InvalidInput(format!(
                "question {} is reserved for fast money",
                question.id
            )));
        }
        if !question.is_playable() {
            return Err(GameError::InvalidInput(format!(
                "question {} needs answers with frequencies up to {}",
                question.id, MAX_FREQUENCY
            )));
        }

        self.used_question_ids.insert(question.id.clone());
        self.round_multiplier =
            multiplier.unwrap_or_else(|| self.settings.multiplier_for_round(self.current_round));
        self.clear_round();
        let public = PublicQuestion::from(&question);
        self.current_question = Some(question);
        self.status = SessionStatus::Playing;

        let round = self.round_info();
        let board = self.board();
        self.emit(ServerMessage::QuestionLoaded {
            question: public.clone(),
            round,
            board,
        });
        Ok((public, round))
    }

    /// Take one answer from a team.
    ///
    /// A match reveals the answer and scores `frequency * multiplier` for the
    /// submitting team. A miss is a strike against the team in control; at
    /// the cap control passes to the other team and strikes reset. Naming an
    /// answer that is already on the board is rejected without a strike.
    pub fn submit_answer(
        &mut self,
        text: &str,
        team_id: &str,
        mode: Option<MatchMode>,
    ) -> GameResult<AnswerOutcome> {
        if text.chars().count() > MAX_ANSWER_CHARS {
            return Err(GameError::InvalidInput(format!(
                "answer is longer than {} characters",
                MAX_ANSWER_CHARS
            )));
        }
        let team_idx = self.team_index(team_id)?;
        let question = self
            .current_question
            .as_ref()
            .ok_or(GameError::NoActiveQuestion)?;
        self.require_status("submit answers", &[SessionStatus::Playing])?;

        let mode = mode.unwrap_or(self.settings.match_mode);
        let revealed = self.revealed_texts();

        let hit = match_answer(text, &question.answers, &revealed, mode)
            .map(|(slot, answer)| (slot, answer.clone()));

        match hit {
            Some((slot, answer)) => Ok(self.reveal(slot, answer, team_idx)),
            None => {
                if let Some((_, dup)) = match_answer(text, &question.answers, &HashSet::new(), mode)
                {
                    return Err(GameError::AlreadyRevealed(dup.text.clone()));
                }
                Ok(self.strike(text))
            }
        }
    }

    fn reveal(&mut self, slot: usize, answer: Answer, team_idx: usize) -> AnswerOutcome {
        let points = calculate_points(answer.frequency, self.round_multiplier);
        let revealed = RevealedAnswer {
            text: answer.text,
            frequency: answer.frequency,
            slot,
            revealed_at: chrono::Utc::now().to_rfc3339(),
        };
        self.revealed_answers.push(revealed.clone());
        self.teams[team_idx].score = self.teams[team_idx].score.saturating_add(points);
        self.round_points[team_idx] = self.round_points[team_idx].saturating_add(points);

        let team_id = self.teams[team_idx].id.clone();
        let board = self.board();
        self.emit(ServerMessage::AnswerRevealed {
            answer: revealed.clone(),
            points,
            team_id,
            board,
        });
        self.emit_scores();

        let total = self
            .current_question
            .as_ref()
            .map(|q| q.answers.len())
            .unwrap_or_default();
        let round_complete = self.revealed_answers.len() == total;
        if round_complete {
            self.complete_round();
        }

        AnswerOutcome {
            correct: true,
            answer: Some(revealed),
            points,
            strikes: self.strikes,
            team_switched: false,
            round_complete,
        }
    }

    fn strike(&mut self, text: &str) -> AnswerOutcome {
        self.strikes += 1;
        let reached = self.strikes;
        let team_switched = self.strikes >= self.settings.max_strikes;
        if team_switched {
            self.active_team_index = 1 - self.active_team_index;
            self.strikes = 0;
        }

        let board = self.board();
        self.emit(ServerMessage::AnswerWrong {
            text: text.trim().to_string(),
            strikes: reached,
            max_strikes: self.settings.max_strikes,
            team_switched,
            board,
        });
        if team_switched {
            self.emit_team_switched();
        }

        AnswerOutcome {
            correct: false,
            answer: None,
            points: 0,
            strikes: reached,
            team_switched,
            round_complete: false,
        }
    }

    fn emit_team_switched(&mut self) {
        let team_id = self.active_team().id.clone();
        let board = self.board();
        self.emit(ServerMessage::TeamSwitched {
            active_team_index: self.active_team_index,
            team_id,
            board,
        });
    }

    /// Host override: hand control to the other team
    pub fn switch_team(&mut self) -> GameResult<usize> {
        self.require_status(
            "switch teams",
            &[SessionStatus::Clock, SessionStatus::Playing],
        )?;
        self.active_team_index = 1 - self.active_team_index;
        self.strikes = 0;
        self.emit_team_switched();
        Ok(self.active_team_index)
    }

    /// Host override: close the round whether or not the board is cleared
    pub fn end_round(&mut self) -> GameResult<RoundSummary> {
        self.require_status(
            "end the round",
            &[SessionStatus::Clock, SessionStatus::Playing],
        )?;
        Ok(self.complete_round())
    }

    /// Move to `round-end`, publish the full board and drop the question
    fn complete_round(&mut self) -> RoundSummary {
        if self.timer.stop() {
            self.emit_timer(false);
        }
        let summary = RoundSummary {
            round: self.round_info(),
            question: self.current_question.as_ref().map(PublicQuestion::from),
            answers: self
                .current_question
                .as_ref()
                .map(|q| q.answers.clone())
                .unwrap_or_default(),
            revealed_count: self.revealed_answers.len(),
            round_points: self.round_points,
            teams: self.teams.to_vec(),
        };

        self.status = SessionStatus::RoundEnd;
        self.current_question = None;
        self.revealed_answers.clear();
        self.strikes = 0;

        let board = self.board();
        self.emit(ServerMessage::RoundCompleted {
            summary: summary.clone(),
            board,
        });
        summary
    }

    /// Advance to the next round, or finish the game after the last one
    pub fn next_round(&mut self) -> GameResult<NextRound> {
        self.require_status("start the next round", &[SessionStatus::RoundEnd])?;

        if self.current_round >= self.settings.max_rounds {
            return Ok(NextRound::GameOver(self.end_game()));
        }

        self.current_round += 1;
        self.round_multiplier = self.settings.multiplier_for_round(self.current_round);
        self.current_question = None;
        self.clear_round();
        self.timer.reset(self.settings.round_duration_seconds);
        self.status = SessionStatus::Clock;

        self.emit_timer(false);
        let board = self.board();
        self.emit(ServerMessage::StatusUpdate { board });
        Ok(NextRound::Round(self.round_info()))
    }
}

impl AppState {
    /// Fetch a question from the bank and put it on the board.
    ///
    /// The bounded fetch runs outside the session lock so other commands keep
    /// flowing. A question claimed by a concurrent load in the meantime is
    /// rejected at commit.
    pub async fn load_question(
        &self,
        key: &str,
        question_id: Option<&str>,
        multiplier: Option<u32>,
    ) -> GameResult<(PublicQuestion, RoundInfo)> {
        let handle = self.handle(key).await?;
        let (used, can_load) = handle
            .read(|s| (s.used_question_ids.clone(), s.check_can_load()))
            .await;
        can_load?;

        let question = match question_id {
            Some(id) => {
                let q = fetch_with_timeout(
                    self.question_timeout,
                    self.questions.get_question_by_id(id),
                )
                .await
                .map_err(|e| {
                    tracing::warn!("Question lookup for {} failed: {}", id, e);
                    GameError::NoQuestionsAvailable
                })?
                .ok_or_else(|| GameError::InvalidInput(format!("unknown question {}", id)))?;
                if used.contains(&q.id) {
                    return Err(GameError::InvalidInput(format!(
                        "question {} was already played",
                        id
                    )));
                }
                q
            }
            None => fetch_with_timeout(
                self.question_timeout,
                self.questions.get_random_question(&used, false),
            )
            .await
            .map_err(|e| {
                tracing::warn!("Question fetch for {} failed: {}", key, e);
                GameError::NoQuestionsAvailable
            })?
            .ok_or(GameError::NoQuestionsAvailable)?,
        };

        let question_id = question.id.clone();
        let result = handle
            .apply(|s| {
                // Another command may have claimed it while we were fetching
                if s.used_question_ids.contains(&question_id) {
                    return Err(GameError::NoQuestionsAvailable);
                }
                s.load_question(question, multiplier)
            })
            .await?;

        tracing::info!(
            "Session {} round {} loaded question {} (x{})",
            handle.code,
            result.1.number,
            question_id,
            result.1.multiplier
        );
        Ok(result)
    }

    pub async fn submit_answer(
        &self,
        key: &str,
        text: &str,
        team_id: &str,
        mode: Option<MatchMode>,
    ) -> GameResult<AnswerOutcome> {
        let outcome = self
            .with_session(key, |s| s.submit_answer(text, team_id, mode))
            .await?;
        tracing::debug!(
            "Session {} team {} answered {:?}: correct={} points={} strikes={}",
            key,
            team_id,
            text,
            outcome.correct,
            outcome.points,
            outcome.strikes
        );
        Ok(outcome)
    }

    pub async fn switch_team(&self, key: &str) -> GameResult<usize> {
        self.with_session(key, |s| s.switch_team()).await
    }

    pub async fn end_round(&self, key: &str) -> GameResult<RoundSummary> {
        let summary = self.with_session(key, |s| s.end_round()).await?;
        tracing::info!("Session {} round {} ended", key, summary.round.number);
        Ok(summary)
    }

    pub async fn next_round(&self, key: &str) -> GameResult<NextRound> {
        let handle = self.handle(key).await?;
        let next = handle.apply(|s| s.next_round()).await?;
        if let NextRound::GameOver(winner) = &next {
            self.timers.cancel(&handle.id);
            tracing::info!("Session {} finished after last round: {:?}", handle.code, winner);
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::super::session::test_support::*;
    use super::*;
    use crate::questions::InMemoryQuestionStore;
    use std::sync::Arc;

    #[test]
    fn test_load_question_resets_round_state() {
        let mut session = playing_session();
        session.submit_answer("tacos", TEAM_A, None).unwrap();
        session.submit_answer("pizza", TEAM_A, None).unwrap();

        let mut next = snack_question();
        next.id = "other".to_string();
        session.load_question(next, None).unwrap();

        assert!(session.revealed_answers.is_empty());
        assert_eq!(session.strikes, 0);
        assert_eq!(session.status, SessionStatus::Playing);
        assert!(session.used_question_ids.contains("snacks"));
        assert!(session.used_question_ids.contains("other"));
    }

    #[test]
    fn test_load_requires_started_game() {
        let mut session = session_with_players();
        assert_eq!(
            session
                .load_question(snack_question(), None)
                .unwrap_err()
                .code(),
            "INVALID_PHASE"
        );
    }

    #[test]
    fn test_correct_answer_scores_frequency_times_multiplier() {
        let mut session = playing_session();
        let outcome = session.submit_answer("pizza", TEAM_A, None).unwrap();

        assert!(outcome.correct);
        assert_eq!(outcome.points, 34);
        assert_eq!(outcome.answer.as_ref().unwrap().text, "Pizza");
        assert_eq!(session.teams[0].score, 34);
        assert_eq!(session.revealed_answers.len(), 1);
        assert_eq!(session.revealed_answers[0].text, "Pizza");
        assert_eq!(session.revealed_answers[0].slot, 0);
    }

    #[test]
    fn test_multiplier_override() {
        let mut session = session_with_players();
        session.start_game("host").unwrap();
        let mut q = snack_question();
        q.answers[0].frequency = 20;
        session.load_question(q, Some(3)).unwrap();

        let outcome = session.submit_answer("pizza", TEAM_B, None).unwrap();
        assert_eq!(outcome.points, 60);
        assert_eq!(session.teams[1].score, 60);
    }

    #[test]
    fn test_round_table_multiplier() {
        let mut session = session_with_players();
        session.start_game("host").unwrap();
        session.current_round = 3;
        session.load_question(snack_question(), None).unwrap();
        assert_eq!(session.round_multiplier, 3);
    }

    #[test]
    fn test_three_strikes_switch_control() {
        let mut session = playing_session();
        assert_eq!(session.active_team_index, 0);

        let first = session.submit_answer("Tacos", TEAM_A, None).unwrap();
        assert_eq!((first.strikes, first.team_switched), (1, false));
        let second = session.submit_answer("Soup", TEAM_A, None).unwrap();
        assert_eq!((second.strikes, second.team_switched), (2, false));
        let third = session.submit_answer("Cereal", TEAM_A, None).unwrap();
        assert_eq!((third.strikes, third.team_switched), (3, true));

        assert_eq!(session.active_team_index, 1);
        assert_eq!(session.strikes, 0);
    }

    #[test]
    fn test_strikes_never_exceed_cap() {
        let mut session = playing_session();
        let mut switches = 0;
        for i in 0..10 {
            let outcome = session
                .submit_answer(&format!("wrong {}", i), TEAM_A, None)
                .unwrap();
            assert!(session.strikes <= session.settings.max_strikes);
            assert!(outcome.strikes <= session.settings.max_strikes);
            if outcome.team_switched {
                switches += 1;
            }
        }
        assert_eq!(switches, 3);
        assert_eq!(session.active_team_index, 1);
        assert_eq!(session.strikes, 1);
    }

    #[test]
    fn test_repeat_answer_neither_scores_nor_strikes() {
        let mut session = playing_session();
        session.submit_answer("pizza", TEAM_A, None).unwrap();

        let err = session.submit_answer("Pizza!", TEAM_B, None).unwrap_err();
        assert_eq!(err, GameError::AlreadyRevealed("Pizza".to_string()));
        assert_eq!(session.teams[0].score, 34);
        assert_eq!(session.teams[1].score, 0);
        assert_eq!(session.strikes, 0);
        assert_eq!(session.revealed_answers.len(), 1);
    }

    #[test]
    fn test_blank_answer_is_a_strike() {
        let mut session = playing_session();
        let outcome = session.submit_answer("   ", TEAM_A, None).unwrap();
        assert!(!outcome.correct);
        assert_eq!(session.strikes, 1);
    }

    #[test]
    fn test_strict_mode_per_submission() {
        let mut session = playing_session();
        let outcome = session
            .submit_answer("cream", TEAM_A, Some(MatchMode::Strict))
            .unwrap();
        assert!(!outcome.correct);

        let outcome = session.submit_answer("cream", TEAM_A, None).unwrap();
        assert!(outcome.correct);
        assert_eq!(outcome.answer.unwrap().text, "Ice Cream");
    }

    #[test]
    fn test_clearing_board_ends_round() {
        let mut session = playing_session();
        session.submit_answer("pizza", TEAM_A, None).unwrap();
        session.submit_answer("chips", TEAM_A, None).unwrap();
        let last = session.submit_answer("ice cream", TEAM_B, None).unwrap();

        assert!(last.round_complete);
        assert_eq!(session.status, SessionStatus::RoundEnd);
        assert!(session.current_question.is_none());

        let events = session.take_events();
        let summary = events
            .iter()
            .find_map(|e| match e {
                ServerMessage::RoundCompleted { summary, .. } => Some(summary.clone()),
                _ => None,
            })
            .expect("RoundCompleted event");
        assert_eq!(summary.revealed_count, 3);
        assert_eq!(summary.round_points, [62, 22]);
        assert_eq!(summary.answers.len(), 3);
    }

    #[test]
    fn test_answers_rejected_after_round_end() {
        let mut session = playing_session();
        session.end_round().unwrap();
        assert_eq!(
            session.submit_answer("pizza", TEAM_A, None).unwrap_err(),
            GameError::NoActiveQuestion
        );
    }

    #[test]
    fn test_unknown_team_rejected_before_anything_changes() {
        let mut session = playing_session();
        assert_eq!(
            session.submit_answer("pizza", "C", None).unwrap_err(),
            GameError::InvalidTeam("C".to_string())
        );
        assert!(session.revealed_answers.is_empty());
    }

    #[test]
    fn test_switch_team_resets_strikes() {
        let mut session = playing_session();
        session.submit_answer("tacos", TEAM_A, None).unwrap();
        assert_eq!(session.switch_team().unwrap(), 1);
        assert_eq!(session.strikes, 0);
    }

    #[test]
    fn test_next_round_advances_then_finishes() {
        let mut session = playing_session();
        session.end_round().unwrap();

        assert_eq!(
            session.next_round().unwrap(),
            NextRound::Round(RoundInfo {
                number: 2,
                multiplier: 2
            })
        );
        assert_eq!(session.status, SessionStatus::Clock);
        assert_eq!(session.timer.remaining_seconds, 20);

        session.end_round().unwrap();
        session.next_round().unwrap();
        session.end_round().unwrap();
        assert_eq!(session.current_round, 3);

        assert_eq!(session.next_round().unwrap(), NextRound::GameOver(Winner::Tie));
        assert_eq!(session.status, SessionStatus::GameOver);
    }

    #[test]
    fn test_next_round_requires_round_end() {
        let mut session = playing_session();
        assert_eq!(session.next_round().unwrap_err().code(), "INVALID_PHASE");
    }

    #[test]
    fn test_scores_never_decrease() {
        let mut session = playing_session();
        let mut last = [0u32; 2];
        for text in ["tacos", "pizza", "soup", "chips", "cereal", "nope", "cream"] {
            let _ = session.submit_answer(text, TEAM_A, None);
            let _ = session.submit_answer(text, TEAM_B, None);
            let now = [session.teams[0].score, session.teams[1].score];
            assert!(now[0] >= last[0] && now[1] >= last[1]);
            last = now;
        }
    }

    #[test]
    fn test_fast_money_question_stays_off_the_board() {
        let mut session = session_with_players();
        session.start_game("host").unwrap();

        let fm = fast_money_question("fm-fruit", &[("Apple", 40)]);
        assert_eq!(
            session.load_question(fm, None).unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert!(session.used_question_ids.is_empty());
        assert_eq!(session.status, SessionStatus::Clock);
    }

    #[tokio::test]
    async fn test_load_by_id_refuses_fast_money_pool() {
        let state = AppState::new(Arc::new(InMemoryQuestionStore::seeded().unwrap()));
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();
        state
            .register_player(&created.code, "Alice", TEAM_A)
            .await
            .unwrap();
        state
            .register_player(&created.code, "Bob", TEAM_B)
            .await
            .unwrap();
        state.start_game(&created.code, "host").await.unwrap();

        let err = state
            .load_question(&created.code, Some("fm-fruit"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let session = state.get_session(&created.code).await.unwrap();
        assert!(session.used_question_ids.is_empty());
        assert!(session.current_question.is_none());

        let (question, _) = state
            .load_question(&created.code, Some("pet-names"), None)
            .await
            .unwrap();
        assert_eq!(question.id, "pet-names");
    }

    #[test]
    fn test_frequency_above_hundred_rejected() {
        let mut session = session_with_players();
        session.start_game("host").unwrap();

        let mut huge = snack_question();
        huge.answers = vec![
            Answer::new("Alpha", 3_000_000_000),
            Answer::new("Beta", 3_000_000_000),
        ];
        assert_eq!(
            session.load_question(huge, None).unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert!(session.current_question.is_none());
    }

    #[test]
    fn test_score_saturates_instead_of_wrapping() {
        let mut session = playing_session();
        session.teams[0].score = u32::MAX - 10;

        let outcome = session.submit_answer("pizza", TEAM_A, None).unwrap();
        assert_eq!(outcome.points, 34);
        assert_eq!(session.teams[0].score, u32::MAX);

        session.submit_answer("chips", TEAM_A, None).unwrap();
        assert_eq!(session.teams[0].score, u32::MAX);
    }
}
