//! Fast Money bonus round

use std::collections::HashSet;

use super::{AppState, FastMoneyState, Session};
use crate::error::{GameError, GameResult};
use crate::matcher::match_answer;
use crate::protocol::ServerMessage;
use crate::questions::fetch_with_timeout;
use crate::types::*;

impl Session {
    fn check_can_start_fast_money(&self) -> GameResult<()> {
        self.require_status(
            "start fast money",
            &[SessionStatus::RoundEnd, SessionStatus::GameOver],
        )
    }

    /// Enter the bonus round with exactly five unused Fast Money questions
    pub fn start_fast_money(&mut self, questions: Vec<Question>) -> GameResult<Vec<String>> {
        self.check_can_start_fast_money()?;

        let mut ids = HashSet::new();
        let valid = questions.len() == FAST_MONEY_QUESTIONS
            && questions.iter().all(|q| {
                q.is_fast_money
                    && q.is_playable()
                    && !self.used_question_ids.contains(&q.id)
                    && ids.insert(q.id.clone())
            });
        if !valid {
            return Err(GameError::NoQuestionsAvailable);
        }

        if self.timer.stop() {
            self.emit_timer(false);
        }
        self.used_question_ids.extend(ids);
        self.current_question = None;
        self.clear_round();
        self.winner = None;
        self.status = SessionStatus::FastMoney;

        let texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();
        self.fast_money = Some(FastMoneyState {
            questions,
            player1: Vec::new(),
            player2: Vec::new(),
            results: None,
        });

        let board = self.board();
        self.emit(ServerMessage::FastMoneyStarted {
            questions: texts.clone(),
            board,
        });
        Ok(texts)
    }

    /// Record one player's answer to one question. Each (player, question)
    /// pair can be answered once.
    pub fn submit_fast_money_answer(
        &mut self,
        player_number: u8,
        question_index: usize,
        text: &str,
    ) -> GameResult<FastMoneyEntry> {
        if self.status != SessionStatus::FastMoney {
            return Err(GameError::NotInFastMoneyMode);
        }
        let fm = self.fast_money.as_mut().ok_or(GameError::NotInFastMoneyMode)?;

        if !(1..=2).contains(&player_number) {
            return Err(GameError::InvalidInput(format!(
                "player number must be 1 or 2, got {}",
                player_number
            )));
        }
        let question = fm.questions.get(question_index).ok_or_else(|| {
            GameError::InvalidInput(format!(
                "question index must be below {}, got {}",
                FAST_MONEY_QUESTIONS, question_index
            ))
        })?;
        if fm.results.is_some() {
            return Err(GameError::InvalidInput(
                "fast money results are already settled".to_string(),
            ));
        }
        if fm
            .entries(player_number)
            .iter()
            .any(|e| e.question_index == question_index)
        {
            return Err(GameError::FastMoneyAnswerExists {
                player: player_number,
                index: question_index,
            });
        }

        // Players answer independently, so nothing is excluded
        let matched = match_answer(text, &question.answers, &HashSet::new(), MatchMode::Fuzzy);
        let entry = FastMoneyEntry {
            question_index,
            submitted_text: text.trim().to_string(),
            matched_text: matched.map(|(_, a)| a.text.clone()),
            points: matched.map(|(_, a)| a.frequency).unwrap_or(0),
        };

        if player_number == 1 {
            fm.player1.push(entry.clone());
        } else {
            fm.player2.push(entry.clone());
        }
        let player_total = fm.total(player_number);

        self.emit(ServerMessage::FastMoneyAnswer {
            player_number,
            entry: entry.clone(),
            player_total,
        });
        Ok(entry)
    }

    /// Settle the bonus round.
    ///
    /// If the combined total reaches the target, the bonus goes to the team
    /// leading at that moment; level scores get nothing. The first call
    /// settles, later calls return the same results without paying again.
    pub fn fast_money_results(&mut self) -> GameResult<FastMoneyResults> {
        if self.status != SessionStatus::FastMoney {
            return Err(GameError::NotInFastMoneyMode);
        }
        let fm = self.fast_money.as_ref().ok_or(GameError::NotInFastMoneyMode)?;

        let results = match fm.results.clone() {
            Some(settled) => settled,
            None => {
                let player1_total = fm.total(1);
                let player2_total = fm.total(2);
                let total = player1_total.saturating_add(player2_total);
                let target = self.settings.fast_money_target;
                let target_reached = total >= target;

                let awarded_to = match self.leader() {
                    Winner::Team { team_id, .. } if target_reached => Some(team_id),
                    _ => None,
                };
                if let Some(team_id) = &awarded_to {
                    let idx = self.team_index(team_id)?;
                    let team = &mut self.teams[idx];
                    team.score = team.score.saturating_add(self.settings.fast_money_bonus);
                }

                let results = FastMoneyResults {
                    player1_total,
                    player2_total,
                    total,
                    target,
                    target_reached,
                    bonus: self.settings.fast_money_bonus,
                    awarded_to,
                };
                if let Some(fm) = self.fast_money.as_mut() {
                    fm.results = Some(results.clone());
                }
                results
            }
        };

        let teams = self.teams.to_vec();
        self.emit(ServerMessage::FastMoneyResults {
            results: results.clone(),
            teams,
        });
        self.emit_scores();
        Ok(results)
    }
}

impl AppState {
    pub async fn start_fast_money(&self, key: &str) -> GameResult<Vec<String>> {
        let handle = self.handle(key).await?;
        let (mut exclude, ready) = handle
            .read(|s| (s.used_question_ids.clone(), s.check_can_start_fast_money()))
            .await;
        ready?;

        let mut questions = Vec::with_capacity(FAST_MONEY_QUESTIONS);
        for _ in 0..FAST_MONEY_QUESTIONS {
            let question = fetch_with_timeout(
                self.question_timeout,
                self.questions.get_random_question(&exclude, true),
            )
            .await
            .map_err(|e| {
                tracing::warn!("Fast money question fetch for {} failed: {}", key, e);
                GameError::NoQuestionsAvailable
            })?
            .ok_or(GameError::NoQuestionsAvailable)?;
            exclude.insert(question.id.clone());
            questions.push(question);
        }

        let texts = handle.apply(|s| s.start_fast_money(questions)).await?;
        tracing::info!("Session {} entered fast money", handle.code);
        Ok(texts)
    }

    pub async fn submit_fast_money_answer(
        &self,
        key: &str,
        player_number: u8,
        question_index: usize,
        text: &str,
    ) -> GameResult<FastMoneyEntry> {
        self.with_session(key, |s| {
            s.submit_fast_money_answer(player_number, question_index, text)
        })
        .await
    }

    pub async fn fast_money_results(&self, key: &str) -> GameResult<(FastMoneyResults, Vec<Team>)> {
        let (results, teams) = self
            .with_session(key, |s| {
                let results = s.fast_money_results()?;
                Ok((results, s.teams.to_vec()))
            })
            .await?;
        tracing::info!(
            "Session {} fast money total {} / {} (bonus to {:?})",
            key,
            results.total,
            results.target,
            results.awarded_to
        );
        Ok((results, teams))
    }
}
