use async_trait::async_trait;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::path::Path;

use super::{QuestionStore, QuestionStoreError, StoreResult};
use crate::matcher::normalize;
use crate::types::{Answer, Question, QuestionId, MAX_FREQUENCY};

/// Question bank held in memory, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuestionStore {
    questions: Vec<Question>,
}

impl InMemoryQuestionStore {
    pub fn new(questions: Vec<Question>) -> StoreResult<Self> {
        let mut seen = HashSet::new();
        for q in &questions {
            validate_question(q)?;
            if !seen.insert(q.id.clone()) {
                return Err(QuestionStoreError::InvalidQuestion {
                    id: q.id.clone(),
                    reason: "duplicate id".to_string(),
                });
            }
        }
        Ok(Self { questions })
    }

    /// Load a JSON array of questions from disk
    pub fn from_json_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let questions: Vec<Question> = serde_json::from_str(&raw)?;
        let store = Self::new(questions)?;
        tracing::info!(
            "Loaded {} questions ({} fast money) from {}",
            store.questions.len(),
            store.questions.iter().filter(|q| q.is_fast_money).count(),
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Small bank bundled with the binary so a fresh checkout can play
    pub fn seeded() -> StoreResult<Self> {
        let raw = include_str!("../../data/questions.json");
        let questions: Vec<Question> = serde_json::from_str(raw)?;
        Self::new(questions)
    }
}

fn validate_question(q: &Question) -> StoreResult<()> {
    let invalid = |reason: &str| QuestionStoreError::InvalidQuestion {
        id: q.id.clone(),
        reason: reason.to_string(),
    };

    if q.id.trim().is_empty() {
        return Err(invalid("empty id"));
    }
    if q.text.trim().is_empty() {
        return Err(invalid("empty text"));
    }
    if q.answers.is_empty() {
        return Err(invalid("no answers"));
    }

    let mut texts = HashSet::new();
    for Answer { text, frequency } in &q.answers {
        let norm = normalize(text);
        if norm.is_empty() {
            return Err(invalid("blank answer"));
        }
        if *frequency > MAX_FREQUENCY {
            return Err(invalid(&format!(
                "answer \"{}\" has frequency {} above {}",
                text, frequency, MAX_FREQUENCY
            )));
        }
        if !texts.insert(norm) {
            return Err(invalid(&format!("duplicate answer \"{}\"", text)));
        }
    }
    Ok(())
}

#[async_trait]
impl QuestionStore for InMemoryQuestionStore {
    async fn get_random_question(
        &self,
        exclude_ids: &HashSet<QuestionId>,
        fast_money: bool,
    ) -> StoreResult<Option<Question>> {
        let candidates: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| !exclude_ids.contains(&q.id))
            .filter(|q| q.is_fast_money == fast_money)
            .collect();

        let mut rng = rand::rng();
        Ok(candidates.choose(&mut rng).map(|q| (*q).clone()))
    }

    async fn get_question_by_id(&self, id: &str) -> StoreResult<Option<Question>> {
        Ok(self.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn count(&self, fast_money: bool) -> StoreResult<usize> {
        Ok(self
            .questions
            .iter()
            .filter(|q| q.is_fast_money == fast_money)
            .count())
    }
}
