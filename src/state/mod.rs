mod clock;
mod fast_money;
mod game;
mod player;
mod round;
mod session;

pub use game::CreatedGame;
pub use round::{AnswerOutcome, NextRound};
pub use session::{FastMoneyState, Session};

use crate::error::{GameError, GameResult};
use crate::protocol::ServerMessage;
use crate::questions::QuestionStore;
use crate::timer::Timers;
use crate::types::*;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Safe character set for game codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;
const MAX_CODE_ATTEMPTS: usize = 32;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_QUESTION_TIMEOUT: Duration = Duration::from_secs(2);

/// Generate a random game code
fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Draw codes until one is not taken, giving up after `attempts` tries
fn unique_code(
    taken: &HashSet<&str>,
    attempts: usize,
    mut generate: impl FnMut() -> String,
) -> GameResult<String> {
    for _ in 0..attempts {
        let code = generate();
        if !taken.contains(code.as_str()) {
            return Ok(code);
        }
    }
    Err(GameError::CodeSpaceExhausted(attempts))
}

/// One live session: its state behind a lock, plus its event fan-out
pub struct SessionHandle {
    pub id: SessionId,
    pub code: GameCode,
    session: Mutex<Session>,
    events: broadcast::Sender<ServerMessage>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: session.id.clone(),
            code: session.code.clone(),
            session: Mutex::new(session),
            events,
        }
    }

    /// Run one command against the session.
    ///
    /// `f` works on a draft; the draft replaces the live session only if `f`
    /// succeeds, and only then are the events it queued published. Commands
    /// on the same session never interleave.
    pub async fn apply<T>(&self, f: impl FnOnce(&mut Session) -> GameResult<T>) -> GameResult<T> {
        let mut live = self.session.lock().await;
        let mut draft = live.clone();
        let out = f(&mut draft)?;
        draft.touch();
        let events = draft.take_events();
        *live = draft;

        for event in events {
            // No subscribers is fine
            let _ = self.events.send(event);
        }
        Ok(out)
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        let session = self.session.lock().await;
        f(&session)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct Directory {
    by_id: HashMap<SessionId, Arc<SessionHandle>>,
    by_code: HashMap<GameCode, SessionId>,
}

/// Session registry: owns every live session and routes commands to them
pub struct AppState {
    sessions: RwLock<Directory>,
    pub questions: Arc<dyn QuestionStore>,
    pub timers: Timers,
    pub question_timeout: Duration,
}

impl AppState {
    pub fn new(questions: Arc<dyn QuestionStore>) -> Self {
        Self {
            sessions: RwLock::new(Directory::default()),
            questions,
            timers: Timers::new(),
            question_timeout: DEFAULT_QUESTION_TIMEOUT,
        }
    }

    pub fn with_question_timeout(mut self, timeout: Duration) -> Self {
        self.question_timeout = timeout;
        self
    }

    /// Register a new session and return its handle
    async fn insert_session(
        &self,
        host_id: String,
        settings: GameSettings,
    ) -> GameResult<Arc<SessionHandle>> {
        let mut dir = self.sessions.write().await;
        let taken: HashSet<&str> = dir.by_code.keys().map(String::as_str).collect();
        let code = unique_code(&taken, MAX_CODE_ATTEMPTS, generate_code)?;

        let id = ulid::Ulid::new().to_string();
        let session = Session::new(id.clone(), code.clone(), host_id, settings)?;
        let handle = Arc::new(SessionHandle::new(session));

        dir.by_code.insert(code, id.clone());
        dir.by_id.insert(id, handle.clone());
        Ok(handle)
    }

    /// Look up a session by id or by game code
    pub async fn handle(&self, key: &str) -> GameResult<Arc<SessionHandle>> {
        let dir = self.sessions.read().await;
        if let Some(handle) = dir.by_id.get(key) {
            return Ok(handle.clone());
        }
        dir.by_code
            .get(&key.trim().to_ascii_uppercase())
            .and_then(|id| dir.by_id.get(id))
            .cloned()
            .ok_or_else(|| GameError::SessionNotFound(key.to_string()))
    }

    /// The sole mutation entry point for callers outside the engine
    pub async fn with_session<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Session) -> GameResult<T>,
    ) -> GameResult<T> {
        self.handle(key).await?.apply(f).await
    }

    pub async fn get_session(&self, key: &str) -> GameResult<Session> {
        Ok(self.handle(key).await?.read(|s| s.clone()).await)
    }

    pub async fn subscribe(&self, key: &str) -> GameResult<broadcast::Receiver<ServerMessage>> {
        Ok(self.handle(key).await?.subscribe())
    }

    /// Remove a session and release its timer
    pub async fn delete_session(&self, key: &str) -> GameResult<()> {
        let handle = self.handle(key).await?;
        {
            let mut dir = self.sessions.write().await;
            dir.by_id.remove(&handle.id);
            dir.by_code.remove(&handle.code);
        }
        // Stop under the lock so an in-flight tick sees the new generation
        handle
            .apply(|s| {
                s.timer.stop();
                Ok(())
            })
            .await?;
        self.timers.cancel(&handle.id);
        tracing::info!("Deleted session {} ({})", handle.id, handle.code);
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.by_id.len()
    }

    /// Delete sessions with no activity for longer than `max_idle`
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<SessionId> {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.read().await.by_id.values().cloned().collect();

        let mut removed = Vec::new();
        for handle in handles {
            let idle = handle.read(|s| s.last_activity.elapsed()).await;
            if idle > max_idle && self.delete_session(&handle.id).await.is_ok() {
                tracing::info!(
                    "Swept idle session {} after {}s",
                    handle.code,
                    idle.as_secs()
                );
                removed.push(handle.id.clone());
            }
        }
        removed
    }

    /// Confirm a host token and return the host id it belongs to
    pub async fn verify_host(&self, key: &str, token: &str) -> GameResult<String> {
        let handle = self.handle(key).await?;
        handle
            .read(|s| {
                if s.host_token == token {
                    Ok(s.host_id.clone())
                } else {
                    Err(GameError::Unauthorized("control this game"))
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::InMemoryQuestionStore;

    fn state() -> AppState {
        AppState::new(Arc::new(InMemoryQuestionStore::seeded().unwrap()))
    }

    #[test]
    fn test_generated_codes_use_safe_alphabet() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[test]
    fn test_unique_code_retries_on_collision() {
        let taken: HashSet<&str> = ["AAAAAA"].into_iter().collect();
        let mut draws = vec!["BBBBBB".to_string(), "AAAAAA".to_string()];
        let code = unique_code(&taken, 5, || draws.pop().unwrap()).unwrap();
        assert_eq!(code, "BBBBBB");
    }

    #[test]
    fn test_unique_code_gives_up() {
        let taken: HashSet<&str> = ["AAAAAA"].into_iter().collect();
        let err = unique_code(&taken, 4, || "AAAAAA".to_string()).unwrap_err();
        assert_eq!(err, GameError::CodeSpaceExhausted(4));
    }

    #[tokio::test]
    async fn test_lookup_by_id_and_code() {
        let state = state();
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();

        let by_id = state.handle(&created.session_id).await.unwrap();
        let by_code = state.handle(&created.code.to_lowercase()).await.unwrap();
        assert_eq!(by_id.id, by_code.id);

        let err = state.handle("nope").await.err().unwrap();
        assert_eq!(err.code(), "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_failed_command_leaves_state_untouched() {
        let state = state();
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();

        let result: GameResult<()> = state
            .with_session(&created.session_id, |s| {
                s.teams[0].score = 999;
                let teams = s.teams.to_vec();
                s.emit(ServerMessage::ScoreUpdate { teams });
                Err(GameError::NoActiveQuestion)
            })
            .await;
        assert!(result.is_err());

        let session = state.get_session(&created.session_id).await.unwrap();
        assert_eq!(session.teams[0].score, 0);
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let state = state();
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();
        let mut rx = state.subscribe(&created.code).await.unwrap();

        state
            .register_player(&created.code, "Alice", TEAM_A)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ServerMessage::PlayerJoined { player, team_counts } => {
                assert_eq!(player.name, "Alice");
                assert_eq!(team_counts.a, 1);
            }
            other => panic!("Expected PlayerJoined, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_submissions_credit_once() {
        let state = Arc::new(state());
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();
        let id = created.session_id.clone();
        state.register_player(&id, "Alice", TEAM_A).await.unwrap();
        state.register_player(&id, "Bob", TEAM_B).await.unwrap();
        state.start_game(&id, "host").await.unwrap();
        state
            .with_session(&id, |s| {
                s.load_question(crate::state::session::test_support::snack_question(), None)
            })
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            let id = id.clone();
            tasks.push(tokio::spawn(async move {
                state.submit_answer(&id, "pizza", TEAM_A, None).await
            }));
        }

        let mut credited = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(outcome) if outcome.correct => credited += 1,
                Err(GameError::AlreadyRevealed(_)) => {}
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(credited, 1);

        let session = state.get_session(&id).await.unwrap();
        assert_eq!(session.teams[0].score, 34);
        assert_eq!(session.strikes, 0);
    }

    #[tokio::test]
    async fn test_delete_session() {
        let state = state();
        let created = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();

        state.delete_session(&created.code).await.unwrap();
        assert_eq!(state.session_count().await, 0);
        assert!(state.handle(&created.session_id).await.is_err());
        assert!(state.handle(&created.code).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_idle_sessions() {
        let state = state();
        let stale = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(600)).await;
        let fresh = state
            .create_game("host".to_string(), GameSettings::default())
            .await
            .unwrap();

        let removed = state.sweep_idle(Duration::from_secs(300)).await;
        assert_eq!(removed, vec![stale.session_id]);
        assert!(state.handle(&fresh.session_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_host() {
        let state = state();
        let created = state
            .create_game("host-1".to_string(), GameSettings::default())
            .await
            .unwrap();

        assert_eq!(
            state
                .verify_host(&created.code, &created.host_token)
                .await
                .unwrap(),
            "host-1"
        );
        assert_eq!(
            state.verify_host(&created.code, "wrong").await.unwrap_err().code(),
            "UNAUTHORIZED"
        );
    }
}
