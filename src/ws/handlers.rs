//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! Authorization is checked here, then dispatched to role-specific handler modules.

use crate::error::{GameError, GameResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use crate::types::{PlayerId, Role, SessionId};
use std::sync::Arc;

use super::{host, player};

/// Who is on the other end of a connection, fixed at join except for
/// `player_id`, which is set once the player registers
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionCtx {
    pub session_id: SessionId,
    pub role: Role,
    /// Verified host identity, only for host connections
    pub host_id: Option<String>,
    pub player_id: Option<PlayerId>,
}

/// Macro to check host authorization and return early if unauthorized
macro_rules! check_host {
    ($ctx:expr, $action:expr) => {
        if $ctx.role != Role::Host {
            return Some(ServerMessage::error(&GameError::Unauthorized($action)));
        }
    };
}

/// Turn a command result into a reply. Successful commands are confirmed by
/// the session broadcast, so only failures are answered directly.
pub(super) fn reply_on_error<T>(result: GameResult<T>) -> Option<ServerMessage> {
    match result {
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            Some(ServerMessage::error(&e))
        }
    }
}

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &mut ConnectionCtx,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::GetState => match state.snapshot(&ctx.session_id).await {
            Ok(snapshot) => Some(ServerMessage::GameState { state: snapshot }),
            Err(e) => Some(ServerMessage::error(&e)),
        },

        // Player messages
        ClientMessage::RegisterPlayer { name, team_id } => {
            player::handle_register_player(state, ctx, name, team_id).await
        }

        ClientMessage::SubmitAnswer {
            text,
            team_id,
            mode,
        } => player::handle_submit_answer(state, ctx, text, team_id, mode).await,

        ClientMessage::SubmitFastMoneyAnswer {
            player_number,
            question_index,
            text,
        } => {
            player::handle_submit_fast_money_answer(
                state,
                ctx,
                player_number,
                question_index,
                text,
            )
            .await
        }

        // Host-only commands (authorization checked before dispatch)
        ClientMessage::HostStartGame => {
            check_host!(ctx, "start the game");
            host::handle_start_game(state, ctx).await
        }

        ClientMessage::HostLoadQuestion {
            question_id,
            multiplier,
        } => {
            check_host!(ctx, "load questions");
            host::handle_load_question(state, ctx, question_id, multiplier).await
        }

        ClientMessage::HostSwitchTeam => {
            check_host!(ctx, "switch teams");
            host::handle_switch_team(state, ctx).await
        }

        ClientMessage::HostEndRound => {
            check_host!(ctx, "end rounds");
            host::handle_end_round(state, ctx).await
        }

        ClientMessage::HostNextRound => {
            check_host!(ctx, "advance rounds");
            host::handle_next_round(state, ctx).await
        }

        ClientMessage::HostStartFastMoney => {
            check_host!(ctx, "start fast money");
            host::handle_start_fast_money(state, ctx).await
        }

        ClientMessage::HostFastMoneyResults => {
            check_host!(ctx, "settle fast money");
            host::handle_fast_money_results(state, ctx).await
        }

        ClientMessage::HostEndGame => {
            check_host!(ctx, "end the game");
            host::handle_end_game(state, ctx).await
        }

        ClientMessage::HostPauseGame => {
            check_host!(ctx, "pause the game");
            host::handle_pause_game(state, ctx).await
        }

        ClientMessage::HostResumeGame => {
            check_host!(ctx, "resume the game");
            host::handle_resume_game(state, ctx).await
        }

        ClientMessage::HostTimerStart { duration } => {
            check_host!(ctx, "control the timer");
            host::handle_timer_start(state, ctx, duration).await
        }

        ClientMessage::HostTimerStop => {
            check_host!(ctx, "control the timer");
            host::handle_timer_stop(state, ctx).await
        }

        ClientMessage::HostTimerResume => {
            check_host!(ctx, "control the timer");
            host::handle_timer_resume(state, ctx).await
        }

        ClientMessage::HostTimerReset { duration } => {
            check_host!(ctx, "control the timer");
            host::handle_timer_reset(state, ctx, duration).await
        }
    }
}
