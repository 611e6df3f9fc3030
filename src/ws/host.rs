//! Host-only command handlers
//!
//! All handlers in this module require the Host role.
//! Authorization is checked in the main dispatch layer before calling these.

use crate::protocol::ServerMessage;
use crate::state::{AppState, NextRound};
use crate::types::QuestionId;
use std::sync::Arc;

use super::handlers::{reply_on_error, ConnectionCtx};

pub async fn handle_start_game(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    tracing::info!("Host starting game {}", ctx.session_id);
    let host_id = ctx.host_id.as_deref().unwrap_or_default();
    reply_on_error(state.start_game(&ctx.session_id, host_id).await)
}

pub async fn handle_load_question(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
    question_id: Option<QuestionId>,
    multiplier: Option<u32>,
) -> Option<ServerMessage> {
    tracing::info!(
        "Host loading question {:?} (multiplier {:?})",
        question_id,
        multiplier
    );
    reply_on_error(
        state
            .load_question(&ctx.session_id, question_id.as_deref(), multiplier)
            .await,
    )
}

pub async fn handle_switch_team(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.switch_team(&ctx.session_id).await)
}

pub async fn handle_end_round(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.end_round(&ctx.session_id).await)
}

pub async fn handle_next_round(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    match state.next_round(&ctx.session_id).await {
        Ok(NextRound::Round(round)) => {
            tracing::info!("Host advanced to round {}", round.number);
            None
        }
        Ok(NextRound::GameOver(_)) => None,
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_start_fast_money(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
) -> Option<ServerMessage> {
    tracing::info!("Host starting fast money");
    reply_on_error(state.start_fast_money(&ctx.session_id).await)
}

pub async fn handle_fast_money_results(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
) -> Option<ServerMessage> {
    reply_on_error(state.fast_money_results(&ctx.session_id).await)
}

pub async fn handle_end_game(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    tracing::info!("Host ending game {}", ctx.session_id);
    reply_on_error(state.end_game(&ctx.session_id).await)
}

pub async fn handle_pause_game(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.pause_game(&ctx.session_id).await)
}

pub async fn handle_resume_game(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.resume_game(&ctx.session_id).await)
}

pub async fn handle_timer_start(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
    duration: Option<u32>,
) -> Option<ServerMessage> {
    reply_on_error(state.start_timer(&ctx.session_id, duration).await)
}

pub async fn handle_timer_stop(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.stop_timer(&ctx.session_id).await)
}

pub async fn handle_timer_resume(state: &Arc<AppState>, ctx: &ConnectionCtx) -> Option<ServerMessage> {
    reply_on_error(state.resume_timer(&ctx.session_id).await)
}

pub async fn handle_timer_reset(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
    duration: Option<u32>,
) -> Option<ServerMessage> {
    reply_on_error(state.reset_timer(&ctx.session_id, duration).await)
}
