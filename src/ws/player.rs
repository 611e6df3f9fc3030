//! Player message handlers
//!
//! Registration, board answers and Fast Money answers. The host may also
//! enter answers on behalf of the room.

use crate::error::GameError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::{MatchMode, Role, TeamId};
use std::sync::Arc;

use super::handlers::{reply_on_error, ConnectionCtx};

pub async fn handle_register_player(
    state: &Arc<AppState>,
    ctx: &mut ConnectionCtx,
    name: String,
    team_id: TeamId,
) -> Option<ServerMessage> {
    if ctx.role != Role::Player {
        return Some(ServerMessage::error(&GameError::Unauthorized(
            "register as a player",
        )));
    }
    if ctx.player_id.is_some() {
        return Some(ServerMessage::error(&GameError::InvalidInput(
            "this connection is already registered".to_string(),
        )));
    }

    tracing::info!("Player registration: {} for team {}", name, team_id);
    match state
        .register_player(&ctx.session_id, &name, &team_id)
        .await
    {
        Ok((player, team_counts)) => {
            ctx.player_id = Some(player.id.clone());
            Some(ServerMessage::PlayerRegistered {
                player,
                team_counts,
            })
        }
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

/// Players answer for their own team; the host for either
async fn check_can_answer(
    state: &AppState,
    ctx: &ConnectionCtx,
    team_id: Option<&str>,
) -> Result<(), GameError> {
    match (ctx.role, ctx.player_id.as_deref()) {
        (Role::Host, _) => Ok(()),
        (Role::Player, Some(player_id)) => {
            let own_team = state.player_team(&ctx.session_id, player_id).await?;
            match team_id {
                Some(team_id) if team_id != own_team => {
                    Err(GameError::InvalidTeam(team_id.to_string()))
                }
                _ => Ok(()),
            }
        }
        _ => Err(GameError::Unauthorized("submit answers")),
    }
}

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
    text: String,
    team_id: TeamId,
    mode: Option<MatchMode>,
) -> Option<ServerMessage> {
    if let Err(e) = check_can_answer(state, ctx, Some(&team_id)).await {
        return Some(ServerMessage::error(&e));
    }

    match state
        .submit_answer(&ctx.session_id, &text, &team_id, mode)
        .await
    {
        Ok(outcome) => Some(ServerMessage::AnswerResult {
            correct: outcome.correct,
            answer: outcome.answer,
            points: outcome.points,
            strikes: outcome.strikes,
            team_switched: outcome.team_switched,
            round_complete: outcome.round_complete,
        }),
        Err(e) => Some(ServerMessage::error(&e)),
    }
}

pub async fn handle_submit_fast_money_answer(
    state: &Arc<AppState>,
    ctx: &ConnectionCtx,
    player_number: u8,
    question_index: usize,
    text: String,
) -> Option<ServerMessage> {
    if let Err(e) = check_can_answer(state, ctx, None).await {
        return Some(ServerMessage::error(&e));
    }

    tracing::info!(
        "Fast money answer from player {} for question {}",
        player_number,
        question_index
    );
    reply_on_error(
        state
            .submit_fast_money_answer(&ctx.session_id, player_number, question_index, &text)
            .await,
    )
}
