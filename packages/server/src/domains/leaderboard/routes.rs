//! Leaderboard HTTP surface.
//!
//! GET  /api/leaderboard/sport/{slug} — public, reconciles then lists
//! PUT  /api/leaderboard/sport/{slug}/update — admin bulk reorder
//! POST /api/leaderboard/result/{id}/adjust — admin score nudge
//! POST /api/leaderboard/sport/{slug}/finalize, /unfinalize — admin
//! GET  /api/leaderboard/department — public branch totals

use axum::{
    extract::{Extension, Path},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::domains::leaderboard::engine::{self, AdjustAction, DepartmentStanding, ReorderEntry};
use crate::domains::leaderboard::SportResult;
use crate::domains::sports::Sport;
use crate::error::ApiError;
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Serialize)]
pub struct ResultData {
    pub id: i64,
    pub sport_id: i64,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub branch: String,
    pub position: i32,
    pub score: i32,
    pub points: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<SportResult> for ResultData {
    fn from(r: SportResult) -> Self {
        Self {
            id: r.id,
            sport_id: r.sport_id,
            team_id: r.team_id,
            player_id: r.player_id,
            branch: r.branch,
            position: r.position,
            score: r.score,
            points: r.points,
            updated_at: r.updated_at,
        }
    }
}

fn require_admin(user: &AuthUser) -> Result<(), ApiError> {
    if user.is_staff || user.is_superuser {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Public standings. Reconciles missing participants before serving so a
/// freshly registered team shows up without any admin action.
pub async fn sport_leaderboard_handler(
    Extension(state): Extension<AxumAppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<ResultData>>, ApiError> {
    let sport = Sport::find_by_slug(&slug, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;

    engine::sync_missing(&sport, &state.db_pool).await?;

    let results = SportResult::find_by_sport(sport.id, &state.db_pool).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize)]
pub struct UpdateLeaderboardRequest {
    pub results: Vec<ReorderEntry>,
}

pub async fn update_leaderboard_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateLeaderboardRequest>,
) -> Result<Json<Vec<ResultData>>, ApiError> {
    require_admin(&user)?;

    engine::reorder(&slug, &payload.results, &state.db_pool).await?;

    let sport = Sport::find_by_slug(&slug, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;
    let results = SportResult::find_by_sport(sport.id, &state.db_pool).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize)]
pub struct AdjustRequest {
    pub action: AdjustAction,
}

pub async fn adjust_result_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(result_id): Path<i64>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    let (id, score) = engine::adjust_score(result_id, payload.action, &state.db_pool).await?;
    Ok(Json(json!({"id": id, "score": score})))
}

pub async fn finalize_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    engine::finalize(&slug, &state.db_pool).await?;
    Ok(Json(json!({"success": true, "finalized": true})))
}

pub async fn unfinalize_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&user)?;

    engine::unfinalize(&slug, &state.db_pool).await?;
    Ok(Json(json!({"success": true, "finalized": false})))
}

pub async fn department_leaderboard_handler(
    Extension(state): Extension<AxumAppState>,
) -> Result<Json<Vec<DepartmentStanding>>, ApiError> {
    let standings = engine::department_leaderboard(&state.db_pool).await?;
    Ok(Json(standings))
}
