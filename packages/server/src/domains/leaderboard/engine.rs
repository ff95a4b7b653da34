//! Leaderboard ranking and points engine.
//!
//! Writes are scoped per sport and serialize via row locks on the touched
//! Result rows (`SELECT ... FOR UPDATE` then bulk write); operations on
//! different sports never contend. The finalize gate lives on the sport
//! row and is checked under the same lock as the mutation it guards.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use crate::domains::sports::Sport;
use crate::error::ApiError;

/// Raw score ceiling for the +1 adjuster.
pub const MAX_SCORE: i32 = 9999;

/// Department points derived from a rank: podium places score 3/2/1,
/// everyone else 0. Invoked at every write site that changes a position;
/// `points` is never set independently.
pub fn points_for(position: i32) -> i32 {
    match position {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustAction {
    Add,
    Subtract,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderEntry {
    pub id: i64,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentStanding {
    pub rank: i32,
    pub branch: String,
    pub points: i64,
}

/// Ensure every participant of the sport has a Result row.
///
/// Missing rows are appended after the current worst position with
/// score=0, points=0 and the participant's branch. The conditional insert
/// plus the (sport, team)/(sport, player) unique indexes make concurrent
/// sync passes safe: at most one of two racing inserts lands, the other
/// is a no-op.
pub async fn sync_missing(sport: &Sport, pool: &PgPool) -> Result<u64, ApiError> {
    let sql = if sport.team_based {
        "INSERT INTO results (sport_id, team_id, branch, position)
         SELECT $1, t.id, t.branch,
                (SELECT COALESCE(MAX(r2.position), 0) FROM results r2 WHERE r2.sport_id = $1)
                + ROW_NUMBER() OVER (ORDER BY t.id)
         FROM teams t
         WHERE t.sport_id = $1
           AND NOT EXISTS (
               SELECT 1 FROM results r WHERE r.sport_id = $1 AND r.team_id = t.id
           )
         ON CONFLICT DO NOTHING"
    } else {
        "INSERT INTO results (sport_id, player_id, branch, position)
         SELECT $1, reg.student_id, reg.branch,
                (SELECT COALESCE(MAX(r2.position), 0) FROM results r2 WHERE r2.sport_id = $1)
                + ROW_NUMBER() OVER (ORDER BY reg.id)
         FROM registrations reg
         WHERE reg.sport_id = $1
           AND NOT EXISTS (
               SELECT 1 FROM results r WHERE r.sport_id = $1 AND r.player_id = reg.student_id
           )
         ON CONFLICT DO NOTHING"
    };

    let created = sqlx::query(sql)
        .bind(sport.id)
        .execute(pool)
        .await?
        .rows_affected();

    if created > 0 {
        debug!(sport = %sport.slug, created, "Synced missing leaderboard entries");
    }

    Ok(created)
}

/// Bulk position update for one sport. All-or-nothing: a single unknown
/// or foreign result id rejects the whole batch, and every position/points
/// pair lands in one transaction.
pub async fn reorder(slug: &str, entries: &[ReorderEntry], pool: &PgPool) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let sport = sqlx::query_as::<_, Sport>("SELECT * FROM sports WHERE slug = $1 FOR UPDATE")
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;

    if sport.finalized {
        return Err(ApiError::conflict("Sport standings are finalized."));
    }

    // Lock the sport's rows so a concurrent reorder on the same sport
    // queues behind this one instead of interleaving.
    let owned: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM results WHERE sport_id = $1 FOR UPDATE")
            .bind(sport.id)
            .fetch_all(&mut *tx)
            .await?;
    let owned: HashSet<i64> = owned.into_iter().collect();

    for entry in entries {
        if !owned.contains(&entry.id) {
            return Err(ApiError::validation(format!(
                "Result {} does not belong to sport '{}'",
                entry.id, slug
            )));
        }
    }

    for entry in entries {
        sqlx::query(
            "UPDATE results SET position = $2, points = $3, updated_at = now() WHERE id = $1",
        )
        .bind(entry.id)
        .bind(entry.position)
        .bind(points_for(entry.position))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Nudge a result's raw score by one. Never touches position or points.
pub async fn adjust_score(
    result_id: i64,
    action: AdjustAction,
    pool: &PgPool,
) -> Result<(i64, i32), ApiError> {
    let mut tx = pool.begin().await?;

    // Lock the sport row too: an in-flight finalize holds it, so the
    // gate read here cannot race past a finalize that commits first.
    let row = sqlx::query_as::<_, (i32, bool)>(
        "SELECT r.score, s.finalized
         FROM results r
         JOIN sports s ON s.id = r.sport_id
         WHERE r.id = $1
         FOR UPDATE OF r, s",
    )
    .bind(result_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (score, finalized) = row.ok_or_else(|| ApiError::not_found("Result not found."))?;

    if finalized {
        return Err(ApiError::conflict("Sport standings are finalized."));
    }

    let new_score = match action {
        AdjustAction::Add => {
            if score >= MAX_SCORE {
                return Err(ApiError::validation("Score cannot exceed 9999."));
            }
            score + 1
        }
        AdjustAction::Subtract => {
            if score == 0 {
                return Err(ApiError::validation("Score cannot go below zero."));
            }
            score - 1
        }
    };

    sqlx::query("UPDATE results SET score = $2, updated_at = now() WHERE id = $1")
        .bind(result_id)
        .bind(new_score)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok((result_id, new_score))
}

/// Freeze the sport's standings. Requires at least one Result row.
pub async fn finalize(slug: &str, pool: &PgPool) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let sport = sqlx::query_as::<_, Sport>("SELECT * FROM sports WHERE slug = $1 FOR UPDATE")
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;

    if sport.finalized {
        return Err(ApiError::conflict("Sport standings are already finalized."));
    }

    let results: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE sport_id = $1")
        .bind(sport.id)
        .fetch_one(&mut *tx)
        .await?;
    if results == 0 {
        return Err(ApiError::validation("No results to finalize."));
    }

    sqlx::query("UPDATE sports SET finalized = TRUE WHERE id = $1")
        .bind(sport.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Reopen a finalized sport for score/position mutation.
pub async fn unfinalize(slug: &str, pool: &PgPool) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;

    let sport = sqlx::query_as::<_, Sport>("SELECT * FROM sports WHERE slug = $1 FOR UPDATE")
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;

    if !sport.finalized {
        return Err(ApiError::conflict("Sport standings are not finalized."));
    }

    sqlx::query("UPDATE sports SET finalized = FALSE WHERE id = $1")
        .bind(sport.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Branch totals across finalized sports only, ranked by summed points.
///
/// Dense rank: equal totals share a rank, ties keep the stable branch
/// ordering from the query.
pub async fn department_leaderboard(pool: &PgPool) -> Result<Vec<DepartmentStanding>, ApiError> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT r.branch, COALESCE(SUM(r.points), 0) AS total
         FROM results r
         JOIN sports s ON s.id = r.sport_id
         WHERE s.finalized
         GROUP BY r.branch
         ORDER BY total DESC, r.branch",
    )
    .fetch_all(pool)
    .await?;

    let mut standings = Vec::with_capacity(rows.len());
    let mut rank = 0;
    let mut last_total: Option<i64> = None;

    for (branch, total) in rows {
        if last_total != Some(total) {
            rank += 1;
            last_total = Some(total);
        }
        standings.push(DepartmentStanding {
            rank,
            branch,
            points: total,
        });
    }

    Ok(standings)
}
