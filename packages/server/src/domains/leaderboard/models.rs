use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Leaderboard row: one per participant (team or player) per sport.
///
/// `points` is always a pure function of `position` (see
/// [`crate::domains::leaderboard::points_for`]); `score` is the raw
/// admin-adjusted tally and never feeds the department totals.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct SportResult {
    pub id: i64,
    pub sport_id: i64,
    pub team_id: Option<i64>,
    pub player_id: Option<i64>,
    pub branch: String,
    pub position: i32,
    pub score: i32,
    pub points: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SportResult {
    /// Standings for a sport, best position first.
    pub async fn find_by_sport(sport_id: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM results WHERE sport_id = $1 ORDER BY position, id",
        )
        .bind(sport_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
