use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Sport/event row. `finalized` is the leaderboard mutation gate.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Sport {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub team_based: bool,
    pub finalized: bool,
    pub created_at: DateTime<Utc>,
}

/// URL-safe slug derived from a sport name: lowercase alphanumerics with
/// single hyphens in place of runs of anything else.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

impl Sport {
    /// Create a sport, deriving the slug from the name.
    pub async fn create(name: &str, team_based: bool, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO sports (slug, name, team_based) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(slugify(name))
        .bind(name)
        .bind(team_based)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM sports WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM sports ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Coordinators for a sport, primary first.
    pub async fn coordinator_ids(sport_id: i64, pool: &PgPool) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT student_id FROM sport_coordinators
             WHERE sport_id = $1
             ORDER BY CASE role WHEN 'primary' THEN 0 ELSE 1 END, student_id",
        )
        .bind(sport_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

/// Individual registration for a sport. Unique per (student, sport).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Registration {
    pub id: i64,
    pub student_id: i64,
    pub sport_id: i64,
    pub year: String,
    pub branch: String,
    pub registered_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

impl Registration {
    /// Executor-generic so callers can run the check inside the same
    /// transaction that holds the sport-row lock.
    pub async fn exists<'e, E>(student_id: i64, sport_id: i64, executor: E) -> Result<bool>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE student_id = $1 AND sport_id = $2)",
        )
        .bind(student_id)
        .bind(sport_id)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    pub async fn create<'e, E>(
        student_id: i64,
        sport_id: i64,
        year: &str,
        branch: &str,
        executor: E,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            "INSERT INTO registrations (student_id, sport_id, year, branch)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(student_id)
        .bind(sport_id)
        .bind(year)
        .bind(branch)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_student(student_id: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM registrations WHERE student_id = $1 ORDER BY registered_on",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_by_sport(sport_id: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM registrations WHERE sport_id = $1 ORDER BY registered_on",
        )
        .bind(sport_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}

/// Team row. Members live in `team_members`.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub branch: String,
    pub sport_id: i64,
    pub manager_id: Option<i64>,
    pub captain_id: Option<i64>,
    pub secondary_contact: String,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Is the student already on any team (as member, captain or manager)
    /// for this sport? Executor-generic for the same reason as
    /// [`Registration::exists`].
    pub async fn student_on_team<'e, E>(student_id: i64, sport_id: i64, executor: E) -> Result<bool>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM teams t
                 LEFT JOIN team_members tm ON tm.team_id = t.id
                 WHERE t.sport_id = $2
                   AND (tm.student_id = $1 OR t.captain_id = $1 OR t.manager_id = $1)
             )",
        )
        .bind(student_id)
        .bind(sport_id)
        .fetch_one(executor)
        .await
        .map_err(Into::into)
    }

    /// Teams the student belongs to, captains or manages.
    pub async fn find_for_student(student_id: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT DISTINCT t.* FROM teams t
             LEFT JOIN team_members tm ON tm.team_id = t.id
             WHERE tm.student_id = $1 OR t.captain_id = $1 OR t.manager_id = $1
             ORDER BY t.id",
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn member_ids(team_id: i64, pool: &PgPool) -> Result<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "SELECT student_id FROM team_members WHERE team_id = $1 ORDER BY student_id",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
