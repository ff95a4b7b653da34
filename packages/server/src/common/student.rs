use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Student row - provisioned by the identity provider, read-only here.
///
/// The moodle ID doubles as the primary key everywhere a student is
/// referenced (bookings, registrations, teams, results).
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Student {
    pub moodle_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub year: String,
    pub branch: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Find student by moodle ID
    pub async fn find_by_moodle_id(moodle_id: i64, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM students WHERE moodle_id = $1")
            .bind(moodle_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a student row (used by tests and provisioning tooling)
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        moodle_id: i64,
        username: &str,
        year: &str,
        branch: &str,
        is_staff: bool,
        is_superuser: bool,
        pool: &PgPool,
    ) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO students (moodle_id, username, year, branch, is_staff, is_superuser)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(moodle_id)
        .bind(username)
        .bind(year)
        .bind(branch)
        .bind(is_staff)
        .bind(is_superuser)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
