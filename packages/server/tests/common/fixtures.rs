//! Test fixtures for creating test data.
//!
//! These use the model methods directly, matching what the provisioning
//! tooling does in production.

use anyhow::Result;
use fest_core::common::Student;
use fest_core::domains::sports::{Registration, Sport};
use sqlx::PgPool;

/// Plain student with no special flags.
pub async fn create_student(pool: &PgPool, moodle_id: i64, branch: &str) -> Result<Student> {
    Student::create(
        moodle_id,
        &format!("student{moodle_id}"),
        "SE",
        branch,
        false,
        false,
        pool,
    )
    .await
}

/// Staff member (can mark attendance, can mutate leaderboards).
pub async fn create_staff(pool: &PgPool, moodle_id: i64) -> Result<Student> {
    Student::create(
        moodle_id,
        &format!("staff{moodle_id}"),
        "BE",
        "COMPS",
        true,
        false,
        pool,
    )
    .await
}

pub async fn create_sport(pool: &PgPool, name: &str, team_based: bool) -> Result<Sport> {
    Sport::create(name, team_based, pool).await
}

/// Register a student for a sport with their own branch.
pub async fn register(pool: &PgPool, student: &Student, sport: &Sport) -> Result<Registration> {
    Registration::create(
        student.moodle_id,
        sport.id,
        &student.year,
        &student.branch,
        pool,
    )
    .await
    .map_err(Into::into)
}

/// Create a team with the given members; the first member manages and
/// captains it.
pub async fn create_team(
    pool: &PgPool,
    sport: &Sport,
    name: &str,
    branch: &str,
    member_ids: &[i64],
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let team_id: i64 = sqlx::query_scalar(
        "INSERT INTO teams (name, branch, sport_id, manager_id, captain_id)
         VALUES ($1, $2, $3, $4, $4)
         RETURNING id",
    )
    .bind(name)
    .bind(branch)
    .bind(sport.id)
    .bind(member_ids.first().copied())
    .fetch_one(&mut *tx)
    .await?;

    for &member in member_ids {
        sqlx::query("INSERT INTO team_members (team_id, student_id) VALUES ($1, $2)")
            .bind(team_id)
            .bind(member)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(team_id)
}
