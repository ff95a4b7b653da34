//! Registration and team endpoints.
//!
//! POST /api/registrations — individual registration (exclusivity checked)
//! GET  /api/registrations — caller's registrations
//! GET  /api/registrations/sport/{slug} — per-sport list
//! POST /api/teams — team creation for team-based sports
//! GET  /api/teams/my — teams the caller belongs to
//! GET  /api/sports — public catalogue

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domains::sports::{Registration, Sport, Team};
use crate::error::ApiError;
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Serialize)]
pub struct SportData {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "isTeamBased")]
    pub team_based: bool,
    pub finalized: bool,
    pub coordinators: Vec<i64>,
}

impl SportData {
    fn new(s: Sport, coordinators: Vec<i64>) -> Self {
        Self {
            id: s.id,
            slug: s.slug,
            name: s.name,
            description: s.description,
            team_based: s.team_based,
            finalized: s.finalized,
            coordinators,
        }
    }
}

#[derive(Serialize)]
pub struct RegistrationData {
    pub id: i64,
    pub student_id: i64,
    pub sport_id: i64,
    pub year: String,
    pub branch: String,
    pub registered_on: DateTime<Utc>,
}

impl From<Registration> for RegistrationData {
    fn from(r: Registration) -> Self {
        Self {
            id: r.id,
            student_id: r.student_id,
            sport_id: r.sport_id,
            year: r.year,
            branch: r.branch,
            registered_on: r.registered_on,
        }
    }
}

#[derive(Serialize)]
pub struct TeamData {
    pub id: i64,
    pub name: String,
    pub branch: String,
    pub sport_id: i64,
    pub manager_id: Option<i64>,
    pub captain_id: Option<i64>,
    pub members: Vec<i64>,
}

pub async fn sport_list_handler(
    Extension(state): Extension<AxumAppState>,
) -> Result<Json<Vec<SportData>>, ApiError> {
    let sports = Sport::list(&state.db_pool).await?;

    let mut out = Vec::with_capacity(sports.len());
    for sport in sports {
        let coordinators = Sport::coordinator_ids(sport.id, &state.db_pool).await?;
        out.push(SportData::new(sport, coordinators));
    }
    Ok(Json(out))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub sport_slug: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub branch: String,
}

pub async fn create_registration_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Lock the sport row for the whole operation: registration and team
    // writes for one sport serialize here, so the exclusivity checks below
    // cannot race a concurrent team creation.
    let mut tx = state.db_pool.begin().await?;

    let sport = sqlx::query_as::<_, Sport>("SELECT * FROM sports WHERE slug = $1 FOR UPDATE")
        .bind(&payload.sport_slug)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid sport slug"))?;

    if Registration::exists(user.moodle_id, sport.id, &mut *tx).await? {
        return Err(ApiError::conflict(
            "You have already registered for this event.",
        ));
    }

    // Team membership and individual registration are mutually exclusive
    // for one sport.
    if Team::student_on_team(user.moodle_id, sport.id, &mut *tx).await? {
        return Err(ApiError::conflict(
            "You are already part of a team for this event.",
        ));
    }

    let year = if payload.year.is_empty() {
        user.year.clone()
    } else {
        payload.year
    };
    let branch = if payload.branch.is_empty() {
        user.branch.clone()
    } else {
        payload.branch
    };
    if !crate::common::YEARS.contains(&year.as_str()) {
        return Err(ApiError::validation("Invalid year"));
    }
    if !crate::common::BRANCHES.contains(&branch.as_str()) {
        return Err(ApiError::validation("Invalid branch"));
    }

    let registration =
        match Registration::create(user.moodle_id, sport.id, &year, &branch, &mut *tx).await {
            Ok(r) => r,
            // Two registrations racing: the unique constraint wins.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(ApiError::conflict(
                    "You have already registered for this event.",
                ));
            }
            Err(e) => return Err(e.into()),
        };

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationData::from(registration)),
    ))
}

pub async fn my_registrations_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> Result<Json<Vec<RegistrationData>>, ApiError> {
    let registrations = Registration::find_by_student(user.moodle_id, &state.db_pool).await?;
    Ok(Json(registrations.into_iter().map(Into::into).collect()))
}

pub async fn registrations_by_sport_handler(
    Extension(state): Extension<AxumAppState>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<Vec<RegistrationData>>, ApiError> {
    let sport = Sport::find_by_slug(&slug, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Sport not found."))?;

    let registrations = Registration::find_by_sport(sport.id, &state.db_pool).await?;
    Ok(Json(registrations.into_iter().map(Into::into).collect()))
}

#[derive(Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub sport_id: i64,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub member_ids: Vec<i64>,
    pub captain_id: Option<i64>,
    #[serde(default)]
    pub secondary_contact: String,
}

pub async fn create_team_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(payload): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Lock the sport row so concurrent team/registration writes for the
    // same sport queue behind each other; the roster checks run inside
    // the same transaction and cannot go stale before the insert.
    let mut tx = state.db_pool.begin().await?;

    let sport = sqlx::query_as::<_, Sport>("SELECT * FROM sports WHERE id = $1 FOR UPDATE")
        .bind(payload.sport_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::validation("Invalid sport id"))?;

    if !sport.team_based {
        return Err(ApiError::validation("This sport does not support teams"));
    }

    // Manager defaults to the caller, captain to the manager.
    let manager_id = user.moodle_id;
    let captain_id = payload.captain_id.unwrap_or(manager_id);

    let mut roster = payload.member_ids.clone();
    if !roster.contains(&captain_id) {
        roster.push(captain_id);
    }

    for &member in &roster {
        if Team::student_on_team(member, sport.id, &mut *tx).await? {
            return Err(ApiError::conflict(format!(
                "Student {member} is already part of a team for this event."
            )));
        }
        if Registration::exists(member, sport.id, &mut *tx).await? {
            return Err(ApiError::conflict(format!(
                "Student {member} is individually registered for this event."
            )));
        }
    }

    let branch = if payload.branch.is_empty() {
        user.branch.clone()
    } else {
        payload.branch
    };

    // Team + roster land atomically.
    let team = sqlx::query_as::<_, Team>(
        "INSERT INTO teams (name, branch, sport_id, manager_id, captain_id, secondary_contact)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(&payload.name)
    .bind(&branch)
    .bind(sport.id)
    .bind(manager_id)
    .bind(captain_id)
    .bind(&payload.secondary_contact)
    .fetch_one(&mut *tx)
    .await?;

    for &member in &roster {
        sqlx::query("INSERT INTO team_members (team_id, student_id) VALUES ($1, $2)")
            .bind(team.id)
            .bind(member)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let members = Team::member_ids(team.id, &state.db_pool).await?;
    Ok((
        StatusCode::CREATED,
        Json(TeamData {
            id: team.id,
            name: team.name,
            branch: team.branch,
            sport_id: team.sport_id,
            manager_id: team.manager_id,
            captain_id: team.captain_id,
            members,
        }),
    ))
}

pub async fn my_teams_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> Result<Json<Vec<TeamData>>, ApiError> {
    let teams = Team::find_for_student(user.moodle_id, &state.db_pool).await?;

    let mut out = Vec::with_capacity(teams.len());
    for team in teams {
        let members = Team::member_ids(team.id, &state.db_pool).await?;
        out.push(TeamData {
            id: team.id,
            name: team.name,
            branch: team.branch,
            sport_id: team.sport_id,
            manager_id: team.manager_id,
            captain_id: team.captain_id,
            members,
        });
    }

    Ok(Json(out))
}
