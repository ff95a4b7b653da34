//! Booking HTTP surface.
//!
//! POST /api/bookings/book, /cancel — serialized writes
//! GET  /api/bookings/remaining — cache-first read
//! GET  /api/bookings/my-booking, /{moodle_id} — ticket lookups
//! POST /api/bookings/mark-present/{moodle_id} — staff only
//! GET  /api/bookings/stream — SSE count feed (public)

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::common::Student;
use crate::domains::booking::Booking;
use crate::error::ApiError;
use crate::server::app::AxumAppState;
use crate::server::middleware::AuthUser;

#[derive(Deserialize)]
pub struct BookRequest {
    #[serde(default)]
    pub year: String,
}

pub async fn book_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Json(payload): Json<BookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let year = if payload.year.is_empty() {
        user.year.clone()
    } else {
        payload.year
    };

    let remaining = state.booking.book(user.moodle_id, &year).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "remaining": remaining})),
    ))
}

pub async fn cancel_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let remaining = state.booking.cancel(user.moodle_id).await?;
    Ok(Json(json!({"success": true, "remaining": remaining})))
}

pub async fn remaining_handler(
    Extension(state): Extension<AxumAppState>,
    _user: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let remaining = state.booking.remaining().await?;
    Ok(Json(json!({"remaining": remaining})))
}

/// The caller's own ticket. 404 body carries `booking: null` so clients
/// can render the "not booked yet" state without special-casing.
pub async fn my_booking_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let Some(booking) = Booking::find_by_student(user.moodle_id, &state.db_pool).await? else {
        return Ok((StatusCode::NOT_FOUND, Json(json!({"booking": null}))));
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "booking": {
                "moodleID": user.moodle_id,
                "username": user.username,
                "year": booking.year,
                "registered_on": booking.registered_on,
                "attended": booking.attended,
            }
        })),
    ))
}

/// Ticket detail for any student, shown at the entry desk. Any
/// authenticated user may view; `can_mark` tells the frontend whether the
/// viewer is allowed to mark attendance.
pub async fn booking_by_moodle_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(moodle_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let student = Student::find_by_moodle_id(moodle_id, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found."))?;

    let booking = Booking::find_by_student(student.moodle_id, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("No booking found."))?;

    Ok(Json(json!({
        "student": {
            "username": student.username,
            "moodleID": student.moodle_id,
            "year": student.year,
            "branch": student.branch,
        },
        "registered_on": booking.registered_on,
        "attended": booking.attended,
        "can_mark": user.is_staff || user.is_superuser,
    })))
}

pub async fn mark_present_handler(
    Extension(state): Extension<AxumAppState>,
    user: AuthUser,
    Path(moodle_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(user.is_staff || user.is_superuser) {
        return Err(ApiError::Forbidden);
    }

    let student = Student::find_by_moodle_id(moodle_id, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Student not found."))?;

    let marked = Booking::mark_attended(student.moodle_id, &state.db_pool).await?;
    if !marked {
        return Err(ApiError::not_found("No booking found."));
    }

    Ok(Json(json!({"success": true, "attended": true})))
}

/// SSE feed of remaining-seat counts.
///
/// On connect, one COUNT_UPDATE snapshot with the current count; then one
/// COUNT_UPDATE per committed booking/cancel. Lagged receivers just skip
/// ahead — every message is the full latest value, not a delta.
pub async fn stream_handler(
    Extension(state): Extension<AxumAppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.booking.feed().subscribe();

    // Snapshot is best-effort: a degraded read still leaves the client
    // subscribed for live updates.
    let initial = state.booking.remaining().await.ok();
    let snapshot = stream::once(async move { Ok::<_, Infallible>(count_event(initial)) });

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(remaining) => Some(Ok(count_event(Some(remaining)))),
            // Dropped values are already stale; the next publish carries
            // the full current count.
            Err(BroadcastStreamRecvError::Lagged(_)) => None,
        }
    });

    Sse::new(snapshot.chain(updates)).keep_alive(KeepAlive::default())
}

fn count_event(remaining: Option<i64>) -> Event {
    Event::default()
        .event("COUNT_UPDATE")
        .data(json!({"remaining": remaining}).to_string())
}
