//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::auth::JwtService;
use crate::domains::booking::{routes as booking_routes, BookingEngine};
use crate::domains::leaderboard::routes as leaderboard_routes;
use crate::domains::sports::routes as sports_routes;
use crate::kernel::{CountFeed, SeatCache};
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::health_handler;

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub db_pool: PgPool,
    pub booking: BookingEngine,
    pub jwt_service: Arc<JwtService>,
}

/// Build the Axum application router.
///
/// The booking engine owns the seat cache and the count feed; everything
/// else talks to Postgres through the shared pool.
pub fn build_app(pool: PgPool, cache: SeatCache, jwt_service: Arc<JwtService>) -> Router {
    let feed = CountFeed::new();
    let booking = BookingEngine::new(pool.clone(), cache, feed);

    let app_state = AxumAppState {
        db_pool: pool,
        booking,
        jwt_service: jwt_service.clone(),
    };

    // CORS configuration - frontend runs on its own origin
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let jwt_service_for_middleware = jwt_service;

    Router::new()
        // Seat booking
        .route("/api/bookings/book", post(booking_routes::book_handler))
        .route("/api/bookings/cancel", post(booking_routes::cancel_handler))
        .route(
            "/api/bookings/remaining",
            get(booking_routes::remaining_handler),
        )
        .route(
            "/api/bookings/my-booking",
            get(booking_routes::my_booking_handler),
        )
        .route("/api/bookings/stream", get(booking_routes::stream_handler))
        .route(
            "/api/bookings/mark-present/:moodle_id",
            post(booking_routes::mark_present_handler),
        )
        .route(
            "/api/bookings/:moodle_id",
            get(booking_routes::booking_by_moodle_handler),
        )
        // Sports, registrations, teams
        .route("/api/sports", get(sports_routes::sport_list_handler))
        .route(
            "/api/registrations",
            get(sports_routes::my_registrations_handler)
                .post(sports_routes::create_registration_handler),
        )
        .route(
            "/api/registrations/sport/:slug",
            get(sports_routes::registrations_by_sport_handler),
        )
        .route("/api/teams", post(sports_routes::create_team_handler))
        .route("/api/teams/my", get(sports_routes::my_teams_handler))
        // Leaderboard
        .route(
            "/api/leaderboard/sport/:slug",
            get(leaderboard_routes::sport_leaderboard_handler),
        )
        .route(
            "/api/leaderboard/sport/:slug/update",
            put(leaderboard_routes::update_leaderboard_handler),
        )
        .route(
            "/api/leaderboard/result/:result_id/adjust",
            post(leaderboard_routes::adjust_result_handler),
        )
        .route(
            "/api/leaderboard/sport/:slug/finalize",
            post(leaderboard_routes::finalize_handler),
        )
        .route(
            "/api/leaderboard/sport/:slug/unfinalize",
            post(leaderboard_routes::unfinalize_handler),
        )
        .route(
            "/api/leaderboard/department",
            get(leaderboard_routes::department_leaderboard_handler),
        )
        // Health check
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service_for_middleware.clone(), req, next)
        }))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
