//! Booking engine integration tests: capacity invariant under concurrency,
//! duplicate protection, cancel/remaining arithmetic and the HTTP surface.

mod common;

use common::*;
use fest_core::domains::booking::Booking;
use fest_core::error::ApiError;
use serde_json::json;
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_bookings_never_exceed_capacity(ctx: &mut TestHarness) {
    let capacity = 5;
    let engine = ctx.booking_engine(capacity);

    // 20 distinct students race for 5 seats.
    for id in 1..=20 {
        create_student(&ctx.db_pool, id, "COMPS").await.unwrap();
    }

    let mut handles = Vec::new();
    for id in 1..=20 {
        let engine = engine.clone();
        handles.push(tokio::spawn(
            async move { engine.book(id, "SE").await.is_ok() },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, capacity);
    assert_eq!(Booking::count(&ctx.db_pool).await.unwrap(), capacity);

    // Each student holds at most one seat.
    let distinct: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT student_id) FROM bookings")
        .fetch_one(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(distinct, capacity);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_bookings_same_student_create_one_row(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine(1200);
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(
            async move { engine.book(1, "SE").await.is_ok() },
        ));
    }

    let successes = {
        let mut n = 0;
        for handle in handles {
            if handle.await.unwrap() {
                n += 1;
            }
        }
        n
    };

    assert_eq!(successes, 1);
    assert_eq!(Booking::count(&ctx.db_pool).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn double_booking_is_a_conflict(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine(1200);
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();

    engine.book(1, "SE").await.unwrap();
    let err = engine.book(1, "SE").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    assert_eq!(Booking::count(&ctx.db_pool).await.unwrap(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn booking_past_capacity_is_rejected(ctx: &mut TestHarness) {
    let capacity = 3;
    let engine = ctx.booking_engine(capacity);

    for id in 1..=4 {
        create_student(&ctx.db_pool, id, "COMPS").await.unwrap();
    }
    for id in 1..=3 {
        engine.book(id, "SE").await.unwrap();
    }

    let err = engine.book(4, "SE").await.unwrap_err();
    match err {
        ApiError::Conflict(detail) => assert_eq!(detail, "Capacity full."),
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert_eq!(Booking::count(&ctx.db_pool).await.unwrap(), capacity);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_frees_exactly_one_seat(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine(100);
    for id in 1..=2 {
        create_student(&ctx.db_pool, id, "COMPS").await.unwrap();
    }

    engine.book(1, "SE").await.unwrap();
    engine.book(2, "TE").await.unwrap();

    let before = engine.remaining().await.unwrap();
    let after = engine.cancel(1).await.unwrap();
    assert_eq!(after, before + 1);
    assert_eq!(engine.remaining().await.unwrap(), after);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn cancel_without_booking_is_not_found(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine(100);
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();

    let err = engine.cancel(1).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn remaining_is_correct_with_cold_cache(ctx: &mut TestHarness) {
    // Cache disabled entirely: the count must come from the database.
    let engine = ctx.booking_engine(1200);
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();
    engine.book(1, "SE").await.unwrap();

    assert_eq!(engine.remaining().await.unwrap(), 1199);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn remaining_repopulates_cache_after_miss(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine_with_cache(1200).await;
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();
    engine.book(1, "SE").await.unwrap();

    // Cache was written post-commit; a fresh read agrees with the DB.
    assert_eq!(engine.remaining().await.unwrap(), 1199);

    // Delete behind the cache's back: the cached value (still fresh, TTL 5s)
    // keeps being served. This is the documented, bounded staleness.
    sqlx::query("DELETE FROM bookings")
        .execute(&ctx.db_pool)
        .await
        .unwrap();
    assert_eq!(engine.remaining().await.unwrap(), 1199);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn feed_broadcasts_after_book_and_cancel(ctx: &mut TestHarness) {
    let engine = ctx.booking_engine(10);
    create_student(&ctx.db_pool, 1, "COMPS").await.unwrap();

    let mut rx = engine.feed().subscribe();

    engine.book(1, "SE").await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), 9);

    engine.cancel(1).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), 10);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn http_book_cancel_roundtrip(ctx: &mut TestHarness) {
    let app = ctx.spawn_app().await.unwrap();
    let alice = create_student(&ctx.db_pool, 101, "COMPS").await.unwrap();

    let resp = app
        .post_as(&alice, "/api/bookings/book", &json!({"year": "SE"}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["remaining"], 1199);

    // Second attempt is a 400 conflict
    let resp = app
        .post_as(&alice, "/api/bookings/book", &json!({"year": "SE"}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Ticket is visible
    let resp = app.get_as(&alice, "/api/bookings/my-booking").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["booking"]["moodleID"], 101);

    // Cancel frees the seat
    let resp = app
        .post_as(&alice, "/api/bookings/cancel", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["remaining"], 1200);

    // No ticket anymore: 404 with an explicit null booking
    let resp = app.get_as(&alice, "/api/bookings/my-booking").await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["booking"].is_null());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn http_requires_authentication(ctx: &mut TestHarness) {
    let app = ctx.spawn_app().await.unwrap();

    let resp = app
        .client
        .post(app.url("/api/bookings/book"))
        .json(&json!({"year": "SE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn mark_present_is_staff_only(ctx: &mut TestHarness) {
    let app = ctx.spawn_app().await.unwrap();
    let alice = create_student(&ctx.db_pool, 101, "COMPS").await.unwrap();
    let mallory = create_student(&ctx.db_pool, 102, "IT").await.unwrap();
    let staff = create_staff(&ctx.db_pool, 900).await.unwrap();

    app.post_as(&alice, "/api/bookings/book", &json!({"year": "SE"}))
        .await
        .unwrap();

    // Another student can view the ticket but not mark it
    let resp = app.get_as(&mallory, "/api/bookings/101").await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["can_mark"], false);

    let resp = app
        .post_as(&mallory, "/api/bookings/mark-present/101", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Staff can
    let resp = app
        .post_as(&staff, "/api/bookings/mark-present/101", &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["attended"], true);

    let resp = app.get_as(&staff, "/api/bookings/101").await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["attended"], true);
    assert_eq!(body["can_mark"], true);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stream_sends_initial_snapshot(ctx: &mut TestHarness) {
    let app = ctx.spawn_app().await.unwrap();
    let alice = create_student(&ctx.db_pool, 101, "COMPS").await.unwrap();
    app.post_as(&alice, "/api/bookings/book", &json!({"year": "SE"}))
        .await
        .unwrap();

    // Public endpoint: no token needed.
    let mut resp = app
        .client
        .get(app.url("/api/bookings/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let first = tokio::time::timeout(std::time::Duration::from_secs(5), resp.chunk())
        .await
        .expect("timed out waiting for SSE snapshot")
        .unwrap()
        .expect("stream closed before snapshot");
    let text = String::from_utf8_lossy(&first);

    assert!(text.contains("COUNT_UPDATE"), "got: {text}");
    assert!(text.contains("\"remaining\":1199"), "got: {text}");
}
