//! Seat booking engine.
//!
//! Serializes every booking and cancellation through the booking advisory
//! lock, keeping the capacity invariant trivially correct: the existence
//! check, capacity check and insert run as one atomic unit that no other
//! booking transaction can interleave with. The unique constraint on
//! `bookings.student_id` backstops anything that slips past the check.
//!
//! Cache writes and realtime fanout happen strictly after commit and are
//! best-effort; a broadcast failure never rolls back a booking.

use sqlx::PgPool;
use tracing::debug;

use crate::domains::booking::Booking;
use crate::error::ApiError;
use crate::kernel::{lock, CountFeed, SeatCache};

/// Total seats in the pool, shared across all years and branches.
pub const TOTAL_CAPACITY: i64 = 1200;

#[derive(Clone)]
pub struct BookingEngine {
    pool: PgPool,
    cache: SeatCache,
    feed: CountFeed,
    capacity: i64,
}

impl BookingEngine {
    pub fn new(pool: PgPool, cache: SeatCache, feed: CountFeed) -> Self {
        Self::with_capacity(pool, cache, feed, TOTAL_CAPACITY)
    }

    /// Engine with a non-default capacity. Tests use this to exercise the
    /// full-house path without inserting 1200 rows.
    pub fn with_capacity(pool: PgPool, cache: SeatCache, feed: CountFeed, capacity: i64) -> Self {
        Self {
            pool,
            cache,
            feed,
            capacity,
        }
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn feed(&self) -> &CountFeed {
        &self.feed
    }

    /// Book a seat for a student. Returns the new remaining count.
    ///
    /// Both preconditions (no existing booking, seats left) are evaluated
    /// inside the lock; pre-lock reads would be stale the moment another
    /// transaction commits.
    pub async fn book(&self, student_id: i64, year: &str) -> Result<i64, ApiError> {
        let mut tx = self.pool.begin().await?;
        lock::booking_xact_lock(&mut tx).await?;

        let already_booked: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE student_id = $1)")
                .bind(student_id)
                .fetch_one(&mut *tx)
                .await?;
        if already_booked {
            return Err(ApiError::conflict("Student already booked."));
        }

        let booked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&mut *tx)
            .await?;
        if booked >= self.capacity {
            return Err(ApiError::conflict("Capacity full."));
        }

        let inserted = sqlx::query("INSERT INTO bookings (student_id, year) VALUES ($1, $2)")
            .bind(student_id)
            .bind(year)
            .execute(&mut *tx)
            .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(ApiError::conflict("Booking conflict."));
            }
            Err(e) => return Err(e.into()),
        }

        let remaining = self.remaining_in_tx(&mut tx).await?;
        tx.commit().await?;

        self.publish_remaining(remaining).await;
        Ok(remaining)
    }

    /// Cancel a student's booking. Returns the new remaining count.
    pub async fn cancel(&self, student_id: i64) -> Result<i64, ApiError> {
        let mut tx = self.pool.begin().await?;
        lock::booking_xact_lock(&mut tx).await?;

        let deleted = sqlx::query("DELETE FROM bookings WHERE student_id = $1")
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ApiError::not_found("No booking found."));
        }

        let remaining = self.remaining_in_tx(&mut tx).await?;
        tx.commit().await?;

        self.publish_remaining(remaining).await;
        Ok(remaining)
    }

    /// Remaining seats, cache-first.
    ///
    /// May be transiently stale (bounded by the cache TTL); the write path
    /// re-derives the count under the lock, so staleness here never leaks
    /// into the capacity invariant. Never takes the booking lock.
    pub async fn remaining(&self) -> Result<i64, ApiError> {
        if let Some(cached) = self.cache.get().await {
            return Ok(cached);
        }

        let booked = Booking::count(&self.pool).await?;
        let remaining = self.capacity - booked;

        // Opportunistic repopulate for the next reader
        self.cache.set(remaining).await;

        Ok(remaining)
    }

    /// Derive remaining from the row count within the open transaction.
    async fn remaining_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<i64, sqlx::Error> {
        let booked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&mut **tx)
            .await?;
        Ok(self.capacity - booked)
    }

    /// Post-commit side effects: refresh the cache and fan out to viewers.
    /// Both are best-effort; failures are logged inside SeatCache/CountFeed
    /// and never surface to the caller.
    async fn publish_remaining(&self, remaining: i64) {
        debug!(remaining, "Broadcasting remaining seats");
        self.cache.set(remaining).await;
        self.feed.publish(remaining);
    }
}
