//! Transaction-scoped advisory locking.
//!
//! All booking/cancel operations serialize through a single advisory lock
//! so the capacity invariant only ever needs one critical section. The lock
//! is released automatically when the owning transaction commits or rolls
//! back (`pg_advisory_xact_lock`), so there is no unlock path to forget.

use sqlx::{Postgres, Transaction};

/// Well-known advisory lock key for the seat-booking domain. Every booking
/// and cancellation takes this lock, nothing else does.
pub const BOOKING_LOCK_KEY: i64 = 42;

/// Block until the booking advisory lock is held by this transaction.
///
/// Must be called as the first statement after `begin()`; every check that
/// follows it sees a serialized view of the bookings table.
pub async fn booking_xact_lock(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(BOOKING_LOCK_KEY)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
