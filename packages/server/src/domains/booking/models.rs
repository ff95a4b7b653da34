use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Booking row - one seat held by one student.
///
/// Created on `book`, deleted on `cancel`; a re-book after cancel is a
/// fresh row. `attended` flips once at the door and is never reset.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Booking {
    pub id: i64,
    pub student_id: i64,
    pub year: String,
    pub registered_on: DateTime<Utc>,
    pub attended: bool,
}

impl Booking {
    /// Find the booking held by a student, if any
    pub async fn find_by_student(student_id: i64, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM bookings WHERE student_id = $1")
            .bind(student_id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Total committed bookings. The remaining count is always derived
    /// from this, never from a standalone counter.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Mark a student's booking as attended. Returns `false` if the
    /// student holds no booking.
    pub async fn mark_attended(student_id: i64, pool: &PgPool) -> Result<bool> {
        let updated = sqlx::query("UPDATE bookings SET attended = TRUE WHERE student_id = $1")
            .bind(student_id)
            .execute(pool)
            .await?;
        Ok(updated.rows_affected() > 0)
    }
}
