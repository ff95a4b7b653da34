//! Redis cache for the remaining-seats count.
//!
//! Purely a read accelerator: the authoritative count is always derived
//! from the bookings table, and every cache failure degrades silently to
//! the database path. The short TTL bounds how stale a cached value can
//! get under a burst.

use std::time::Duration;

use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, Client,
};
use tracing::warn;

const REMAINING_KEY: &str = "remaining_seats";

/// Cache TTL in seconds. Short, to keep it fresh under burst.
const REMAINING_TTL_SECS: u64 = 5;

/// Best-effort cache handle. `disabled()` (or a failed connect) yields a
/// handle whose every operation is a no-op miss.
#[derive(Clone)]
pub struct SeatCache {
    conn: Option<ConnectionManager>,
}

impl SeatCache {
    /// Connect to Redis. Connection failure logs a warning and returns a
    /// disabled cache; it never blocks startup.
    pub async fn connect(redis_url: Option<&str>) -> Self {
        let Some(url) = redis_url else {
            return Self::disabled();
        };

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(250));

        let conn = match Client::open(url) {
            Ok(client) => match client.get_connection_manager_with_config(config).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    warn!("Redis unavailable, seat cache disabled: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Invalid Redis URL, seat cache disabled: {}", e);
                None
            }
        };

        Self { conn }
    }

    /// A cache that never hits. Used when REDIS_URL is unset and in tests.
    pub fn disabled() -> Self {
        Self { conn: None }
    }

    /// Read the cached remaining count, `None` on miss or any Redis error.
    pub async fn get(&self) -> Option<i64> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<i64>>(REMAINING_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Seat cache read failed: {}", e);
                None
            }
        }
    }

    /// Store the remaining count with the short TTL. Best-effort.
    pub async fn set(&self, remaining: i64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn
            .set_ex::<_, _, ()>(REMAINING_KEY, remaining, REMAINING_TTL_SECS)
            .await
        {
            warn!("Seat cache write failed: {}", e);
        }
    }
}
