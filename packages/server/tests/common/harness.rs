//! Test harness with testcontainers for integration testing.
//!
//! Postgres and Redis containers are started once and shared across the
//! whole test run; each test gets its own freshly-migrated database so
//! booking counts and leaderboard state never bleed between tests.

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use sqlx::PgPool;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

use fest_core::domains::booking::BookingEngine;
use fest_core::kernel::{CountFeed, SeatCache};

/// Shared containers, initialized once on the first test.
struct SharedTestInfra {
    /// Server-level URL without a database name.
    pg_base_url: String,
    redis_url: String,
    // Keep containers alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
    _redis: ContainerAsync<Redis>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

/// Per-test database counter.
static DB_COUNTER: AtomicU32 = AtomicU32::new(0);

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Respect RUST_LOG in test output; try_init avoids double-init panics.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let pg_base_url = format!("postgresql://postgres:postgres@{}:{}", pg_host, pg_port);

        let redis = Redis::default()
            .start()
            .await
            .context("Failed to start Redis container")?;

        let redis_host = redis.get_host().await?;
        let redis_port = redis.get_host_port_ipv4(6379).await?;
        let redis_url = format!("redis://{}:{}", redis_host, redis_port);

        Ok(Self {
            pg_base_url,
            redis_url,
            _postgres: postgres,
            _redis: redis,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Per-test context: an isolated, migrated database plus the shared Redis.
pub struct TestHarness {
    pub db_pool: PgPool,
    pub redis_url: String,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }

    async fn teardown(self) {
        // Database pool is automatically dropped; per-test databases are
        // discarded with the container.
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;

        let db_name = format!("fest_test_{}", DB_COUNTER.fetch_add(1, Ordering::SeqCst));
        let admin = PgPool::connect(&format!("{}/postgres", infra.pg_base_url))
            .await
            .context("Failed to connect for database creation")?;
        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&admin)
            .await
            .context("Failed to create test database")?;

        let db_pool = PgPool::connect(&format!("{}/{}", infra.pg_base_url, db_name))
            .await
            .context("Failed to connect to test database")?;

        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_pool,
            redis_url: infra.redis_url.clone(),
        })
    }

    /// Engine without cache or any live feed consumers, for direct
    /// engine-level tests.
    pub fn booking_engine(&self, capacity: i64) -> BookingEngine {
        BookingEngine::with_capacity(
            self.db_pool.clone(),
            SeatCache::disabled(),
            CountFeed::new(),
            capacity,
        )
    }

    /// Engine wired to the real Redis container.
    pub async fn booking_engine_with_cache(&self, capacity: i64) -> BookingEngine {
        BookingEngine::with_capacity(
            self.db_pool.clone(),
            SeatCache::connect(Some(&self.redis_url)).await,
            CountFeed::new(),
            capacity,
        )
    }
}
