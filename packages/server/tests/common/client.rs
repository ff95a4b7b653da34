//! HTTP test client: spins the real app on an ephemeral port and talks to
//! it with reqwest, the way the frontend does.

use std::sync::Arc;

use anyhow::{Context, Result};
use fest_core::common::Student;
use fest_core::domains::auth::JwtService;
use fest_core::kernel::SeatCache;
use fest_core::server::build_app;

use super::TestHarness;

const TEST_JWT_SECRET: &str = "test-jwt-secret";
const TEST_JWT_ISSUER: &str = "fest-server-tests";

pub struct TestApp {
    pub base_url: String,
    pub jwt: Arc<JwtService>,
    pub client: reqwest::Client,
}

impl TestHarness {
    /// Serve the full app (with the real Redis-backed seat cache) on an
    /// ephemeral port.
    pub async fn spawn_app(&self) -> Result<TestApp> {
        let jwt = Arc::new(JwtService::new(
            TEST_JWT_SECRET,
            TEST_JWT_ISSUER.to_string(),
        ));
        let cache = SeatCache::connect(Some(&self.redis_url)).await;
        let app = build_app(self.db_pool.clone(), cache, jwt.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind test listener")?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(TestApp {
            base_url: format!("http://{addr}"),
            jwt,
            client: reqwest::Client::new(),
        })
    }
}

impl TestApp {
    pub fn token_for(&self, student: &Student) -> String {
        self.jwt
            .create_token(
                student.moodle_id,
                &student.username,
                &student.year,
                &student.branch,
                student.is_staff,
                student.is_superuser,
            )
            .expect("token creation should not fail")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get_as(&self, student: &Student, path: &str) -> Result<reqwest::Response> {
        self.client
            .get(self.url(path))
            .bearer_auth(self.token_for(student))
            .send()
            .await
            .map_err(Into::into)
    }

    pub async fn post_as(
        &self,
        student: &Student,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .bearer_auth(self.token_for(student))
            .json(body)
            .send()
            .await
            .map_err(Into::into)
    }

    pub async fn put_as(
        &self,
        student: &Student,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        self.client
            .put(self.url(path))
            .bearer_auth(self.token_for(student))
            .json(body)
            .send()
            .await
            .map_err(Into::into)
    }
}
