//! API end-to-end test suite.
//!
//! Exercises the HTTP surface against a real PostgreSQL database and a real
//! S3-compatible object store (docker compose -f docker/docker-compose.dev.yml up -d).
//! Every test skips silently when TEST_DATABASE_URL is unset so the suite
//! stays green in environments without the backing services.
//!
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test api_e2e

mod test_helpers;

mod test_assets;
mod test_auth;
mod test_generate;
mod test_jobs;
mod test_worker_analytics;
