//! Shared fixtures for the integration tests
//!
//! - Token minting with a chosen `exp`
//! - Console harness pointed at a mock backend with a throwaway session dir
//! - Session transition recorder

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;
use shopdesk_app::Console;
use shopdesk_common::Config;
use shopdesk_session::{SessionStore, Subscription};
use wiremock::MockServer;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_only"; // pragma: allowlist secret

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    exp: i64,
}

/// Signed token whose `exp` claim is `exp` (seconds since epoch)
pub fn token_expiring_at(exp: i64) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &TestClaims {
            sub: "1".to_string(),
            exp,
        },
        &jsonwebtoken::EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("Failed to encode JWT")
}

/// Console bound to a mock backend and a private session directory
pub struct TestConsole {
    pub server: MockServer,
    pub console: Console,
    pub session_dir: tempfile::TempDir,
}

impl TestConsole {
    pub async fn start() -> Result<Self> {
        let server = MockServer::start().await;
        let session_dir = tempfile::tempdir()?;
        let console = shopdesk_app::create_console(config_for(&server, &session_dir))?;

        Ok(Self {
            server,
            console,
            session_dir,
        })
    }

    /// Second console sharing this one's backend and session directory
    pub fn reopen(&self) -> Result<Console> {
        shopdesk_app::create_console(config_for(&self.server, &self.session_dir))
    }
}

fn config_for(server: &MockServer, dir: &tempfile::TempDir) -> Config {
    let mut config = Config::with_api_base(server.uri());
    config.session_dir = dir.path().to_path_buf();
    config
}

/// Records every authentication state a store reports
pub fn record(store: &SessionStore) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = store.on_change(move |authenticated| {
        sink.lock().unwrap().push(authenticated);
    });
    (events, subscription)
}

pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds; panics after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("condition not met within 5s");
}
