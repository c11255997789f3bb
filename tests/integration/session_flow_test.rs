//! Session lifecycle scenarios: expiry, persistence and cross-instance sync

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use shopdesk_common::FixedClock;
use shopdesk_session::{MemoryStorage, SessionConfig, SessionStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{record, settle, token_expiring_at, wait_until, TestConsole};

const NOW_MILLIS: i64 = 1_700_000_000_000;
const NOW_SECS: i64 = NOW_MILLIS / 1000;

fn open_tab(storage: MemoryStorage) -> Arc<SessionStore> {
    SessionStore::open_with_clock(
        Arc::new(storage),
        SessionConfig::default(),
        Arc::new(FixedClock::new(NOW_MILLIS)),
    )
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_expiry_clears_every_tab() {
    let first_storage = MemoryStorage::new();
    let second_storage = first_storage.sibling();
    let first = open_tab(first_storage);
    let second = open_tab(second_storage);
    settle().await;

    let (first_events, _first_sub) = record(&first);
    let (second_events, _second_sub) = record(&second);
    settle().await;
    assert_eq!(*first_events.lock().unwrap(), vec![false]);
    assert_eq!(*second_events.lock().unwrap(), vec![false]);

    first.set_token(token_expiring_at(NOW_SECS + 60));
    settle().await;
    assert!(second.is_authenticated());

    // 60s lifetime minus the 30s margin
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(first.is_authenticated());
    assert!(second.is_authenticated());

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert!(!first.is_authenticated());
    assert!(!second.is_authenticated());

    // Both tabs time out at the same instant, so a tab may also hear the
    // other's removal after its own
    for events in [&first_events, &second_events] {
        let events = events.lock().unwrap();
        assert_eq!(events[..2], [false, true]);
        assert!(events.len() >= 3);
        assert!(events[2..].iter().all(|authenticated| !authenticated));
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_logout_in_one_tab_cancels_expiry_in_the_other() {
    let first_storage = MemoryStorage::new();
    let second_storage = first_storage.sibling();
    let first = open_tab(first_storage);
    let second = open_tab(second_storage);
    settle().await;

    first.set_token(token_expiring_at(NOW_SECS + 3600));
    settle().await;
    assert!(second.has_pending_expiry());

    first.clear_token();
    settle().await;
    assert!(!second.is_authenticated());
    assert!(!second.has_pending_expiry());
}

#[test_log::test(tokio::test)]
async fn test_login_schedules_expiry_from_claims() {
    let app = TestConsole::start().await.unwrap();
    let exp = Utc::now().timestamp() + 3600;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": token_expiring_at(exp)})),
        )
        .mount(&app.server)
        .await;

    let console = &app.console;
    console.client.auth().login("admin", "secret").await.unwrap();

    assert!(console.session.is_authenticated());
    assert!(console.session.has_pending_expiry());
    assert_eq!(
        console.session.expires_at().map(|at| at.timestamp()),
        Some(exp)
    );
}

#[test_log::test(tokio::test)]
async fn test_persisted_session_is_restored_with_expiry() {
    let app = TestConsole::start().await.unwrap();
    let exp = Utc::now().timestamp() + 3600;
    app.console.session.set_token(token_expiring_at(exp));

    let reopened = app.reopen().unwrap();
    assert!(reopened.session.is_authenticated());
    assert!(reopened.session.has_pending_expiry());
    assert!(!reopened.session.is_expired());
}

#[test_log::test(tokio::test)]
async fn test_consoles_sharing_a_session_dir_stay_in_sync() {
    let app = TestConsole::start().await.unwrap();
    let other = app.reopen().unwrap();
    let (events, _sub) = record(&other.session);
    settle().await;

    app.console.session.set_token("abc");
    wait_until(|| other.session.get_token().as_deref() == Some("abc")).await;

    // Logging out in one console reaches the other
    app.console.session.clear_token();
    wait_until(|| !other.session.is_authenticated()).await;

    assert_eq!(*events.lock().unwrap(), vec![false, true, false]);
    // The other console's own view never wrote anything back
    assert!(!app.console.session.is_authenticated());
}

#[test_log::test(tokio::test)]
async fn test_opaque_token_never_expires_locally() {
    let app = TestConsole::start().await.unwrap();
    app.console.session.set_token("opaque-token");

    assert!(app.console.session.is_authenticated());
    assert!(!app.console.session.has_pending_expiry());
    assert_eq!(app.console.session.expires_at(), None);
}

mod common;
