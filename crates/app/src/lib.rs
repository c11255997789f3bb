//! Shopdesk admin console composition root
//!
//! Wires the file-backed session store, the request pipeline and the restart
//! hook into a single [`Console`].

use std::sync::Arc;

use shopdesk_client::{ApiClient, SignalRestart};
use shopdesk_common::Config;
use shopdesk_session::{FileStorage, SessionConfig, SessionStore};

/// Everything the console needs to talk to the backend.
pub struct Console {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub client: ApiClient,
    pub restart: SignalRestart,
}

/// Build the console from configuration.
///
/// Must be called inside a Tokio runtime: the session store schedules its
/// expiry and sync tasks on open.
pub fn create_console(config: Config) -> Result<Console, anyhow::Error> {
    let session_config = SessionConfig::from_config(&config)?;
    let storage = Arc::new(FileStorage::new(config.session_dir.clone()));
    let session = SessionStore::open(storage, session_config);

    let restart = SignalRestart::new();
    let client = ApiClient::new(&config, Arc::clone(&session), Arc::new(restart.clone()))?;

    tracing::debug!(
        api_base = %client.base_url(),
        session_dir = %config.session_dir.display(),
        authenticated = session.is_authenticated(),
        "Console created"
    );

    Ok(Console {
        config,
        session,
        client,
        restart,
    })
}
