//! Process-wide session registry.
//!
//! All shared mutable state (the session map, retry counters, pending
//! authentication waiters) lives behind the registry; other components
//! never touch it directly. Map mutation is a single atomic step with no
//! suspension in between, so two concurrent creations for the same id
//! cannot race.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock as StdRwLock};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wabridge_commands::{CommandInterpreter, SchoolApi};
use wabridge_models::SessionId;
use wabridge_protocol::{ConnectOptions, ProtocolClient, ProtocolConnector};
use wabridge_store::{CredentialStore, MessageStore};
use wabridge_webhook::WebhookDispatcher;

use crate::config::GatewayConfig;
use crate::error::{Result, SessionError};
use crate::reconnect::ReconnectPolicy;
use crate::router;

/// Authentication options for session creation.
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Link via pairing code instead of QR scan.
    pub use_pairing_code: bool,
    /// Phone number the pairing code is requested for.
    pub phone_number: Option<String>,
}

/// Resolution of a pending session creation, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Enter this code on the phone to link the session.
    PairingCode(String),
    /// Scan this QR payload to link the session.
    Qr(String),
    /// The session resumed from stored credentials.
    Connected,
    /// The session could not be established.
    Failed(String),
}

/// The caller's side of the authentication hand-off.
#[derive(Debug)]
pub struct AuthHandoff {
    rx: oneshot::Receiver<AuthOutcome>,
}

impl AuthHandoff {
    /// Waits for the hand-off to resolve. A session deleted before
    /// resolving yields [`AuthOutcome::Failed`].
    pub async fn wait(self) -> AuthOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| AuthOutcome::Failed("session deleted".to_string()))
    }
}

/// Pending creation caller, held until the first auth-relevant event.
struct AuthWaiter {
    sender: oneshot::Sender<AuthOutcome>,
    options: AuthOptions,
    pairing_requested: bool,
}

/// A live session owned by the registry.
pub struct SessionHandle {
    id: SessionId,
    store: Arc<MessageStore>,
    created_at: DateTime<Utc>,
    client: StdRwLock<Option<Arc<dyn ProtocolClient>>>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn new(id: SessionId, store: Arc<MessageStore>) -> Self {
        Self {
            id,
            store,
            created_at: Utc::now(),
            client: StdRwLock::new(None),
            router: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current protocol client, absent while (re)connecting.
    pub fn client(&self) -> Option<Arc<dyn ProtocolClient>> {
        self.client.read().ok().and_then(|guard| guard.clone())
    }

    /// Live transport state, not registry presence.
    pub fn is_connected(&self) -> bool {
        self.client().is_some_and(|client| client.is_connected())
    }

    fn set_client(&self, client: Arc<dyn ProtocolClient>) {
        if let Ok(mut guard) = self.client.write() {
            *guard = Some(client);
        }
    }

    fn set_router(&self, handle: JoinHandle<()>) {
        if let Ok(mut guard) = self.router.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    fn abort_router(&self) {
        if let Ok(mut guard) = self.router.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// State shared between the registry front-end, routers, and reconnect
/// tasks.
pub(crate) struct Shared {
    pub(crate) sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    retries: Mutex<HashMap<SessionId, u32>>,
    waiters: Mutex<HashMap<SessionId, AuthWaiter>>,
    pub(crate) connector: Arc<dyn ProtocolConnector>,
    pub(crate) credentials: Arc<dyn CredentialStore>,
    pub(crate) webhook: WebhookDispatcher,
    pub(crate) interpreter: CommandInterpreter,
    pub(crate) policy: ReconnectPolicy,
    pub(crate) config: GatewayConfig,
}

impl Shared {
    pub(crate) async fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(id).cloned()
    }

    // --- Retry state ---

    pub(crate) fn attempts(&self, id: &SessionId) -> u32 {
        self.retries
            .lock()
            .map(|map| map.get(id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Increments the attempt counter and returns the new value.
    pub(crate) fn bump_attempts(&self, id: &SessionId) -> u32 {
        self.retries
            .lock()
            .map(|mut map| {
                let attempts = map.entry(id.clone()).or_insert(0);
                *attempts += 1;
                *attempts
            })
            .unwrap_or(0)
    }

    pub(crate) fn clear_attempts(&self, id: &SessionId) {
        if let Ok(mut map) = self.retries.lock() {
            map.remove(id);
        }
    }

    // --- Pending authentication waiters ---

    pub(crate) fn has_waiter(&self, id: &SessionId) -> bool {
        self.waiters
            .lock()
            .map(|map| map.contains_key(id))
            .unwrap_or(false)
    }

    /// Phone number to request a pairing code for, at most once per
    /// waiter.
    pub(crate) fn pairing_phone_to_request(&self, id: &SessionId) -> Option<String> {
        let mut waiters = self.waiters.lock().ok()?;
        let waiter = waiters.get_mut(id)?;
        if !waiter.options.use_pairing_code || waiter.pairing_requested {
            return None;
        }
        waiter.pairing_requested = true;
        waiter.options.phone_number.clone()
    }

    /// Resolves and removes the pending waiter, if any.
    pub(crate) fn resolve_waiter(&self, id: &SessionId, outcome: AuthOutcome) {
        let waiter = self
            .waiters
            .lock()
            .ok()
            .and_then(|mut map| map.remove(id));
        if let Some(waiter) = waiter {
            debug!(session_id = %id, outcome = ?outcome, "Resolving auth hand-off");
            let _ = waiter.sender.send(outcome);
        }
    }

    pub(crate) fn fail_waiter(&self, id: &SessionId, reason: &str) {
        self.resolve_waiter(id, AuthOutcome::Failed(reason.to_string()));
    }

    // --- Connection lifecycle ---

    pub(crate) fn spawn_connect(shared: Arc<Shared>, id: SessionId) {
        tokio::spawn(async move {
            Shared::connect_and_run(shared, id).await;
        });
    }

    /// Opens a transport for the session and starts its event router.
    async fn connect_and_run(shared: Arc<Shared>, id: SessionId) {
        // The session may have been deleted while this task waited.
        let Some(handle) = shared.get(&id).await else {
            debug!(session_id = %id, "Discarding connect for deleted session");
            return;
        };

        if let Err(e) = handle.store.read_from_file().await {
            warn!(session_id = %id, error = %e, "Could not load message store");
        }

        let credentials = match shared.credentials.load(&id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(session_id = %id, error = %e, "Could not load credentials");
                None
            }
        };

        let options = ConnectOptions {
            session_id: id.clone(),
            credentials,
        };
        match shared.connector.connect(options).await {
            Ok(connection) => {
                handle.set_client(Arc::clone(&connection.client));
                let router = tokio::spawn(router::run(
                    Arc::clone(&shared),
                    id.clone(),
                    connection,
                ));
                handle.set_router(router);
                info!(session_id = %id, "Session transport started");
            }
            Err(e) => {
                error!(session_id = %id, error = %e, "Connect failed");
                shared.fail_waiter(&id, "unable to create session");
                Shared::delete(&shared, &id).await;
            }
        }
    }

    /// Schedules a reconnect attempt after `delay`. The attempt is
    /// discarded if the session is deleted in the meantime.
    pub(crate) fn schedule_reconnect(
        shared: Arc<Shared>,
        id: SessionId,
        delay: std::time::Duration,
    ) {
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if shared.get(&id).await.is_none() {
                debug!(session_id = %id, "Discarding reconnect for deleted session");
                return;
            }
            Shared::connect_and_run(shared, id).await;
        });
    }

    /// Removes a session and all its state. Idempotent, and safe to call
    /// from inside the session's own router: the router task is aborted
    /// only after every other step has completed.
    pub(crate) async fn delete(shared: &Arc<Shared>, id: &SessionId) {
        let handle = shared.sessions.write().await.remove(id);

        shared.clear_attempts(id);
        shared.fail_waiter(id, "session deleted");

        if let Err(e) = shared.credentials.remove(id).await {
            warn!(session_id = %id, error = %e, "Failed to remove session files");
        }

        if let Some(handle) = handle {
            info!(session_id = %id, "Session deleted");
            handle.abort_router();
        }
    }
}

/// Creates, looks up, and tears down protocol sessions.
pub struct SessionRegistry {
    inner: Arc<Shared>,
}

impl SessionRegistry {
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn ProtocolConnector>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let webhook = WebhookDispatcher::new(
            config.webhook_url.clone(),
            config.webhook_allowed_events.clone(),
        );
        let interpreter = CommandInterpreter::new(
            config.interpreter.clone(),
            SchoolApi::new(config.api.clone()),
        );
        let policy = ReconnectPolicy::new(config.max_reconnect_attempts, config.reconnect_interval);

        Self {
            inner: Arc::new(Shared {
                sessions: RwLock::new(HashMap::new()),
                retries: Mutex::new(HashMap::new()),
                waiters: Mutex::new(HashMap::new()),
                connector,
                credentials,
                webhook,
                interpreter,
                policy,
                config,
            }),
        }
    }

    /// Registers a new session and begins connecting it.
    ///
    /// Returns an [`AuthHandoff`] that resolves once with the pairing
    /// code, the QR payload, a successful resume, or a failure. Fails
    /// with [`SessionError::AlreadyExists`] if the id is registered.
    pub async fn create(&self, id: SessionId, options: AuthOptions) -> Result<AuthHandoff> {
        self.insert_session(&id).await?;

        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiters) = self.inner.waiters.lock() {
            waiters.insert(
                id.clone(),
                AuthWaiter {
                    sender: tx,
                    options,
                    pairing_requested: false,
                },
            );
        }

        Shared::spawn_connect(Arc::clone(&self.inner), id);
        Ok(AuthHandoff { rx })
    }

    /// Recreates every session found in the credential store, without a
    /// waiting caller: a QR issued during recovery means the credentials
    /// are invalid and the session is logged out and deleted.
    pub async fn restore(&self) -> Result<Vec<SessionId>> {
        let mut restored = Vec::new();
        for id in self.inner.credentials.list().await? {
            match self.insert_session(&id).await {
                Ok(()) => {
                    info!(session_id = %id, "Recovering session");
                    Shared::spawn_connect(Arc::clone(&self.inner), id.clone());
                    restored.push(id);
                }
                Err(SessionError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(restored)
    }

    /// Registers the session handle. A single atomic map mutation: no
    /// await between the existence check and the insert.
    async fn insert_session(&self, id: &SessionId) -> Result<()> {
        let mut sessions = self.inner.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(SessionError::AlreadyExists(id.clone()));
        }
        let store = Arc::new(MessageStore::new(
            self.inner.credentials.message_store_path(id),
        ));
        sessions.insert(id.clone(), Arc::new(SessionHandle::new(id.clone(), store)));
        Ok(())
    }

    /// Looks up a live session.
    pub async fn get(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.inner.get(id).await
    }

    /// Snapshot of registered session ids.
    pub async fn list(&self) -> Vec<SessionId> {
        self.inner.sessions.read().await.keys().cloned().collect()
    }

    /// Whether the session id is registered.
    pub async fn exists(&self, id: &SessionId) -> bool {
        self.inner.sessions.read().await.contains_key(id)
    }

    /// Whether the session's transport is currently connected.
    pub async fn is_connected(&self, id: &SessionId) -> bool {
        self.inner
            .get(id)
            .await
            .is_some_and(|handle| handle.is_connected())
    }

    /// Unregisters a session, removing its credential and store files
    /// and clearing its retry state. Idempotent.
    pub async fn delete(&self, id: &SessionId) {
        Shared::delete(&self.inner, id).await;
    }

    /// Persists every session's message store, for graceful shutdown.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<SessionHandle>> =
            self.inner.sessions.read().await.values().cloned().collect();
        join_all(handles.iter().map(|handle| async move {
            if let Err(e) = handle.store().write_to_file().await {
                warn!(session_id = %handle.id(), error = %e, "Failed to persist message store");
            }
        }))
        .await;
    }
}
