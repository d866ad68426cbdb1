use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::CredentialSource;
use crate::router::{Navigator, Route};
use crate::storage::{keys, KeyValueStore};

use super::{AuthError, CredentialProbe, CredentialStore};

/// Who is logged in, as last persisted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_authenticated: bool,
    pub active_identity: Option<String>,
    pub active_secret: Option<String>,
    pub remembered_identity: Option<String>,
    pending_validations: u32,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("is_authenticated", &self.is_authenticated)
            .field("active_identity", &self.active_identity)
            .field("active_secret", &self.active_secret.as_ref().map(|_| "<redacted>"))
            .field("remembered_identity", &self.remembered_identity)
            .field("pending_validations", &self.pending_validations)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    /// A registration probe is in flight.
    Authenticating,
    Authenticated,
}

impl SessionState {
    pub fn phase(&self) -> SessionPhase {
        if self.is_authenticated {
            SessionPhase::Authenticated
        } else if self.pending_validations > 0 {
            SessionPhase::Authenticating
        } else {
            SessionPhase::Anonymous
        }
    }
}

/// Owner of the live session state.
///
/// Hydrated once from storage. Only `SessionManager` can write to it;
/// everyone else reads through `SessionView`.
pub struct SessionSignal {
    tx: watch::Sender<SessionState>,
}

impl SessionSignal {
    /// Build the initial state from the persisted session keys.
    pub fn hydrate(kv: &dyn KeyValueStore) -> Result<Self> {
        let active_secret = kv.get(keys::ACTIVE_TOKEN)?.filter(|t| !t.is_empty());
        let active_identity = kv.get(keys::ACTIVE_IDENTITY)?.filter(|i| !i.is_empty());
        let remembered_identity = kv.get(keys::REMEMBERED_IDENTITY)?.filter(|i| !i.is_empty());

        let state = SessionState {
            is_authenticated: active_secret.is_some(),
            active_identity,
            active_secret,
            remembered_identity,
            pending_validations: 0,
        };
        debug!(authenticated = state.is_authenticated, "Session hydrated");

        let (tx, _rx) = watch::channel(state);
        Ok(Self { tx })
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            rx: self.tx.subscribe(),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut SessionState)) {
        self.tx.send_modify(apply);
    }

    fn begin_validation(&self) -> ValidationGuard<'_> {
        self.update(|s| s.pending_validations += 1);
        ValidationGuard { signal: self }
    }
}

/// Keeps the session in `Authenticating` while a probe is pending.
struct ValidationGuard<'a> {
    signal: &'a SessionSignal,
}

impl Drop for ValidationGuard<'_> {
    fn drop(&mut self) {
        self.signal
            .update(|s| s.pending_validations = s.pending_validations.saturating_sub(1));
    }
}

/// Read-only, cloneable handle on the session state.
#[derive(Clone)]
pub struct SessionView {
    rx: watch::Receiver<SessionState>,
}

impl SessionView {
    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated
    }

    pub fn active_identity(&self) -> Option<String> {
        self.rx.borrow().active_identity.clone()
    }

    pub fn remembered_identity(&self) -> Option<String> {
        self.rx.borrow().remembered_identity.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.rx.borrow().phase()
    }

    /// Wait for the next change. Returns false once the owner is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

impl CredentialSource for SessionView {
    fn active_credential(&self) -> Option<String> {
        self.rx.borrow().active_secret.clone()
    }
}

/// Registration, login, and logout.
///
/// The only writer of the session keys in storage and of the
/// `SessionSignal` it was built with.
pub struct SessionManager<P> {
    kv: Arc<dyn KeyValueStore>,
    credentials: CredentialStore,
    signal: SessionSignal,
    probe: P,
    navigator: Arc<dyn Navigator>,
}

impl<P: CredentialProbe> SessionManager<P> {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        signal: SessionSignal,
        probe: P,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(kv.clone()),
            kv,
            signal,
            probe,
            navigator,
        }
    }

    pub fn view(&self) -> SessionView {
        self.signal.view()
    }

    pub fn is_authenticated(&self) -> bool {
        self.signal.tx.borrow().is_authenticated
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Register a new user after the catalog service accepts `secret`.
    ///
    /// Does not log in. Nothing is written unless the probe succeeded and
    /// the identity is free.
    pub async fn register(&self, identity: &str, secret: &str) -> Result<(), AuthError> {
        let (identity, secret) = normalize(identity, secret)?;

        // Taken identities fail the same way whatever key was supplied
        if self.credentials.exists(identity)? {
            return Err(AuthError::DuplicateIdentity(identity.to_string()));
        }

        {
            let _pending = self.signal.begin_validation();
            if let Err(e) = self.probe.validate_credential(secret).await {
                warn!(identity = %identity, error = %e, "Credential validation failed");
                return Err(AuthError::InvalidExternalCredential(e));
            }
        }

        self.credentials.register(identity, secret)?;
        info!(identity = %identity, "Registration successful");
        Ok(())
    }

    /// Log in with a registered identity and its key, then go to the landing page.
    pub fn login(&self, identity: &str, secret: &str, remember: bool) -> Result<(), AuthError> {
        let (identity, secret) = normalize(identity, secret)?;

        let user = self
            .credentials
            .find_match(identity, secret)?
            .ok_or(AuthError::InvalidCredential)?;

        let remembered = if remember {
            Some(user.identity.clone())
        } else {
            None
        };

        self.write_session_keys(&[
            (keys::ACTIVE_TOKEN, Some(user.secret.as_str())),
            (keys::ACTIVE_IDENTITY, Some(user.identity.as_str())),
            (keys::REMEMBERED_IDENTITY, remembered.as_deref()),
        ])?;

        self.signal.update(|s| {
            s.is_authenticated = true;
            s.active_identity = Some(user.identity.clone());
            s.active_secret = Some(user.secret.clone());
            s.remembered_identity = remembered;
        });

        info!(identity = %user.identity, remember, "Login successful");
        self.navigator.navigate(Route::Home);
        Ok(())
    }

    /// End the session and go to the sign-in page. The remembered identity is kept.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.write_session_keys(&[(keys::ACTIVE_TOKEN, None), (keys::ACTIVE_IDENTITY, None)])?;

        self.signal.update(|s| {
            s.is_authenticated = false;
            s.active_identity = None;
            s.active_secret = None;
        });

        info!("Logged out");
        self.navigator.navigate(Route::SignIn);
        Ok(())
    }

    /// Apply all writes (`None` removes) or, on failure, put back what was there.
    fn write_session_keys(&self, writes: &[(&str, Option<&str>)]) -> Result<()> {
        let mut previous = Vec::with_capacity(writes.len());
        for (key, _) in writes {
            previous.push((*key, self.kv.get(key)?));
        }

        for (key, value) in writes {
            let result = match value {
                Some(value) => self.kv.set(key, value),
                None => self.kv.remove(key),
            };
            if let Err(e) = result {
                self.restore(&previous);
                return Err(e);
            }
        }
        Ok(())
    }

    fn restore(&self, previous: &[(&str, Option<String>)]) {
        for (key, value) in previous {
            let result = match value {
                Some(value) => self.kv.set(key, value),
                None => self.kv.remove(key),
            };
            if let Err(e) = result {
                warn!(key = %key, error = %e, "Failed to restore session key");
            }
        }
    }
}

/// Trim the identity and reject blank input. The secret is compared as given.
fn normalize<'a>(identity: &'a str, secret: &'a str) -> Result<(&'a str, &'a str), AuthError> {
    let identity = identity.trim();
    if identity.is_empty() || secret.trim().is_empty() {
        return Err(AuthError::MissingCredentials);
    }
    Ok((identity, secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::api::{ApiError, ApiResult, CatalogGateway};
    use crate::config::Config;
    use crate::router::guard;
    use crate::storage::MemoryStore;

    /// Accepts only the listed keys.
    struct StubProbe {
        accepted: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl StubProbe {
        fn accepting(accepted: &[&'static str]) -> Self {
            Self {
                accepted: accepted.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CredentialProbe for StubProbe {
        async fn validate_credential(&self, secret: &str) -> ApiResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accepted.contains(&secret) {
                Ok(())
            } else {
                Err(ApiError::Unauthorized)
            }
        }
    }

    #[derive(Default)]
    struct RecordingNavigator(Mutex<Vec<Route>>);

    impl RecordingNavigator {
        fn routes(&self) -> Vec<Route> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: Route) {
            self.0.lock().unwrap().push(route);
        }
    }

    /// Store whose writes to one key always fail.
    struct FailingKey {
        inner: MemoryStore,
        failing: &'static str,
    }

    impl KeyValueStore for FailingKey {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.failing {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    struct Harness {
        kv: Arc<dyn KeyValueStore>,
        navigator: Arc<RecordingNavigator>,
        session: SessionManager<StubProbe>,
    }

    fn harness_with(kv: Arc<dyn KeyValueStore>, accepted: &[&'static str]) -> Harness {
        let navigator = Arc::new(RecordingNavigator::default());
        let signal = SessionSignal::hydrate(kv.as_ref()).unwrap();
        let session = SessionManager::new(
            kv.clone(),
            signal,
            StubProbe::accepting(accepted),
            navigator.clone(),
        );
        Harness {
            kv,
            navigator,
            session,
        }
    }

    fn harness(accepted: &[&'static str]) -> Harness {
        harness_with(Arc::new(MemoryStore::new()), accepted)
    }

    #[tokio::test]
    async fn test_register_does_not_log_in() {
        let h = harness(&["good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();

        assert!(h.session.credentials().exists("a@x.com").unwrap());
        assert!(!h.session.is_authenticated());
        assert!(h.navigator.routes().is_empty());
        assert_eq!(h.session.view().phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_rejected_key_leaves_store_untouched() {
        let h = harness(&["good-key"]);

        let err = h.session.register("a@x.com", "bad-key").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidExternalCredential(ApiError::Unauthorized)));
        assert!(!h.session.credentials().exists("a@x.com").unwrap());
        assert_eq!(h.kv.get(keys::USERS).unwrap(), None);
        assert_eq!(h.session.view().phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_duplicate_identity_fails_for_any_key() {
        let h = harness(&["good-key", "other-good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();

        for secret in ["good-key", "other-good-key", "bad-key"] {
            let err = h.session.register("a@x.com", secret).await.unwrap_err();
            assert!(matches!(err, AuthError::DuplicateIdentity(_)), "{:?}", err);
        }
        // Only the first registration hit the network
        assert_eq!(h.session.probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_input_rejected_before_probe() {
        let h = harness(&["good-key"]);

        let err = h.session.register("  ", "good-key").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        assert!(matches!(
            h.session.login("a@x.com", "", false),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            h.session.register("a@x.com", "   ").await,
            Err(AuthError::MissingCredentials)
        ));
        assert_eq!(h.session.probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_requires_exact_pair() {
        let h = harness(&["good-key", "other-good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();
        h.session.register("b@x.com", "other-good-key").await.unwrap();

        assert!(matches!(
            h.session.login("a@x.com", "other-good-key", false),
            Err(AuthError::InvalidCredential)
        ));
        assert!(matches!(
            h.session.login("nobody@x.com", "good-key", false),
            Err(AuthError::InvalidCredential)
        ));
        assert!(!h.session.is_authenticated());
        assert_eq!(h.kv.get(keys::ACTIVE_TOKEN).unwrap(), None);

        // Identities are trimmed, keys must match exactly
        assert!(matches!(
            h.session.login("a@x.com", " good-key ", false),
            Err(AuthError::InvalidCredential)
        ));

        h.session.login(" a@x.com ", "good-key", false).unwrap();
        assert!(h.session.is_authenticated());
        assert_eq!(h.session.view().active_identity().as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_login_persists_and_navigates() {
        let h = harness(&["good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();

        h.session.login("a@x.com", "good-key", true).unwrap();

        assert_eq!(h.kv.get(keys::ACTIVE_TOKEN).unwrap().as_deref(), Some("good-key"));
        assert_eq!(h.kv.get(keys::ACTIVE_IDENTITY).unwrap().as_deref(), Some("a@x.com"));
        assert_eq!(h.kv.get(keys::REMEMBERED_IDENTITY).unwrap().as_deref(), Some("a@x.com"));
        assert_eq!(h.navigator.routes(), vec![Route::Home]);

        // Logging in again without "remember me" clears it
        h.session.login("a@x.com", "good-key", false).unwrap();
        assert_eq!(h.kv.get(keys::REMEMBERED_IDENTITY).unwrap(), None);
        assert_eq!(h.session.view().remembered_identity(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_session_keeps_remembered() {
        let h = harness(&["good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();
        h.session.login("a@x.com", "good-key", true).unwrap();

        h.session.logout().unwrap();

        assert!(!h.session.is_authenticated());
        assert_eq!(h.kv.get(keys::ACTIVE_TOKEN).unwrap(), None);
        assert_eq!(h.kv.get(keys::ACTIVE_IDENTITY).unwrap(), None);
        assert_eq!(h.session.view().remembered_identity().as_deref(), Some("a@x.com"));
        assert_eq!(h.navigator.routes(), vec![Route::Home, Route::SignIn]);
    }

    #[tokio::test]
    async fn test_session_survives_reload() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = harness_with(kv.clone(), &["good-key"]);
        first.session.register("a@x.com", "good-key").await.unwrap();
        first.session.login("a@x.com", "good-key", false).unwrap();
        drop(first);

        let reloaded = harness_with(kv, &[]);
        let view = reloaded.session.view();
        assert!(view.is_authenticated());
        assert_eq!(view.active_identity().as_deref(), Some("a@x.com"));
        assert_eq!(view.active_credential().as_deref(), Some("good-key"));
    }

    #[tokio::test]
    async fn test_failed_login_write_rolls_back() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(FailingKey {
            inner: MemoryStore::new(),
            failing: keys::ACTIVE_IDENTITY,
        });
        let h = harness_with(kv, &["good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();

        let err = h.session.login("a@x.com", "good-key", false).unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));

        // The token written before the failure was put back
        assert_eq!(h.kv.get(keys::ACTIVE_TOKEN).unwrap(), None);
        assert!(!h.session.is_authenticated());
        assert!(h.navigator.routes().is_empty());
    }

    #[tokio::test]
    async fn test_view_observes_changes() {
        let h = harness(&["good-key"]);
        h.session.register("a@x.com", "good-key").await.unwrap();

        let mut view = h.session.view();
        // Consume the updates made while registering
        view.rx.borrow_and_update();

        h.session.login("a@x.com", "good-key", false).unwrap();
        assert!(view.changed().await);
        assert!(view.is_authenticated());
    }

    #[tokio::test]
    async fn test_guard_follows_session() {
        let h = harness(&["good-key"]);
        let view = h.session.view();

        assert_eq!(guard(Route::Wishlist, &view), Route::SignIn);
        assert_eq!(guard(Route::SignIn, &view), Route::SignIn);

        h.session.register("a@x.com", "good-key").await.unwrap();
        h.session.login("a@x.com", "good-key", false).unwrap();
        assert_eq!(guard(Route::Wishlist, &view), Route::Wishlist);
        assert_eq!(guard(Route::SignIn, &view), Route::SignIn);

        h.session.logout().unwrap();
        assert_eq!(guard(Route::Popular, &view), Route::SignIn);
    }

    #[tokio::test]
    async fn test_gateway_follows_login_and_logout() {
        let h = harness(&["good-key"]);
        let config = Config {
            api_base_url: "https://catalog.test/3".to_string(),
            fallback_api_key: Some("demo-key".to_string()),
            ..Config::default()
        };
        let gateway = CatalogGateway::new(&config, Arc::new(h.session.view())).unwrap();

        let api_key = |gateway: &CatalogGateway| {
            let request = gateway.build_request("/movie/popular", &[], None).unwrap();
            let header = request
                .headers()
                .get(reqwest::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let query = request
                .url()
                .query_pairs()
                .find(|(k, _)| k == "api_key")
                .map(|(_, v)| v.into_owned());
            (header, query)
        };

        assert_eq!(
            api_key(&gateway),
            (Some("Bearer demo-key".to_string()), Some("demo-key".to_string()))
        );

        h.session.register("a@x.com", "good-key").await.unwrap();
        h.session.login("a@x.com", "good-key", false).unwrap();
        assert_eq!(
            api_key(&gateway),
            (Some("Bearer good-key".to_string()), Some("good-key".to_string()))
        );

        h.session.logout().unwrap();
        assert_eq!(
            api_key(&gateway),
            (Some("Bearer demo-key".to_string()), Some("demo-key".to_string()))
        );
    }

    #[tokio::test]
    async fn test_pending_probe_reports_authenticating() {
        /// Probe that checks the phase while it is running.
        struct PhaseProbe(SessionView);

        impl CredentialProbe for PhaseProbe {
            async fn validate_credential(&self, _secret: &str) -> ApiResult<()> {
                assert_eq!(self.0.phase(), SessionPhase::Authenticating);
                Ok(())
            }
        }

        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let signal = SessionSignal::hydrate(kv.as_ref()).unwrap();
        let view = signal.view();
        let session = SessionManager::new(
            kv,
            signal,
            PhaseProbe(view.clone()),
            Arc::new(crate::router::NoopNavigator),
        );

        session.register("a@x.com", "key").await.unwrap();
        assert_eq!(view.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn test_unreachable_service_rejects_registration() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let signal = SessionSignal::hydrate(kv.as_ref()).unwrap();
        let config = Config {
            api_base_url: format!("http://{}/3", addr),
            request_timeout_secs: 5,
            ..Config::default()
        };
        let gateway = Arc::new(CatalogGateway::new(&config, Arc::new(signal.view())).unwrap());
        let session = SessionManager::new(
            kv.clone(),
            signal,
            gateway,
            Arc::new(crate::router::NoopNavigator),
        );

        let err = session.register("a@x.com", "TOPSECRET-KEY").await.unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidExternalCredential(ApiError::ServiceUnavailable(_))),
            "{:?}",
            err
        );
        assert!(!format!("{:#}", anyhow::Error::new(err)).contains("TOPSECRET-KEY"));
        assert_eq!(kv.get(keys::USERS).unwrap(), None);
        assert_eq!(session.view().phase(), SessionPhase::Anonymous);
    }
}
