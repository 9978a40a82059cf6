//! Credential state machine with proactive, coalesced refresh
//!
//! The manager holds the only copy of the live credential. Its state moves
//! through:
//! - Valid → Refreshing (token inside the expiry margin)
//! - Refreshing → Valid (exchange succeeded)
//! - Refreshing → Invalid (exchange rejected, failed or timed out)
//! - Invalid → Valid (new credential installed out-of-band)
//!
//! `Expiring` is not stored: it is a Valid credential inside the margin and is
//! only visible through `status()`.
//!
//! The state lock is never held across the token exchange. The exchange runs
//! in its own task and every caller that arrives while it is running awaits
//! the same shared future, so a rotated refresh token is only ever used once.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::credentials::{Credential, now_millis};
use crate::error::{Error, Result};
use crate::settings::OAuthSettings;
use crate::token::{OAuthRefresher, TokenRefresher};

/// Observer notified after every successful refresh.
///
/// Errors are logged and otherwise ignored; they never fail the refresh.
pub trait RefreshSubscriber: Send + Sync {
    fn on_refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;
}

/// Adapter so plain closures can subscribe.
struct FnSubscriber<F>(F);

impl<F> RefreshSubscriber for FnSubscriber<F>
where
    F: Fn(&Credential) -> anyhow::Result<()> + Send + Sync,
{
    fn on_refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        let outcome = (self.0)(credential);
        Box::pin(async move { outcome })
    }
}

/// Externally visible credential state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    Expiring,
    Refreshing,
    Invalid,
}

impl CredentialStatus {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialStatus::Valid => "valid",
            CredentialStatus::Expiring => "expiring",
            CredentialStatus::Refreshing => "refreshing",
            CredentialStatus::Invalid => "invalid",
        }
    }
}

/// Refresh tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Refresh once the token expires within this window
    pub expiry_margin: Duration,
    /// Upper bound on one token exchange; exceeding it invalidates the session
    pub refresh_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            expiry_margin: Duration::from_secs(crate::constants::DEFAULT_EXPIRY_MARGIN_SECS),
            refresh_timeout: Duration::from_secs(crate::constants::DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }
}

impl From<&OAuthSettings> for SessionSettings {
    fn from(settings: &OAuthSettings) -> Self {
        Self {
            expiry_margin: settings.expiry_margin(),
            refresh_timeout: settings.refresh_timeout(),
        }
    }
}

type PendingRefresh = Shared<BoxFuture<'static, Result<Arc<Credential>>>>;

enum State {
    Valid(Arc<Credential>),
    Refreshing(PendingRefresh),
    Invalid(String),
}

/// State plus a generation counter bumped on every transition that replaces
/// the credential. A refresh only commits if the generation it started from
/// is still current.
struct Slot {
    state: State,
    generation: u64,
}

/// What `get_valid_credential` decided while holding the lock.
enum Next {
    Serve(Arc<Credential>),
    Join(PendingRefresh),
    Refresh(Arc<dyn TokenRefresher>, Secret<String>),
    Expired,
    Fail(String),
}

struct Inner {
    slot: Mutex<Slot>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    subscribers: RwLock<Vec<Arc<dyn RefreshSubscriber>>>,
    settings: SessionSettings,
}

/// Owner of the live bearer credential.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    /// Manage `credential`, refreshing it through `refresher`.
    pub fn new(
        credential: Credential,
        refresher: Arc<dyn TokenRefresher>,
        settings: SessionSettings,
    ) -> Self {
        Self::build(credential, Some(refresher), settings)
    }

    /// Manage `credential` against the configured OAuth token endpoint.
    pub fn with_oauth(
        credential: Credential,
        client: reqwest::Client,
        oauth: Arc<OAuthSettings>,
    ) -> Self {
        let settings = SessionSettings::from(oauth.as_ref());
        let refresher = Arc::new(OAuthRefresher::new(client, oauth));
        Self::new(credential, refresher, settings)
    }

    /// Serve a fixed, non-expiring access token (no refresh capability).
    pub fn from_static(access_token: impl Into<Secret<String>>) -> Self {
        Self::build(
            Credential::bearer(access_token),
            None,
            SessionSettings::default(),
        )
    }

    fn build(
        credential: Credential,
        refresher: Option<Arc<dyn TokenRefresher>>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    state: State::Valid(Arc::new(credential)),
                    generation: 0,
                }),
                refresher,
                subscribers: RwLock::new(Vec::new()),
                settings,
            }),
        }
    }

    /// Return a credential that is not inside the expiry margin.
    ///
    /// Serves the current credential without suspending when it is fresh.
    /// Otherwise starts a refresh, or joins the one already in flight, and
    /// waits for it. Fails fast with `Error::CredentialInvalid` while the
    /// session is invalid.
    pub async fn get_valid_credential(&self) -> Result<Arc<Credential>> {
        let pending = {
            let mut slot = self.inner.slot.lock().await;
            let next = self.inner.decide(&slot.state);
            match next {
                Next::Serve(credential) => return Ok(credential),
                Next::Fail(reason) => return Err(Error::CredentialInvalid(reason)),
                Next::Join(pending) => {
                    debug!(generation = slot.generation, "joining in-flight token refresh");
                    pending
                }
                Next::Expired => {
                    let reason = String::from("access token expired and cannot be refreshed");
                    warn!(generation = slot.generation, "{reason}");
                    slot.generation += 1;
                    slot.state = State::Invalid(reason.clone());
                    return Err(Error::CredentialInvalid(reason));
                }
                Next::Refresh(refresher, refresh) => {
                    slot.generation += 1;
                    let generation = slot.generation;
                    debug!(generation, "token inside expiry margin, starting refresh");
                    let pending = self.spawn_refresh(refresher, refresh, generation);
                    slot.state = State::Refreshing(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Register a subscriber called with every refreshed credential.
    pub async fn subscribe(&self, subscriber: Arc<dyn RefreshSubscriber>) {
        self.inner.subscribers.write().await.push(subscriber);
    }

    /// Register a closure called with every refreshed credential.
    pub async fn on_token_refresh<F>(&self, callback: F)
    where
        F: Fn(&Credential) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber(callback))).await;
    }

    /// Replace the credential out-of-band.
    ///
    /// This is the only way out of `Invalid`. A refresh still in flight will
    /// not overwrite the installed credential when it completes.
    pub async fn install_credential(&self, credential: Credential) {
        let mut slot = self.inner.slot.lock().await;
        let from = self.inner.status_of(&slot.state);
        slot.generation += 1;
        slot.state = State::Valid(Arc::new(credential));
        info!(
            generation = slot.generation,
            from = from.label(),
            "credential installed"
        );
    }

    /// Current state, with `Expiring` derived from the expiry margin.
    pub async fn status(&self) -> CredentialStatus {
        let slot = self.inner.slot.lock().await;
        self.inner.status_of(&slot.state)
    }

    /// Run the exchange in its own task so abandoned waiters never leave the
    /// state stuck in `Refreshing`.
    fn spawn_refresh(
        &self,
        refresher: Arc<dyn TokenRefresher>,
        refresh: Secret<String>,
        generation: u64,
    ) -> PendingRefresh {
        let task = tokio::spawn(Arc::clone(&self.inner).run_refresh(refresher, refresh, generation));
        let inner = Arc::clone(&self.inner);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let reason = format!("token refresh task failed: {e}");
                    inner
                        .commit(generation, Err(Error::CredentialInvalid(reason)))
                        .await
                        .0
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    fn margin_millis(&self) -> u64 {
        self.settings.expiry_margin.as_millis() as u64
    }

    fn status_of(&self, state: &State) -> CredentialStatus {
        match state {
            State::Valid(credential) => {
                if credential.expires_within(self.margin_millis(), now_millis()) {
                    CredentialStatus::Expiring
                } else {
                    CredentialStatus::Valid
                }
            }
            State::Refreshing(_) => CredentialStatus::Refreshing,
            State::Invalid(_) => CredentialStatus::Invalid,
        }
    }

    fn decide(&self, state: &State) -> Next {
        match state {
            State::Invalid(reason) => Next::Fail(reason.clone()),
            State::Refreshing(pending) => Next::Join(pending.clone()),
            State::Valid(credential) => {
                let now = now_millis();
                if !credential.expires_within(self.margin_millis(), now) {
                    return Next::Serve(Arc::clone(credential));
                }
                match (&self.refresher, &credential.refresh_token) {
                    (Some(refresher), Some(refresh)) => {
                        Next::Refresh(Arc::clone(refresher), refresh.clone())
                    }
                    // No way to refresh: keep serving until it actually expires
                    _ if !credential.is_expired_at(now) => Next::Serve(Arc::clone(credential)),
                    _ => Next::Expired,
                }
            }
        }
    }

    async fn run_refresh(
        self: Arc<Self>,
        refresher: Arc<dyn TokenRefresher>,
        refresh: Secret<String>,
        generation: u64,
    ) -> Result<Arc<Credential>> {
        let issued_at = now_millis();
        let timeout = self.settings.refresh_timeout;
        let outcome = match tokio::time::timeout(timeout, refresher.refresh(refresh.expose())).await
        {
            Ok(Ok(response)) => Ok(Arc::new(Credential::from_token_response(
                response,
                issued_at,
                Some(&refresh),
            ))),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::RefreshTimeout(timeout)),
        };

        let (committed, fresh) = self.commit(generation, outcome).await;
        if fresh {
            if let Ok(credential) = &committed {
                self.notify(credential).await;
            }
        }
        committed
    }

    /// Apply a refresh outcome if `generation` is still the refreshing one.
    ///
    /// Returns the outcome callers should see and whether a new credential
    /// was committed.
    async fn commit(
        &self,
        generation: u64,
        outcome: Result<Arc<Credential>>,
    ) -> (Result<Arc<Credential>>, bool) {
        let mut slot = self.slot.lock().await;
        let current = slot.generation == generation && matches!(slot.state, State::Refreshing(_));

        if !current {
            debug!(
                generation,
                current = slot.generation,
                status = self.status_of(&slot.state).label(),
                "refresh outcome superseded"
            );
            let seen = match &slot.state {
                State::Valid(credential) => Ok(Arc::clone(credential)),
                State::Invalid(reason) => Err(Error::CredentialInvalid(reason.clone())),
                State::Refreshing(_) => outcome,
            };
            return (seen, false);
        }

        match outcome {
            Ok(credential) => {
                slot.state = State::Valid(Arc::clone(&credential));
                info!(
                    generation,
                    expires_at = credential.expires_at,
                    "token refresh succeeded"
                );
                record_refresh("success");
                (Ok(credential), true)
            }
            Err(e) => {
                let reason = format!("token refresh failed: {e}");
                warn!(generation, error = %e, "token refresh failed, credential invalid");
                slot.state = State::Invalid(reason.clone());
                record_refresh(match e {
                    Error::RefreshTimeout(_) => "timeout",
                    Error::InvalidCredentials(_) => "rejected",
                    _ => "error",
                });
                (Err(Error::CredentialInvalid(reason)), false)
            }
        }
    }

    async fn notify(&self, credential: &Credential) {
        let subscribers = self.subscribers.read().await.clone();
        for (index, subscriber) in subscribers.iter().enumerate() {
            if let Err(e) = subscriber.on_refresh(credential).await {
                warn!(subscriber = index, error = %e, "refresh subscriber failed");
            }
        }
    }
}

fn record_refresh(outcome: &'static str) {
    metrics::counter!("oauth_token_refresh_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::token::TokenResponse;

    /// Refresher that counts exchanges and answers after `delay`.
    struct CountingRefresher {
        calls: AtomicUsize,
        delay: Duration,
        outcome: fn(usize) -> Result<TokenResponse>,
    }

    impl CountingRefresher {
        fn new(delay: Duration, outcome: fn(usize) -> Result<TokenResponse>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                outcome,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenRefresher for CountingRefresher {
        fn refresh<'a>(
            &'a self,
            _refresh_token: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                (self.outcome)(call)
            })
        }
    }

    fn issued(call: usize) -> Result<TokenResponse> {
        Ok(serde_json::from_value(serde_json::json!({
            "access_token": format!("at_{call}"),
            "expires_in": 3600
        }))
        .unwrap())
    }

    fn rejected(_call: usize) -> Result<TokenResponse> {
        Err(Error::InvalidCredentials("refresh token revoked".into()))
    }

    fn expiring_credential() -> Credential {
        Credential::new("at_old", Some(Secret::from("rt_old")), Some(now_millis() + 5_000))
    }

    fn fresh_credential() -> Credential {
        Credential::new(
            "at_fresh",
            Some(Secret::from("rt_fresh")),
            Some(now_millis() + 3_600_000),
        )
    }

    #[tokio::test]
    async fn fresh_credential_is_served_without_refresh() {
        let refresher = CountingRefresher::new(Duration::ZERO, issued);
        let manager = TokenManager::new(fresh_credential(), refresher.clone(), SessionSettings::default());

        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_fresh");
        assert_eq!(refresher.calls(), 0);
        assert_eq!(manager.status().await, CredentialStatus::Valid);
    }

    #[tokio::test]
    async fn credential_inside_margin_is_refreshed() {
        let refresher = CountingRefresher::new(Duration::ZERO, issued);
        let manager = TokenManager::new(expiring_credential(), refresher.clone(), SessionSettings::default());
        assert_eq!(manager.status().await, CredentialStatus::Expiring);

        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_1");
        // Endpoint did not rotate the refresh token, so the old one is kept
        assert_eq!(credential.refresh_token.as_ref().unwrap().expose(), "rt_old");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(manager.status().await, CredentialStatus::Valid);

        // Subsequent calls are served from the new credential
        let again = manager.get_valid_credential().await.unwrap();
        assert_eq!(again.access_token.expose(), "at_1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let refresher = CountingRefresher::new(Duration::from_millis(50), issued);
        let manager = TokenManager::new(expiring_credential(), refresher.clone(), SessionSettings::default());

        let mut handles = vec![];
        for _ in 0..10 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.get_valid_credential().await
            }));
        }

        for h in handles {
            let credential = h.await.unwrap().unwrap();
            assert_eq!(credential.access_token.expose(), "at_1");
        }
        assert_eq!(refresher.calls(), 1, "exactly one exchange expected");
    }

    #[tokio::test]
    async fn status_reports_refreshing_while_in_flight() {
        let refresher = CountingRefresher::new(Duration::from_millis(100), issued);
        let manager = TokenManager::new(expiring_credential(), refresher, SessionSettings::default());

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_credential().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.status().await, CredentialStatus::Refreshing);

        waiter.await.unwrap().unwrap();
        assert_eq!(manager.status().await, CredentialStatus::Valid);
    }

    #[tokio::test]
    async fn rejected_refresh_invalidates_and_fails_fast() {
        let refresher = CountingRefresher::new(Duration::ZERO, rejected);
        let manager = TokenManager::new(expiring_credential(), refresher.clone(), SessionSettings::default());

        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, Error::CredentialInvalid(_)), "got: {err:?}");
        assert!(err.to_string().contains("refresh token revoked"), "got: {err}");
        assert_eq!(manager.status().await, CredentialStatus::Invalid);

        // Fails fast: no further exchanges
        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, Error::CredentialInvalid(_)));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn installing_credential_recovers_from_invalid() {
        let refresher = CountingRefresher::new(Duration::ZERO, rejected);
        let manager = TokenManager::new(expiring_credential(), refresher, SessionSettings::default());
        manager.get_valid_credential().await.unwrap_err();

        manager.install_credential(fresh_credential()).await;
        assert_eq!(manager.status().await, CredentialStatus::Valid);
        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_timeout_invalidates() {
        let refresher = CountingRefresher::new(Duration::from_secs(3600), issued);
        let settings = SessionSettings {
            expiry_margin: Duration::from_secs(60),
            refresh_timeout: Duration::from_secs(5),
        };
        let manager = TokenManager::new(expiring_credential(), refresher, settings);

        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, Error::CredentialInvalid(_)), "got: {err:?}");
        assert!(err.to_string().contains("timed out"), "got: {err}");
        assert_eq!(manager.status().await, CredentialStatus::Invalid);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_waiter_does_not_strand_refresh() {
        let refresher = CountingRefresher::new(Duration::from_secs(10), issued);
        let manager = TokenManager::new(expiring_credential(), refresher.clone(), SessionSettings::default());

        // Caller gives up long before the exchange finishes
        let abandoned =
            tokio::time::timeout(Duration::from_secs(1), manager.get_valid_credential()).await;
        assert!(abandoned.is_err());

        // The spawned exchange still completes and commits
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(manager.status().await, CredentialStatus::Valid);
        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn install_during_refresh_is_not_overwritten() {
        let refresher = CountingRefresher::new(Duration::from_millis(100), issued);
        let manager = TokenManager::new(expiring_credential(), refresher, SessionSettings::default());

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_valid_credential().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.install_credential(fresh_credential()).await;

        let seen = waiter.await.unwrap().unwrap();
        assert_eq!(seen.access_token.expose(), "at_fresh");
        let current = manager.get_valid_credential().await.unwrap();
        assert_eq!(current.access_token.expose(), "at_fresh");
    }

    #[tokio::test]
    async fn subscribers_see_refreshed_credential_before_callers() {
        let refresher = CountingRefresher::new(Duration::ZERO, issued);
        let manager = TokenManager::new(expiring_credential(), refresher, SessionSettings::default());

        let seen = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        manager
            .on_token_refresh(move |credential| {
                sink.lock()
                    .unwrap()
                    .push(credential.access_token.expose().clone());
                Ok(())
            })
            .await;

        manager.get_valid_credential().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["at_1".to_string()]);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_break_refresh() {
        let refresher = CountingRefresher::new(Duration::ZERO, issued);
        let manager = TokenManager::new(expiring_credential(), refresher, SessionSettings::default());

        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();
        manager
            .on_token_refresh(|_| anyhow::bail!("disk full"))
            .await;
        manager
            .on_token_refresh(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "at_1");
        assert_eq!(later_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn static_token_never_refreshes() {
        let manager = TokenManager::from_static("pat_123");
        let credential = manager.get_valid_credential().await.unwrap();
        assert_eq!(credential.bearer_header(), "Bearer pat_123");
        assert_eq!(manager.status().await, CredentialStatus::Valid);
    }

    #[tokio::test]
    async fn expired_unrefreshable_credential_goes_invalid() {
        let refresher = CountingRefresher::new(Duration::ZERO, issued);
        let credential = Credential::new("at_dead", None, Some(now_millis() - 1_000));
        let manager = TokenManager::new(credential, refresher.clone(), SessionSettings::default());

        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(matches!(err, Error::CredentialInvalid(_)), "got: {err:?}");
        assert_eq!(manager.status().await, CredentialStatus::Invalid);
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn unrefreshable_credential_served_until_expiry() {
        let credential = Credential::new("at_short", None, Some(now_millis() + 5_000));
        let manager = TokenManager::build(credential, None, SessionSettings::default());

        let served = manager.get_valid_credential().await.unwrap();
        assert_eq!(served.access_token.expose(), "at_short");
        assert_eq!(manager.status().await, CredentialStatus::Expiring);
    }

    #[test]
    fn status_labels() {
        assert_eq!(CredentialStatus::Valid.label(), "valid");
        assert_eq!(CredentialStatus::Expiring.label(), "expiring");
        assert_eq!(CredentialStatus::Refreshing.label(), "refreshing");
        assert_eq!(CredentialStatus::Invalid.label(), "invalid");
    }

    #[test]
    fn refresh_outcomes_are_counted() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_refresh("success");
            record_refresh("rejected");
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("oauth_token_refresh_total{outcome=\"success\"} 1"),
            "got: {rendered}"
        );
        assert!(
            rendered.contains("oauth_token_refresh_total{outcome=\"rejected\"} 1"),
            "got: {rendered}"
        );
    }
}
