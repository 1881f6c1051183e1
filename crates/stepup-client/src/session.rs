//! Session controller: owns the state, the persisted token and the countdown.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use stepup_auth_types::token::decode_unverified;
use stepup_domain::clock::SharedClock;

use crate::api::VerificationClient;
use crate::config::ClientConfig;
use crate::countdown::Countdown;
use crate::error::ClientError;
use crate::state::{
    GRANTED_MESSAGE, RESTORED_MESSAGE, SessionEvent, SessionState, reduce,
};
use crate::store::TokenStore;

/// Expiry of a stored token that is well formed, of the scoped type, and not yet
/// expired at `now`. The signature is not checked; the server does that.
pub fn restorable_expiry(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let claims = decode_unverified(token).ok()?;
    if !claims.has_expected_type() || claims.is_expired_at(now) {
        return None;
    }
    claims.expires_at()
}

struct Inner<S> {
    api: VerificationClient,
    store: S,
    clock: SharedClock,
    config: ClientConfig,
    state: watch::Sender<SessionState>,
    countdown: Mutex<Option<Countdown>>,
}

impl<S> Inner<S>
where
    S: TokenStore + 'static,
{
    /// Reduce `event` into the published state. Returns `true` if this locked an
    /// unlocked session, after clearing the token and stopping the countdown.
    fn apply(&self, event: SessionEvent) -> bool {
        let threshold = self.config.warning_threshold_secs;
        let mut locked = false;
        self.state.send_modify(|state| {
            let was_unlocked = state.is_unlocked();
            let was_warning = state.is_warning_open();
            *state = reduce(state, event, threshold);
            if !was_warning && state.is_warning_open() {
                tracing::info!(
                    time_remaining = state.time_remaining,
                    "sensitive access expiring soon"
                );
            }
            locked = was_unlocked && !state.is_unlocked();
        });
        if locked {
            self.discard_token();
            self.countdown_slot().take();
        }
        locked
    }

    /// Apply `started` unless `busy` already holds for the current state.
    fn try_start(
        &self,
        started: SessionEvent,
        busy: impl FnOnce(&SessionState) -> bool,
    ) -> Result<(), ClientError> {
        let threshold = self.config.warning_threshold_secs;
        let mut in_flight = false;
        self.state.send_if_modified(|state| {
            if busy(state) {
                in_flight = true;
                return false;
            }
            *state = reduce(state, started, threshold);
            true
        });
        if in_flight {
            Err(ClientError::InFlight)
        } else {
            Ok(())
        }
    }

    fn discard_token(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear stored sensitive token");
        }
    }

    fn countdown_slot(&self) -> std::sync::MutexGuard<'_, Option<Countdown>> {
        self.countdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tick(&self) -> ControlFlow<()> {
        let now = self.clock.now();
        self.apply(SessionEvent::Tick { now });
        if self.state.borrow().is_unlocked() {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }
}

/// Step-up session for one signed-in user.
///
/// Cloning yields another handle to the same session. Must be created inside a
/// tokio runtime because an unlocked session immediately starts its countdown.
pub struct SensitiveSession<S>
where
    S: TokenStore + 'static,
{
    inner: Arc<Inner<S>>,
}

impl<S> Clone for SensitiveSession<S>
where
    S: TokenStore + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SensitiveSession<S>
where
    S: TokenStore + 'static,
{
    /// Start `Locked`, or `Unlocked` if the store holds a token that can be restored.
    /// A stored token that cannot be restored is discarded.
    pub fn new(
        config: ClientConfig,
        store: S,
        clock: SharedClock,
    ) -> Result<Self, ClientError> {
        let api = VerificationClient::new(&config)?;
        let (state, _) = watch::channel(SessionState::default());
        let session = Self {
            inner: Arc::new(Inner {
                api,
                store,
                clock,
                config,
                state,
                countdown: Mutex::new(None),
            }),
        };
        session.restore()?;
        Ok(session)
    }

    fn restore(&self) -> Result<(), ClientError> {
        let Some(token) = self.inner.store.load()? else {
            return Ok(());
        };
        let now = self.inner.clock.now();
        match restorable_expiry(&token, now) {
            Some(expires_at) => {
                self.unlock(expires_at, RESTORED_MESSAGE);
            }
            None => {
                tracing::debug!("discarding unusable stored sensitive token");
                self.inner.store.clear()?;
            }
        }
        Ok(())
    }

    /// Enter `Unlocked` and start the countdown. A grant that has already
    /// expired leaves the session locked and its stored token discarded.
    fn unlock(&self, expires_at: DateTime<Utc>, message: &str) -> bool {
        let now = self.inner.clock.now();
        self.inner.apply(SessionEvent::Unlocked {
            expires_at,
            now,
            message: message.to_owned(),
        });
        let unlocked = self.inner.state.borrow().is_unlocked();
        if unlocked {
            self.start_countdown();
        } else {
            tracing::debug!(%expires_at, "sensitive access already expired on unlock");
            self.inner.discard_token();
        }
        unlocked
    }

    fn start_countdown(&self) {
        let weak: Weak<Inner<S>> = Arc::downgrade(&self.inner);
        let countdown = Countdown::start(self.inner.config.tick_period, move || {
            match weak.upgrade() {
                Some(inner) => inner.tick(),
                None => ControlFlow::Break(()),
            }
        });
        // Replacing drops (and aborts) any previous countdown.
        *self.inner.countdown_slot() = Some(countdown);
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The stored token while unlocked, for attaching to sensitive requests.
    pub fn sensitive_token(&self) -> Result<Option<String>, ClientError> {
        if !self.inner.state.borrow().is_unlocked() {
            return Ok(None);
        }
        self.inner.store.load()
    }

    /// One countdown step at the clock's current time. The countdown calls this
    /// every tick period; it is public for callers that drive time themselves.
    pub fn tick(&self) {
        let _ = self.inner.tick();
    }

    pub fn dismiss_warning(&self) {
        self.inner.apply(SessionEvent::WarningDismissed);
    }

    pub fn clear_error(&self) {
        self.inner.apply(SessionEvent::ClearError);
    }

    pub fn clear_message(&self) {
        self.inner.apply(SessionEvent::ClearMessage);
    }

    /// Lock now and forget the stored token.
    pub fn logout(&self) {
        if !self.inner.apply(SessionEvent::Locked) {
            self.inner.discard_token();
        }
    }

    pub async fn request_verification_code(&self) -> Result<(), ClientError> {
        self.inner
            .try_start(SessionEvent::RequestStarted, |s| s.request_in_flight)?;

        match self.inner.api.request_code().await {
            Ok(resp) => {
                self.inner.apply(SessionEvent::RequestSucceeded {
                    message: resp.message,
                });
                Ok(())
            }
            Err(e) => {
                self.inner.apply(SessionEvent::RequestFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub async fn verify_code(&self, code: &str) -> Result<(), ClientError> {
        self.inner
            .try_start(SessionEvent::VerifyStarted, |s| s.verify_in_flight)?;

        let access = match self.inner.api.verify_code(code).await {
            Ok(resp) => resp.sensitive_data_access,
            Err(e) => {
                self.inner.apply(SessionEvent::VerifyFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.inner.store.save(&access.token) {
            self.inner.apply(SessionEvent::VerifyFailed {
                error: e.to_string(),
            });
            return Err(e);
        }
        if !self.unlock(access.expires_at, GRANTED_MESSAGE) {
            return Err(ClientError::GrantExpired);
        }
        Ok(())
    }
}
