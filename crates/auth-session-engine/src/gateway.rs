//! The single entry point for every authentication flow.
//!
//! `AuthGateway` owns the state machine, the session store, the CSRF guard,
//! and the listener registry. Each operation consumes a machine transition up
//! front, so overlapping calls are rejected with [`AuthError::Busy`] instead
//! of interleaving. Session-change notifications fan out through the UI work
//! queue; for any single operation listeners observe at most one session
//! change.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthMachineState, AuthState, RefreshConfig};
use crate::csrf::DeepLinkCsrfGuard;
use crate::error::{AuthError, AuthResult};
use crate::pkce::PkcePair;
use crate::provider::{IdentityProvider, SignUpOutcome};
use crate::session::{AuthEvent, Identity, Session, SessionStore};
use crate::validation::CredentialRules;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use ui_event_dispatch::{ListenerHandle, ListenerRegistry, UiDispatcher};
use url::Url;

/// Outcome of a sign-up as reported to the caller.
#[derive(Debug, Clone)]
pub struct SignUpResult {
    pub identity: Identity,
    /// True when the account was created but no session was issued; the user
    /// must confirm their email address and then sign in.
    pub requires_email_confirmation: bool,
}

/// Path component the OAuth callback deep link must target.
const CALLBACK_HOST: &str = "login-callback";

pub struct AuthGateway {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<SessionStore>,
    csrf: DeepLinkCsrfGuard,
    rules: CredentialRules,
    listeners: ListenerRegistry<AuthEvent>,
    machine: Mutex<AuthMachine>,
    pending_pkce: Mutex<Option<PkcePair>>,
    refresh_config: RefreshConfig,
    redirect_uri: String,
}

impl AuthGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<SessionStore>,
        dispatcher: UiDispatcher,
        app_scheme: &str,
    ) -> Self {
        Self {
            provider,
            store,
            csrf: DeepLinkCsrfGuard::new(),
            rules: CredentialRules::new(),
            listeners: ListenerRegistry::new(dispatcher),
            machine: Mutex::new(AuthMachine::new()),
            pending_pkce: Mutex::new(None),
            refresh_config: RefreshConfig::default(),
            redirect_uri: format!("{app_scheme}://{CALLBACK_HOST}"),
        }
    }

    pub fn with_refresh_config(mut self, config: RefreshConfig) -> Self {
        self.refresh_config = config;
        self
    }

    /// Register a session-change listener. Callbacks run on the UI work
    /// queue in registration order.
    pub fn on_auth_event(
        &self,
        callback: impl Fn(&AuthEvent) + Send + Sync + 'static,
    ) -> ListenerHandle<AuthEvent> {
        self.listeners.register(callback)
    }

    /// Current machine state, for status displays.
    pub fn state(&self) -> AuthState {
        AuthState::from(self.machine.lock().expect("lock poisoned").state())
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Start an operation by consuming its transition. `Busy` when the
    /// machine has no legal transition for it, which is exactly the
    /// overlapping-operation case.
    fn begin(&self, input: AuthMachineInput) -> AuthResult<()> {
        self.machine
            .lock()
            .expect("lock poisoned")
            .consume(&input)
            .map(|_| ())
            .map_err(|_| AuthError::Busy)
    }

    /// Consume a transition that is legal by construction at the call site.
    fn advance(&self, input: AuthMachineInput) {
        if self
            .machine
            .lock()
            .expect("lock poisoned")
            .consume(&input)
            .is_err()
        {
            error!(?input, "illegal auth state transition");
        }
    }

    /// Resolve a failed in-flight attempt. A prior session, if any, stays
    /// current and the machine returns to SignedIn; otherwise to SignedOut.
    fn abort_in_flight(&self) {
        let input = if self.store.is_signed_in() {
            AuthMachineInput::Abandoned
        } else {
            AuthMachineInput::Failed
        };
        self.advance(input);
    }

    fn install_session(&self, session: Session, event: AuthEvent) {
        self.store.replace(session);
        self.listeners.notify(event);
    }

    /// Sign in with email and password.
    ///
    /// Validation runs before any provider call; a validation error costs no
    /// network round trip and no state transition.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.rules
            .require_all(&[("email", email), ("password", password)])?;
        self.rules.validate_email(email)?;
        self.begin(AuthMachineInput::SignInAttempt)?;

        match self.provider.sign_in(email, password).await {
            Ok(session) => {
                let identity = session.identity.clone();
                info!(user_id = %identity.id, "signed in");
                self.install_session(session.clone(), AuthEvent::signed_in(session));
                self.advance(AuthMachineInput::Succeeded);
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "sign-in failed");
                self.abort_in_flight();
                Err(err)
            }
        }
    }

    /// Create an account. Registration enforces the password length rule on
    /// top of the shared field rules.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> AuthResult<SignUpResult> {
        self.rules
            .require_all(&[("email", email), ("password", password)])?;
        self.rules.validate_email(email)?;
        self.rules.validate_password(password)?;
        self.begin(AuthMachineInput::SignUpAttempt)?;

        match self.provider.sign_up(email, password, &metadata).await {
            Ok(SignUpOutcome {
                identity,
                session: Some(session),
            }) => {
                info!(user_id = %identity.id, "signed up and signed in");
                self.install_session(session.clone(), AuthEvent::signed_in(session));
                self.advance(AuthMachineInput::Succeeded);
                Ok(SignUpResult {
                    identity,
                    requires_email_confirmation: false,
                })
            }
            Ok(SignUpOutcome {
                identity,
                session: None,
            }) => {
                // Account exists but no session was issued; nothing changed
                // for listeners.
                info!(user_id = %identity.id, "sign-up pending email confirmation");
                if self.store.is_signed_in() {
                    self.advance(AuthMachineInput::Abandoned);
                } else {
                    self.advance(AuthMachineInput::ConfirmationRequired);
                }
                Ok(SignUpResult {
                    identity,
                    requires_email_confirmation: true,
                })
            }
            Err(err) => {
                warn!(error = %err, "sign-up failed");
                self.abort_in_flight();
                Err(err)
            }
        }
    }

    /// Sign out. Local state is torn down even when the provider call fails,
    /// and listeners get exactly one SignedOut notification. Calling this
    /// while already signed out repeats the teardown harmlessly.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let tearing_down = {
            let mut machine = self.machine.lock().expect("lock poisoned");
            if *machine.state() == AuthMachineState::SignedOut {
                false
            } else {
                machine
                    .consume(&AuthMachineInput::SignOutRequest)
                    .map_err(|_| AuthError::Busy)?;
                true
            }
        };

        if let Some(token) = self.store.access_token() {
            if let Err(err) = self.provider.sign_out(&token).await {
                // Best effort: server-side revocation failing must not leave
                // the client signed in.
                warn!(error = %err, "provider sign-out failed; clearing local session anyway");
            }
        }

        self.store.clear();
        self.csrf.clear();
        self.pending_pkce.lock().expect("lock poisoned").take();
        if tearing_down {
            self.advance(AuthMachineInput::Cleared);
        }
        info!("signed out");
        self.listeners.notify(AuthEvent::signed_out());
        Ok(())
    }

    /// Request a password recovery email. Never touches the session or the
    /// state machine.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.rules.require_all(&[("email", email)])?;
        self.rules.validate_email(email)?;
        self.provider.reset_password(email).await
    }

    /// Start an OAuth flow: mint a state token and a PKCE pair, and return
    /// the browser URL. Completion arrives later via
    /// [`complete_oauth_callback`](Self::complete_oauth_callback).
    pub async fn begin_oauth(&self, provider_name: &str) -> AuthResult<Url> {
        self.begin(AuthMachineInput::OAuthStart)?;

        let state = self.csrf.issue_state();
        let pkce = PkcePair::generate();
        let url = match self.provider.authorize_url(
            provider_name,
            &self.redirect_uri,
            &state,
            &pkce.challenge,
        ) {
            Ok(url) => url,
            Err(err) => {
                self.csrf.clear();
                self.abort_in_flight();
                return Err(err);
            }
        };
        *self.pending_pkce.lock().expect("lock poisoned") = Some(pkce);
        info!(provider = provider_name, "oauth flow started");
        Ok(url)
    }

    /// Complete an OAuth flow from the callback deep link.
    ///
    /// The CSRF check fails closed: a missing, stale, or mismatching state
    /// parameter consumes the pending token and aborts the attempt, leaving
    /// any prior session untouched. A callback arriving while another auth
    /// operation is in flight fails with [`AuthError::Busy`]; its state token
    /// and verifier are still consumed, so it cannot be replayed afterwards.
    pub async fn complete_oauth_callback(&self, callback: &Url) -> AuthResult<Identity> {
        let state = query_param(callback, "state");
        let code = query_param(callback, "code");

        if let Err(err) = self.csrf.validate(state.as_deref()) {
            warn!("oauth callback rejected by the csrf guard");
            self.pending_pkce.lock().expect("lock poisoned").take();
            self.abort_oauth_attempt();
            return Err(err);
        }

        // Even a genuine state token does not cut in line: the callback
        // consumes a guarded transition like every other operation.
        if let Err(err) = self.begin(AuthMachineInput::CallbackReceived) {
            warn!("oauth callback arrived while another operation is in flight");
            self.pending_pkce.lock().expect("lock poisoned").take();
            return Err(err);
        }

        let Some(code) = code else {
            warn!("oauth callback is missing the authorization code");
            self.pending_pkce.lock().expect("lock poisoned").take();
            self.abort_in_flight();
            return Err(AuthError::Unknown(
                "callback is missing the authorization code".to_string(),
            ));
        };
        let Some(pkce) = self.pending_pkce.lock().expect("lock poisoned").take() else {
            self.abort_in_flight();
            return Err(AuthError::Unknown(
                "no code verifier pending for this callback".to_string(),
            ));
        };

        match self.provider.exchange_code(&code, &pkce.verifier).await {
            Ok(session) => {
                let identity = session.identity.clone();
                info!(user_id = %identity.id, "oauth sign-in completed");
                self.install_session(session.clone(), AuthEvent::signed_in(session));
                self.advance(AuthMachineInput::Succeeded);
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "oauth code exchange failed");
                self.abort_in_flight();
                Err(err)
            }
        }
    }

    /// Abort an OAuth attempt that never reached the exchange.
    fn abort_oauth_attempt(&self) {
        let state = self.state();
        if matches!(state, AuthState::AwaitingCallback | AuthState::ExchangingCode) {
            self.abort_in_flight();
        }
    }

    /// Refresh the current session's token pair.
    ///
    /// Transient failures are retried with exponential backoff; once retries
    /// are exhausted the current session stays in place. A permanent
    /// rejection means the refresh token is dead, so the session is cleared
    /// and listeners are told the user signed out.
    pub async fn refresh_session(&self) -> AuthResult<()> {
        let Some(current) = self.store.current() else {
            return Err(AuthError::NotSignedIn);
        };
        self.begin(AuthMachineInput::RefreshAttempt)?;

        let mut attempt: u32 = 0;
        loop {
            match self.provider.refresh(&current.refresh_token).await {
                Ok(session) => {
                    debug!(user_id = %session.identity.id, "token refreshed");
                    self.install_session(session.clone(), AuthEvent::token_refreshed(session));
                    self.advance(AuthMachineInput::Succeeded);
                    return Ok(());
                }
                Err(err) if err.is_transient() => {
                    if attempt >= self.refresh_config.max_retries {
                        warn!(error = %err, "refresh retries exhausted; keeping current session");
                        self.advance(AuthMachineInput::Abandoned);
                        return Err(err);
                    }
                    let delay = self.refresh_config.delay_for_attempt(attempt);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient refresh failure; retrying"
                    );
                    self.advance(AuthMachineInput::RetryDue);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    // The refresh token was rejected outright; the session is
                    // no longer usable.
                    warn!(error = %err, "refresh token rejected; signing out");
                    self.advance(AuthMachineInput::Failed);
                    self.store.clear();
                    self.listeners.notify(AuthEvent::signed_out());
                    return Err(err);
                }
            }
        }
    }
}

impl std::fmt::Debug for AuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGateway")
            .field("state", &self.state())
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
