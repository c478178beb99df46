//! Challenge–response authentication and session-scoped key material.
//!
//! ```text
//!                 login               verify (signed nonce)
//! Unauthenticated ─────► Challenged ───────────────────────► Authenticated
//!        ▲                    │ failure                           │
//!        └────────────────────┴───────────────────────────────────┘
//!                                                   logout
//! ```
//!
//! Credentials exist if and only if the session is `Authenticated`. Callers
//! take a [`snapshot`](AuthSession::snapshot) (an `Arc`) before doing any
//! work; a concurrent logout clears the session for *later* calls without
//! touching snapshots already handed out.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::credentials::{self, Credentials, DerivationParams};
use crate::error::ZkDiaryError;
use crate::wire::{
    LoginRequest, LoginResponse, LoginVerifyRequest, LoginVerifyResponse, RegisterRequest,
    Validate,
};

/// The authentication endpoints of the backend.
///
/// Implementations own HTTP concerns. They must map a rejected login to
/// `InvalidCredentials` and a rejected challenge to `InvalidChallenge`.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    async fn register(&self, request: &RegisterRequest) -> Result<(), ZkDiaryError>;

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ZkDiaryError>;

    async fn verify_challenge(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, ZkDiaryError>;

    /// Invalidate `token` server-side.
    async fn logout(&self, token: &str) -> Result<(), ZkDiaryError>;
}

#[async_trait]
impl<T: AuthTransport + ?Sized> AuthTransport for Arc<T> {
    async fn register(&self, request: &RegisterRequest) -> Result<(), ZkDiaryError> {
        (**self).register(request).await
    }

    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ZkDiaryError> {
        (**self).login(request).await
    }

    async fn verify_challenge(
        &self,
        request: &LoginVerifyRequest,
    ) -> Result<LoginVerifyResponse, ZkDiaryError> {
        (**self).verify_challenge(request).await
    }

    async fn logout(&self, token: &str) -> Result<(), ZkDiaryError> {
        (**self).logout(token).await
    }
}

/// The bearer token and credentials of an authenticated session.
pub struct Authenticated {
    token: Zeroizing<String>,
    credentials: Credentials,
}

impl Authenticated {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl fmt::Debug for Authenticated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticated")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Challenged,
    Authenticated,
}

enum SessionState {
    Unauthenticated,
    Challenged(LoginResponse),
    Authenticated(Arc<Authenticated>),
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        match self {
            Self::Unauthenticated => SessionStatus::Unauthenticated,
            Self::Challenged(_) => SessionStatus::Challenged,
            Self::Authenticated(_) => SessionStatus::Authenticated,
        }
    }

    fn is_challenged_by(&self, challenge_id: &str) -> bool {
        matches!(self, Self::Challenged(c) if c.challenge_id == challenge_id)
    }
}

/// One user's session against the backend.
pub struct AuthSession<T> {
    transport: T,
    params: DerivationParams,
    state: RwLock<SessionState>,
}

impl<T: AuthTransport> AuthSession<T> {
    pub fn new(transport: T) -> Self {
        Self::with_params(transport, DerivationParams::default())
    }

    /// A session deriving credentials with non-default parameters.
    pub fn with_params(transport: T, params: DerivationParams) -> Self {
        Self {
            transport,
            params,
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.read().await.status()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.status().await == SessionStatus::Authenticated
    }

    /// Register an account for the identity derived from `seed_phrase`.
    ///
    /// Only public keys leave the process. The session state is untouched.
    pub async fn register(
        &self,
        login: &str,
        password: &str,
        seed_phrase: &str,
    ) -> Result<(), ZkDiaryError> {
        let credentials = self.derive(seed_phrase).await?;
        let request = credentials.register_request(login, password);
        request.validate()?;

        self.transport.register(&request).await?;
        info!(login, "account registered");
        Ok(())
    }

    /// Step one: submit login and password, receive a challenge.
    ///
    /// On failure the state is left as it was.
    pub async fn login(&self, login: &str, password: &str) -> Result<(), ZkDiaryError> {
        let request = LoginRequest {
            login: login.to_string(),
            password: password.to_string(),
        };
        request.validate()?;

        let challenge = self.transport.login(&request).await.inspect_err(|e| {
            warn!(error = %e, "login rejected");
        })?;
        debug!(challenge_id = %challenge.challenge_id, "login challenge received");

        *self.state.write().await = SessionState::Challenged(challenge);
        Ok(())
    }

    /// Step two: derive credentials, sign the challenge nonce, and exchange
    /// it for a bearer token.
    ///
    /// Any failure consumes the challenge and leaves the session
    /// unauthenticated.
    ///
    /// The session only moves to `Authenticated` if the answered challenge
    /// is still the pending one. If another `login` replaced it meanwhile,
    /// the newer state is kept, the issued token is logged out, and the
    /// call fails with `NoPendingChallenge`.
    pub async fn verify(&self, seed_phrase: &str) -> Result<(), ZkDiaryError> {
        let challenge = match &*self.state.read().await {
            SessionState::Challenged(challenge) => challenge.clone(),
            _ => return Err(ZkDiaryError::NoPendingChallenge),
        };
        let challenge_id = challenge.challenge_id.as_str();

        match self.exchange(&challenge, seed_phrase).await {
            Ok(authenticated) => {
                let mut state = self.state.write().await;
                if state.is_challenged_by(challenge_id) {
                    *state = SessionState::Authenticated(Arc::new(authenticated));
                    info!(challenge_id, "session authenticated");
                    return Ok(());
                }
                drop(state);

                warn!(challenge_id, "challenge superseded during verification");
                if let Err(e) = self.transport.logout(authenticated.token()).await {
                    warn!(error = %e, "failed to invalidate superseded token");
                }
                Err(ZkDiaryError::NoPendingChallenge)
            }
            Err(e) => {
                warn!(challenge_id, error = %e, "challenge verification failed");
                let mut state = self.state.write().await;
                if state.is_challenged_by(challenge_id) {
                    *state = SessionState::Unauthenticated;
                }
                Err(e)
            }
        }
    }

    async fn exchange(
        &self,
        challenge: &LoginResponse,
        seed_phrase: &str,
    ) -> Result<Authenticated, ZkDiaryError> {
        let credentials = self.derive(seed_phrase).await?;
        let signed_nonce = credentials.sign(&challenge.nonce)?;

        let request = LoginVerifyRequest {
            challenge_id: challenge.challenge_id.clone(),
            signed_nonce: signed_nonce.to_vec(),
        };
        request.validate()?;

        let response = self.transport.verify_challenge(&request).await?;
        Ok(Authenticated {
            token: Zeroizing::new(response.token),
            credentials,
        })
    }

    /// Runs PBKDF2 on the blocking pool.
    async fn derive(&self, seed_phrase: &str) -> Result<Credentials, ZkDiaryError> {
        let seed_phrase = Zeroizing::new(seed_phrase.to_string());
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || credentials::derive_with(&seed_phrase, &params))
            .await
            .map_err(|e| {
                warn!(error = %e, "credential derivation task failed");
                ZkDiaryError::KeyDerivationFailure
            })?
    }

    /// `login` followed by `verify`. Nothing is stored unless both succeed.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
        seed_phrase: &str,
    ) -> Result<(), ZkDiaryError> {
        self.login(login, password).await?;
        self.verify(seed_phrase).await
    }

    /// The current token and credentials, or `Unauthorized`.
    ///
    /// The returned `Arc` stays valid for the caller even if the session is
    /// logged out while it is in use.
    pub async fn snapshot(&self) -> Result<Arc<Authenticated>, ZkDiaryError> {
        match &*self.state.read().await {
            SessionState::Authenticated(authenticated) => Ok(Arc::clone(authenticated)),
            _ => Err(ZkDiaryError::Unauthorized),
        }
    }

    /// Invalidate the token server-side and drop the local credentials.
    ///
    /// Not idempotent: logging out an unauthenticated session fails with
    /// `NotAuthenticated`. If the server call fails the session is kept.
    pub async fn logout(&self) -> Result<(), ZkDiaryError> {
        let current = match &*self.state.read().await {
            SessionState::Authenticated(authenticated) => Arc::clone(authenticated),
            _ => return Err(ZkDiaryError::NotAuthenticated),
        };

        self.transport.logout(current.token()).await?;

        let mut state = self.state.write().await;
        // Only clear the session this call logged out; a newer login that
        // raced in stays.
        if matches!(&*state, SessionState::Authenticated(a) if Arc::ptr_eq(a, &current)) {
            *state = SessionState::Unauthenticated;
        }
        info!("session logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::Notify;

    use crate::signature;

    /// Accepts one login/password pair and checks the nonce signature
    /// against whichever identity last registered.
    #[derive(Default)]
    struct StubTransport {
        signing_key: Mutex<Option<Vec<u8>>>,
        logins: AtomicUsize,
        logouts: Mutex<Vec<String>>,
        /// When set, `verify_challenge` signals the first handle once it is
        /// called and waits on the second before answering.
        hold_verify: Option<(Notify, Notify)>,
    }

    const NONCE: &[u8] = b"0123456789abcdef";

    #[async_trait]
    impl AuthTransport for StubTransport {
        async fn register(&self, request: &RegisterRequest) -> Result<(), ZkDiaryError> {
            *self.signing_key.lock().unwrap() = Some(request.signature_public_key.clone());
            Ok(())
        }

        async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ZkDiaryError> {
            if request.login == "user" && request.password == "pass" {
                let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(LoginResponse {
                    challenge_id: format!("challenge-{n}"),
                    nonce: NONCE.to_vec(),
                })
            } else {
                Err(ZkDiaryError::InvalidCredentials)
            }
        }

        async fn verify_challenge(
            &self,
            request: &LoginVerifyRequest,
        ) -> Result<LoginVerifyResponse, ZkDiaryError> {
            if let Some((entered, release)) = &self.hold_verify {
                entered.notify_one();
                release.notified().await;
            }
            let key = self
                .signing_key
                .lock()
                .unwrap()
                .clone()
                .ok_or(ZkDiaryError::InvalidChallenge)?;
            if signature::verify(NONCE, &request.signed_nonce, &key) {
                Ok(LoginVerifyResponse {
                    token: format!("token-for-{}", request.challenge_id),
                })
            } else {
                Err(ZkDiaryError::InvalidChallenge)
            }
        }

        async fn logout(&self, token: &str) -> Result<(), ZkDiaryError> {
            self.logouts.lock().unwrap().push(token.to_string());
            Ok(())
        }
    }

    fn fast() -> DerivationParams {
        DerivationParams {
            iterations: 1_000,
            ..DerivationParams::default()
        }
    }

    fn session() -> AuthSession<StubTransport> {
        AuthSession::with_params(StubTransport::default(), fast())
    }

    #[tokio::test]
    async fn test_full_transition_cycle() {
        let s = session();
        s.register("user", "pass", "seed words").await.unwrap();
        assert_eq!(s.status().await, SessionStatus::Unauthenticated);

        s.login("user", "pass").await.unwrap();
        assert_eq!(s.status().await, SessionStatus::Challenged);
        assert!(matches!(s.snapshot().await, Err(ZkDiaryError::Unauthorized)));

        s.verify("seed words").await.unwrap();
        assert_eq!(s.status().await, SessionStatus::Authenticated);
        assert_eq!(s.snapshot().await.unwrap().token(), "token-for-challenge-1");

        s.logout().await.unwrap();
        assert_eq!(s.status().await, SessionStatus::Unauthenticated);
        assert_eq!(
            *s.transport().logouts.lock().unwrap(),
            vec!["token-for-challenge-1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_wrong_seed_leaves_session_unauthenticated() {
        let s = session();
        s.register("user", "pass", "seed words").await.unwrap();
        s.login("user", "pass").await.unwrap();

        let err = s.verify("other words").await.unwrap_err();
        assert!(matches!(err, ZkDiaryError::InvalidChallenge));
        assert_eq!(s.status().await, SessionStatus::Unauthenticated);

        // The challenge was consumed.
        assert!(matches!(
            s.verify("seed words").await,
            Err(ZkDiaryError::NoPendingChallenge)
        ));
    }

    #[tokio::test]
    async fn test_login_during_verify_is_not_overwritten() {
        let transport = StubTransport {
            hold_verify: Some(Default::default()),
            ..StubTransport::default()
        };
        let s = Arc::new(AuthSession::with_params(transport, fast()));
        s.register("user", "pass", "seed words").await.unwrap();
        s.login("user", "pass").await.unwrap();

        let verifying = tokio::spawn({
            let s = Arc::clone(&s);
            async move { s.verify("seed words").await }
        });

        let (entered, release) = s.transport().hold_verify.as_ref().unwrap();
        entered.notified().await;
        s.login("user", "pass").await.unwrap();
        release.notify_one();

        let result = verifying.await.unwrap();
        assert!(matches!(result, Err(ZkDiaryError::NoPendingChallenge)));
        assert_eq!(s.status().await, SessionStatus::Challenged);
        // The token issued for the stale challenge is not kept around.
        assert_eq!(
            *s.transport().logouts.lock().unwrap(),
            vec!["token-for-challenge-1".to_string()]
        );

        // The newer challenge can still be answered.
        release.notify_one();
        s.verify("seed words").await.unwrap();
        assert_eq!(s.snapshot().await.unwrap().token(), "token-for-challenge-2");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_derivation_does_not_stall_other_tasks() {
        let s = AuthSession::new(StubTransport::default());
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        s.register("user", "pass", "seed words").await.unwrap();
        ticker.abort();
        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_logout_is_not_idempotent() {
        let s = session();
        assert!(matches!(s.logout().await, Err(ZkDiaryError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_debug_hides_token() {
        let s = session();
        s.register("user", "pass", "seed words").await.unwrap();
        s.authenticate("user", "pass", "seed words").await.unwrap();
        let shown = format!("{:?}", s.snapshot().await.unwrap());
        assert!(!shown.contains("token-for"));
    }
}
