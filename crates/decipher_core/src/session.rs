//! crates/decipher_core/src/session.rs
//!
//! The session store: the single source of truth for who is logged in.
//!
//! The store is an explicit object built from an `AuthService` and a
//! `SessionStorage`; whoever needs the session gets it passed in. Every state
//! change is published on a `watch` channel so the navigator (or any view)
//! can re-evaluate after restore, login and logout.

use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::domain::{RegisterRequest, Registration, Session, User};
use crate::ports::{
    AuthService, PortError, PortResult, ServiceError, ServiceResult, SessionStorage, Slot,
};
use crate::validation;

/// Sentinel some browsers left behind when `undefined` was stored as a string.
const UNDEFINED_SENTINEL: &str = "undefined";

/// What observers see of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    /// True until the startup restore (including remote verification) finishes.
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

pub struct SessionStore {
    auth: Arc<dyn AuthService>,
    storage: Arc<dyn SessionStorage>,
    current: RwLock<Option<Session>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    /// Creates a store with no session that reports `is_loading` until
    /// [`SessionStore::restore`] has run.
    pub fn new(auth: Arc<dyn AuthService>, storage: Arc<dyn SessionStorage>) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            user: None,
            is_loading: true,
        });
        Self {
            auth,
            storage,
            current: RwLock::new(None),
            snapshot_tx,
        }
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribes to every future session change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot_tx.borrow().is_loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot_tx.borrow().is_authenticated()
    }

    pub async fn user(&self) -> Option<User> {
        self.current.read().await.as_ref().map(|s| s.user.clone())
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    //=====================================================================================
    // Lifecycle
    //=====================================================================================

    /// Restores the persisted session at startup.
    ///
    /// A usable pair is adopted immediately and then checked against the
    /// backend; anything missing or unreadable wipes both slots.
    pub async fn restore(&self) -> SessionSnapshot {
        match self.load_persisted().await {
            Some(session) => {
                let token = session.token.clone();
                self.install(session, true).await;
                debug!("Restored persisted session, verifying token");
                // The outcome is reflected in the published snapshot.
                let _ = self.verify(&token).await;
            }
            None => {
                self.discard().await;
                self.publish(None, false);
            }
        }
        self.snapshot()
    }

    /// Checks `token` against the profile endpoint.
    ///
    /// The answer only applies while `token` still belongs to the current
    /// session; a logout or a newer login made meanwhile wins. Success
    /// replaces the local user with the server's copy and any failure clears
    /// the whole session. Either way loading is over afterwards.
    async fn verify(&self, token: &str) -> ServiceResult<User> {
        let result = self.auth.profile(token).await;

        let mut current = self.current.write().await;
        if current.as_ref().map(|s| s.token.as_str()) != Some(token) {
            debug!("Session changed while verifying, dropping the profile result");
            let user = current.as_ref().map(|s| s.user.clone());
            self.publish(user, false);
            return result;
        }

        match result {
            Ok(user) => {
                let session = Session {
                    user: user.clone(),
                    token: token.to_string(),
                };
                if let Err(e) = self.persist(&session).await {
                    warn!("Failed to persist refreshed user: {:?}", e);
                }
                *current = Some(session);
                self.publish(Some(user.clone()), false);
                info!("Session verified for {}", user.email);
                Ok(user)
            }
            Err(e) => {
                warn!("Token verification failed, clearing session: {}", e);
                self.clear(&mut current).await;
                self.publish(None, false);
                Err(e)
            }
        }
    }

    /// Logs in and persists the session. On failure nothing is touched and
    /// the error says whether the account still needs OTP verification.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> ServiceResult<Session> {
        validation::validate_login(email, password)?;
        let grant = self.auth.login(email.trim(), password, remember_me).await?;
        self.establish(Session {
            user: grant.user,
            token: grant.token,
        })
        .await
    }

    /// Registers a new account. The session is never modified.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> ServiceResult<Registration> {
        validation::validate_registration(name, email, password, confirm_password)?;
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
        };
        self.auth.register(&request).await
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> ServiceResult<Session> {
        validation::validate_otp(email, otp)?;
        let grant = self.auth.verify_otp(email.trim(), otp).await?;
        self.establish(Session {
            user: grant.user,
            token: grant.token,
        })
        .await
    }

    pub async fn resend_verification(&self, email: &str) -> ServiceResult<String> {
        validation::validate_email(email)?;
        self.auth.resend_verification(email.trim()).await
    }

    pub async fn forgot_password(&self, email: &str) -> ServiceResult<String> {
        validation::validate_email(email)?;
        self.auth.forgot_password(email.trim()).await
    }

    /// Resets the password; the backend logs the user in on success.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> ServiceResult<Session> {
        validation::validate_password_reset(token, password, confirm_password)?;
        let grant = self
            .auth
            .reset_password(token, password, confirm_password)
            .await?;
        self.establish(Session {
            user: grant.user,
            token: grant.token,
        })
        .await
    }

    /// Consumes an email-verification link. Does not log the user in.
    pub async fn verify_email(&self, token: &str) -> ServiceResult<String> {
        if token.trim().is_empty() {
            return Err(ServiceError::validation(
                "Invalid verification link. No token provided.",
            ));
        }
        self.auth.verify_email(token).await
    }

    /// Logs out. The remote call is best effort; the local session is always
    /// cleared.
    pub async fn logout(&self) {
        let token = match self.storage.read(Slot::Token).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read token for logout: {:?}", e);
                None
            }
        };
        let token = match token {
            Some(token) => Some(token),
            None => self.token().await,
        };

        if let Some(token) = token.filter(|t| usable(t)) {
            if let Err(e) = self.auth.logout(&token).await {
                warn!("Remote logout failed, clearing local session anyway: {}", e);
            }
        }

        self.discard().await;
        self.publish(None, self.is_loading());
        info!("Logged out");
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    /// Reads both slots; `None` unless both are present and readable.
    async fn load_persisted(&self) -> Option<Session> {
        let user_raw = self.read_slot(Slot::User).await?;
        let token = self.read_slot(Slot::Token).await?;

        match serde_json::from_str::<User>(&user_raw) {
            Ok(user) => Some(Session { user, token }),
            Err(e) => {
                error!("Error parsing saved user: {}", e);
                None
            }
        }
    }

    async fn read_slot(&self, slot: Slot) -> Option<String> {
        match self.storage.read(slot).await {
            Ok(Some(value)) if usable(&value) => Some(value),
            Ok(_) => None,
            Err(e) => {
                error!("Failed to read {} slot: {:?}", slot.key(), e);
                None
            }
        }
    }

    /// Persists a new session as a pair, then makes it current. The write
    /// lock is held throughout so a pending verification sees either the old
    /// session or the new one, never a mix.
    async fn establish(&self, session: Session) -> ServiceResult<Session> {
        let mut current = self.current.write().await;
        if let Err(e) = self.persist(&session).await {
            error!("Failed to persist session, discarding it: {:?}", e);
            self.clear(&mut current).await;
            self.publish(None, self.is_loading());
            return Err(e.into());
        }
        *current = Some(session.clone());
        self.publish(Some(session.user.clone()), self.is_loading());
        info!("Session established for {}", session.user.email);
        Ok(session)
    }

    async fn persist(&self, session: &Session) -> PortResult<()> {
        self.storage.write(Slot::Token, &session.token).await?;
        let user = serde_json::to_string(&session.user)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage.write(Slot::User, &user).await
    }

    async fn install(&self, session: Session, is_loading: bool) {
        let user = session.user.clone();
        *self.current.write().await = Some(session);
        self.publish(Some(user), is_loading);
    }

    async fn discard(&self) {
        let mut current = self.current.write().await;
        self.clear(&mut current).await;
    }

    /// Clears memory and both slots. Storage failures are logged only.
    async fn clear(&self, current: &mut Option<Session>) {
        *current = None;
        for slot in [Slot::User, Slot::Token] {
            if let Err(e) = self.storage.remove(slot).await {
                error!("Failed to clear {} slot: {:?}", slot.key(), e);
            }
        }
    }

    fn publish(&self, user: Option<User>, is_loading: bool) {
        self.snapshot_tx
            .send_replace(SessionSnapshot { user, is_loading });
    }
}

fn usable(value: &str) -> bool {
    !value.trim().is_empty() && value != UNDEFINED_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySessionStorage;
    use crate::testing::{sample_user, FakeAuth, FailingStorage};

    fn store_with(auth: Arc<FakeAuth>, storage: Arc<dyn SessionStorage>) -> SessionStore {
        SessionStore::new(auth, storage)
    }

    fn persisted_user() -> String {
        serde_json::to_string(&sample_user("stale@example.com")).unwrap()
    }

    #[tokio::test]
    async fn restore_without_persisted_data_ends_absent() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage);

        assert!(store.is_loading());
        let snapshot = store.restore().await;

        assert!(!snapshot.is_authenticated());
        assert!(!snapshot.is_loading);
        assert_eq!(auth.calls("profile"), 0);
    }

    #[tokio::test]
    async fn restore_clears_half_persisted_or_malformed_sessions() {
        let user = persisted_user();
        let cases: Vec<(Option<&str>, Option<&str>)> = vec![
            (Some(user.as_str()), None),
            (None, Some("tok")),
            (Some("undefined"), Some("tok")),
            (Some(user.as_str()), Some("undefined")),
            (Some("{not json"), Some("tok")),
        ];

        for (user_slot, token_slot) in cases {
            let auth = Arc::new(FakeAuth::default());
            let storage = Arc::new(MemorySessionStorage::with_slots(user_slot, token_slot));
            let store = store_with(auth.clone(), storage.clone());

            let snapshot = store.restore().await;

            assert!(!snapshot.is_authenticated());
            assert!(!snapshot.is_loading);
            assert!(storage.read(Slot::User).await.unwrap().is_none());
            assert!(storage.read(Slot::Token).await.unwrap().is_none());
            assert_eq!(auth.calls("profile"), 0);
        }
    }

    #[tokio::test]
    async fn restore_refreshes_user_from_backend() {
        let auth = Arc::new(FakeAuth::default());
        auth.set_profile(Ok(sample_user("fresh@example.com")));
        let user = persisted_user();
        let storage = Arc::new(MemorySessionStorage::with_slots(Some(&user), Some("tok")));
        let store = store_with(auth.clone(), storage.clone());

        let snapshot = store.restore().await;

        assert_eq!(snapshot.user.unwrap().email, "fresh@example.com");
        assert!(!snapshot.is_loading);
        let saved = storage.read(Slot::User).await.unwrap().unwrap();
        assert!(saved.contains("fresh@example.com"));
        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("tok"));
        assert_eq!(store.token().await.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn failed_verification_clears_everything() {
        let auth = Arc::new(FakeAuth::default());
        auth.set_profile(Err(ServiceError::rejected("Token verification failed")));
        let user = persisted_user();
        let storage = Arc::new(MemorySessionStorage::with_slots(Some(&user), Some("tok")));
        let store = store_with(auth, storage.clone());

        let snapshot = store.restore().await;

        assert!(snapshot.user.is_none());
        assert!(!snapshot.is_loading);
        assert!(store.token().await.is_none());
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
        assert!(storage.read(Slot::User).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_failure_clears_an_active_session() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage.clone());
        store.login("ada@example.com", "pw", false).await.unwrap();

        auth.set_profile(Err(ServiceError::Network("Network error. Please try again.".into())));
        assert!(store.verify("tok-login").await.is_err());

        assert!(!store.is_authenticated());
        assert!(storage.read(Slot::User).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verifying_another_token_leaves_the_session_alone() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage.clone());
        store.login("ada@example.com", "pw", false).await.unwrap();

        auth.set_profile(Ok(sample_user("other@example.com")));
        assert!(store.verify("tok-other").await.is_ok());

        assert_eq!(store.token().await.as_deref(), Some("tok-login"));
        assert_eq!(store.user().await.unwrap().email, "ada@example.com");
        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("tok-login"));
        let saved = storage.read(Slot::User).await.unwrap().unwrap();
        assert!(saved.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn logout_during_restore_is_not_undone_by_a_late_profile() {
        let auth = Arc::new(FakeAuth::holding_profile());
        let user = persisted_user();
        let storage = Arc::new(MemorySessionStorage::with_slots(Some(&user), Some("tok")));
        let store = Arc::new(store_with(auth.clone(), storage.clone()));

        let restoring = tokio::spawn({
            let store = store.clone();
            async move { store.restore().await }
        });
        auth.profile_started.notified().await;
        store.logout().await;
        auth.release_profile();

        let snapshot = restoring.await.unwrap();
        assert!(!snapshot.is_authenticated());
        assert!(!snapshot.is_loading);
        assert!(store.token().await.is_none());
        assert!(storage.read(Slot::User).await.unwrap().is_none());
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn late_verification_failure_keeps_a_newer_login() {
        let auth = Arc::new(FakeAuth::holding_profile());
        auth.set_profile(Err(ServiceError::rejected("Token verification failed")));
        let user = persisted_user();
        let storage = Arc::new(MemorySessionStorage::with_slots(Some(&user), Some("tok-old")));
        let store = Arc::new(store_with(auth.clone(), storage.clone()));

        let restoring = tokio::spawn({
            let store = store.clone();
            async move { store.restore().await }
        });
        auth.profile_started.notified().await;
        store.login("ada@example.com", "pw", false).await.unwrap();
        auth.release_profile();

        let snapshot = restoring.await.unwrap();
        assert!(snapshot.is_authenticated());
        assert!(!snapshot.is_loading);
        assert_eq!(store.token().await.as_deref(), Some("tok-login"));
        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("tok-login"));
        assert!(storage.read(Slot::User).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_success_persists_the_pair() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth, storage.clone());
        let mut rx = store.subscribe();

        let session = store.login("ada@example.com", "pw", true).await.unwrap();

        assert_eq!(session.token, "tok-login");
        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("tok-login"));
        assert!(storage.read(Slot::User).await.unwrap().is_some());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn login_failure_leaves_session_untouched() {
        let auth = Arc::new(FakeAuth::default());
        auth.set_login(Err(ServiceError::Rejected {
            message: "Please verify your email".into(),
            requires_verification: true,
            email: Some("ada@example.com".into()),
        }));
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth, storage.clone());
        store.restore().await;

        let err = store.login("ada@example.com", "pw", false).await.unwrap_err();

        assert!(err.requires_verification());
        assert_eq!(err.verification_email(), Some("ada@example.com"));
        assert!(!store.is_authenticated());
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_login_form_never_reaches_backend() {
        let auth = Arc::new(FakeAuth::default());
        let store = store_with(auth.clone(), Arc::new(MemorySessionStorage::new()));

        let err = store.login("", "pw", false).await.unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(auth.calls("login"), 0);
    }

    #[tokio::test]
    async fn storage_failure_during_login_leaves_no_half_session() {
        let auth = Arc::new(FakeAuth::default());
        let store = store_with(auth, Arc::new(FailingStorage));

        let err = store.login("ada@example.com", "pw", false).await.unwrap_err();

        assert!(matches!(err, ServiceError::Internal(_)));
        assert!(!store.is_authenticated());
        assert!(store.token().await.is_none());
    }

    #[tokio::test]
    async fn register_does_not_log_in() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage.clone());

        let registration = store
            .register("Ada", "ada@example.com", "Secret12!", "Secret12!")
            .await
            .unwrap();

        assert!(registration.requires_verification);
        assert!(!store.is_authenticated());
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn weak_registration_is_refused_locally() {
        let auth = Arc::new(FakeAuth::default());
        let store = store_with(auth.clone(), Arc::new(MemorySessionStorage::new()));

        let err = store
            .register("Ada", "ada@example.com", "short", "short")
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(auth.calls("register"), 0);
    }

    #[tokio::test]
    async fn otp_and_reset_establish_sessions() {
        let auth = Arc::new(FakeAuth::default());
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage.clone());

        assert!(store.verify_otp("ada@example.com", "12ab").await.is_err());
        assert_eq!(auth.calls("verify_otp"), 0);

        let session = store.verify_otp("ada@example.com", "123456").await.unwrap();
        assert_eq!(session.token, "tok-otp");
        assert!(store.is_authenticated());

        store.logout().await;
        let session = store
            .reset_password("reset-token", "newpass", "newpass")
            .await
            .unwrap();
        assert_eq!(session.token, "tok-reset");
        assert_eq!(storage.read(Slot::Token).await.unwrap().as_deref(), Some("tok-reset"));
    }

    #[tokio::test]
    async fn side_effect_calls_do_not_touch_the_session() {
        let auth = Arc::new(FakeAuth::default());
        let store = store_with(auth, Arc::new(MemorySessionStorage::new()));

        assert!(store.forgot_password("ada@example.com").await.is_ok());
        assert!(store.resend_verification("ada@example.com").await.is_ok());
        assert!(store.verify_email("link-token").await.is_ok());
        assert!(store.verify_email(" ").await.is_err());
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_even_when_remote_call_fails() {
        let auth = Arc::new(FakeAuth::default());
        auth.set_logout(Err(ServiceError::Network("offline".into())));
        let storage = Arc::new(MemorySessionStorage::new());
        let store = store_with(auth.clone(), storage.clone());
        store.login("ada@example.com", "pw", false).await.unwrap();

        store.logout().await;

        assert_eq!(auth.calls("logout"), 1);
        assert!(!store.is_authenticated());
        assert!(store.user().await.is_none());
        assert!(storage.read(Slot::User).await.unwrap().is_none());
        assert!(storage.read(Slot::Token).await.unwrap().is_none());
    }
}
