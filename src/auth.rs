//! Session handling against an external auth provider.
//!
//! [`AuthContext`] owns the signed-in state explicitly; nothing about the
//! current user lives in globals.

use tracing::{info, warn};

use crate::error::{KanbanError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

/// Outcome of a password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    Complete(Session),
    /// A second factor must be verified before a session exists.
    MfaRequired { factor_id: String },
}

/// A TOTP factor awaiting its first code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaEnrollment {
    pub factor_id: String,
    /// `otpauth://` URI for authenticator apps.
    pub qr_code: String,
    pub secret: String,
}

#[tonic::async_trait]
pub trait AuthService: Send + Sync {
    /// The persisted session, if any.
    async fn get_session(&self) -> Result<Option<Session>>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<()>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<SignIn>;

    async fn verify_mfa(&self, factor_id: &str, code: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// Start TOTP enrollment for the signed-in user.
    async fn enroll_mfa(&self) -> Result<MfaEnrollment>;

    /// Activate an enrolled factor with its first code.
    async fn verify_enrollment(&self, factor_id: &str, code: &str) -> Result<()>;

    /// Remove the signed-in user's TOTP factor.
    async fn unenroll_mfa(&self) -> Result<()>;

    async fn is_mfa_enabled(&self) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Waiting for the persisted session to be read.
    Restoring,
    SignedOut,
    MfaPending { factor_id: String },
    SignedIn(Session),
}

pub struct AuthContext<A> {
    service: A,
    state: AuthState,
    enrolling: Option<String>,
}

impl<A: AuthService> AuthContext<A> {
    pub fn new(service: A) -> Self {
        AuthContext {
            service,
            state: AuthState::Restoring,
            enrolling: None,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            AuthState::SignedIn(session) => Some(session),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.session().map(|session| session.user_id.as_str())
    }

    /// Reads the persisted session. A failed read leaves the context
    /// signed out.
    pub async fn restore(&mut self) -> Result<&AuthState> {
        match self.service.get_session().await {
            Ok(Some(session)) => self.state = AuthState::SignedIn(session),
            Ok(None) => self.state = AuthState::SignedOut,
            Err(err) => {
                warn!(error = %err, "failed to restore session");
                self.state = AuthState::SignedOut;
                return Err(err);
            }
        }
        Ok(&self.state)
    }

    /// Registration does not sign the user in.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<()> {
        self.service.sign_up(credentials).await
    }

    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<&AuthState> {
        self.state = match self.service.sign_in(credentials).await? {
            SignIn::Complete(session) => {
                info!(user = %session.user_id, "signed in");
                AuthState::SignedIn(session)
            }
            SignIn::MfaRequired { factor_id } => AuthState::MfaPending { factor_id },
        };
        Ok(&self.state)
    }

    pub async fn verify_mfa(&mut self, code: &str) -> Result<&Session> {
        let factor_id = match &self.state {
            AuthState::MfaPending { factor_id } => factor_id.clone(),
            _ => return Err(KanbanError::auth("no second factor is pending")),
        };
        let session = self.service.verify_mfa(&factor_id, code).await?;
        info!(user = %session.user_id, "second factor verified");
        self.state = AuthState::SignedIn(session);
        self.session().ok_or(KanbanError::Unauthenticated)
    }

    /// The context stays signed in when the provider refuses.
    pub async fn sign_out(&mut self) -> Result<()> {
        self.service.sign_out().await?;
        self.state = AuthState::SignedOut;
        self.enrolling = None;
        Ok(())
    }

    fn signed_in(&self) -> Result<&Session> {
        self.session().ok_or(KanbanError::Unauthenticated)
    }

    pub async fn enroll_mfa(&mut self) -> Result<MfaEnrollment> {
        self.signed_in()?;
        let enrollment = self.service.enroll_mfa().await?;
        self.enrolling = Some(enrollment.factor_id.clone());
        Ok(enrollment)
    }

    /// A wrong code keeps the enrollment open for another attempt.
    pub async fn verify_enrollment(&mut self, code: &str) -> Result<()> {
        self.signed_in()?;
        let factor_id = self
            .enrolling
            .clone()
            .ok_or_else(|| KanbanError::auth("no enrollment in progress"))?;
        self.service.verify_enrollment(&factor_id, code).await?;
        self.enrolling = None;
        info!(factor = %factor_id, "second factor enrolled");
        Ok(())
    }

    pub async fn unenroll_mfa(&mut self) -> Result<()> {
        self.signed_in()?;
        self.service.unenroll_mfa().await?;
        self.enrolling = None;
        Ok(())
    }

    pub async fn is_mfa_enabled(&self) -> Result<bool> {
        self.signed_in()?;
        self.service.is_mfa_enabled().await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::StaticAuth;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::collections::HashMap;

    use tokio::sync::Mutex;

    use super::*;

    struct Account {
        user_id: String,
        password: String,
        mfa_code: Option<String>,
    }

    #[derive(Default)]
    struct State {
        accounts: HashMap<String, Account>,
        pending: HashMap<String, Session>,
        /// factor id -> (email, secret)
        enrolling: HashMap<String, (String, String)>,
        current: Option<Session>,
        fail: bool,
    }

    /// In-process auth provider with fixed accounts.
    #[derive(Default)]
    pub struct StaticAuth {
        state: Mutex<State>,
    }

    impl StaticAuth {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn with_account(self, email: &str, password: &str, user_id: &str) -> Self {
            self.state.lock().await.accounts.insert(
                email.to_string(),
                Account {
                    user_id: user_id.to_string(),
                    password: password.to_string(),
                    mfa_code: None,
                },
            );
            self
        }

        pub async fn require_mfa(self, email: &str, code: &str) -> Self {
            if let Some(account) = self.state.lock().await.accounts.get_mut(email) {
                account.mfa_code = Some(code.to_string());
            }
            self
        }

        pub async fn set_session(&self, session: Option<Session>) {
            self.state.lock().await.current = session;
        }

        /// Make every call fail.
        pub async fn set_fail(&self, fail: bool) {
            self.state.lock().await.fail = fail;
        }

        /// The code an authenticator would show for `secret`.
        pub fn code_for(secret: &str) -> String {
            secret.chars().take(6).collect()
        }
    }

    fn current_email(state: &State) -> Result<String> {
        state
            .current
            .as_ref()
            .map(|session| session.email.clone())
            .ok_or(KanbanError::Unauthenticated)
    }

    fn check(state: &State) -> Result<()> {
        if state.fail {
            return Err(KanbanError::auth("auth provider unavailable"));
        }
        Ok(())
    }

    #[tonic::async_trait]
    impl AuthService for StaticAuth {
        async fn get_session(&self) -> Result<Option<Session>> {
            let state = self.state.lock().await;
            check(&state)?;
            Ok(state.current.clone())
        }

        async fn sign_up(&self, credentials: &Credentials) -> Result<()> {
            let mut state = self.state.lock().await;
            check(&state)?;
            if state.accounts.contains_key(&credentials.email) {
                return Err(KanbanError::auth("email already registered"));
            }
            state.accounts.insert(
                credentials.email.clone(),
                Account {
                    user_id: uuid::Uuid::new_v4().to_string(),
                    password: credentials.password.clone(),
                    mfa_code: None,
                },
            );
            Ok(())
        }

        async fn sign_in(&self, credentials: &Credentials) -> Result<SignIn> {
            let mut state = self.state.lock().await;
            check(&state)?;
            let (session, mfa) = match state.accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => (
                    Session {
                        user_id: account.user_id.clone(),
                        email: credentials.email.clone(),
                    },
                    account.mfa_code.is_some(),
                ),
                _ => return Err(KanbanError::auth("invalid login credentials")),
            };

            if mfa {
                let factor_id = format!("totp-{}", session.user_id);
                state.pending.insert(factor_id.clone(), session);
                return Ok(SignIn::MfaRequired { factor_id });
            }
            state.current = Some(session.clone());
            Ok(SignIn::Complete(session))
        }

        async fn verify_mfa(&self, factor_id: &str, code: &str) -> Result<Session> {
            let mut state = self.state.lock().await;
            check(&state)?;
            let session = state
                .pending
                .get(factor_id)
                .cloned()
                .ok_or_else(|| KanbanError::auth("unknown factor"))?;
            let expected = state
                .accounts
                .get(&session.email)
                .and_then(|account| account.mfa_code.clone());
            if expected.as_deref() != Some(code) {
                return Err(KanbanError::auth("invalid verification code"));
            }
            state.pending.remove(factor_id);
            state.current = Some(session.clone());
            Ok(session)
        }

        async fn sign_out(&self) -> Result<()> {
            let mut state = self.state.lock().await;
            check(&state)?;
            state.current = None;
            Ok(())
        }

        async fn enroll_mfa(&self) -> Result<MfaEnrollment> {
            let mut state = self.state.lock().await;
            check(&state)?;
            let email = current_email(&state)?;
            let factor_id = uuid::Uuid::new_v4().to_string();
            let secret = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
            let qr_code = format!("otpauth://totp/Kanban:{}?secret={}&issuer=Kanban", email, secret);
            state
                .enrolling
                .insert(factor_id.clone(), (email, secret.clone()));
            Ok(MfaEnrollment {
                factor_id,
                qr_code,
                secret,
            })
        }

        async fn verify_enrollment(&self, factor_id: &str, code: &str) -> Result<()> {
            let mut state = self.state.lock().await;
            check(&state)?;
            let (email, secret) = state
                .enrolling
                .get(factor_id)
                .cloned()
                .ok_or_else(|| KanbanError::auth("unknown factor"))?;
            if StaticAuth::code_for(&secret) != code {
                return Err(KanbanError::auth("invalid verification code"));
            }
            state.enrolling.remove(factor_id);
            if let Some(account) = state.accounts.get_mut(&email) {
                account.mfa_code = Some(code.to_string());
            }
            Ok(())
        }

        async fn unenroll_mfa(&self) -> Result<()> {
            let mut state = self.state.lock().await;
            check(&state)?;
            let email = current_email(&state)?;
            match state.accounts.get_mut(&email) {
                Some(account) if account.mfa_code.is_some() => {
                    account.mfa_code = None;
                    Ok(())
                }
                _ => Err(KanbanError::auth("no second factor enrolled")),
            }
        }

        async fn is_mfa_enabled(&self) -> Result<bool> {
            let state = self.state.lock().await;
            check(&state)?;
            let email = current_email(&state)?;
            Ok(state
                .accounts
                .get(&email)
                .map_or(false, |account| account.mfa_code.is_some()))
        }
    }
}
