// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chulha_core::sha256_hex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const CODE_INVALID_CREDENTIAL: &str = "auth/invalid-credential";
pub const CODE_TOO_MANY_REQUESTS: &str = "auth/too-many-requests";
pub const CODE_EMAIL_IN_USE: &str = "auth/email-already-in-use";
pub const CODE_MISSING_FIELDS: &str = "auth/missing-fields";

pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("auth/invalid-credential: invalid credential")]
    InvalidCredential,
    #[error("auth/too-many-requests: too many failed attempts")]
    RateLimited,
    #[error("{code}: {message}")]
    Other { code: String, message: String },
}

impl AuthError {
    /// Maps an identity-provider error code onto the kinds a caller handles.
    #[must_use]
    pub fn from_provider_code(code: &str, message: &str) -> Self {
        match code {
            CODE_INVALID_CREDENTIAL
            | "auth/wrong-password"
            | "auth/user-not-found"
            | "auth/invalid-email" => Self::InvalidCredential,
            CODE_TOO_MANY_REQUESTS => Self::RateLimited,
            _ => Self::Other {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidCredential => CODE_INVALID_CREDENTIAL,
            Self::RateLimited => CODE_TOO_MANY_REQUESTS,
            Self::Other { code, .. } => code,
        }
    }

    /// Text shown on the login form.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "Invalid email or password.",
            Self::RateLimited => "Too many failed attempts. Try again later.",
            Self::Other { code, .. } if code == CODE_MISSING_FIELDS => {
                "Please provide both email and password."
            }
            Self::Other { .. } => "Login failed. Please try again.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub uid: String,
    pub identifier: String,
    pub issued_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthService: Send + Sync + 'static {
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, AuthError>;
}

/// Rejects blank input locally, then asks `service`.
pub async fn sign_in(
    service: &dyn AuthService,
    identifier: &str,
    secret: &str,
) -> Result<Session, AuthError> {
    if identifier.trim().is_empty() || secret.is_empty() {
        return Err(AuthError::Other {
            code: CODE_MISSING_FIELDS.to_string(),
            message: "identifier and secret are required".to_string(),
        });
    }
    service.sign_in(identifier, secret).await
}

struct Account {
    uid: String,
    salt: String,
    digest: String,
}

/// Account table held in memory. Passwords are stored as salted sha256
/// digests. An identifier is locked out after `max_failed_attempts`
/// consecutive failures until a successful `reset_failures`.
pub struct InMemoryAuthService {
    accounts: Mutex<HashMap<String, Account>>,
    failures: Mutex<HashMap<String, u32>>,
    max_failed_attempts: u32,
    seq: AtomicU64,
    pub sign_in_calls: AtomicU64,
}

impl Default for InMemoryAuthService {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILED_ATTEMPTS)
    }
}

impl InMemoryAuthService {
    #[must_use]
    pub fn new(max_failed_attempts: u32) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            max_failed_attempts: max_failed_attempts.max(1),
            seq: AtomicU64::new(1),
            sign_in_calls: AtomicU64::new(0),
        }
    }

    pub async fn create_user(&self, identifier: &str, secret: &str) -> Result<String, AuthError> {
        let key = normalize(identifier);
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&key) {
            return Err(AuthError::Other {
                code: CODE_EMAIL_IN_USE.to_string(),
                message: format!("{key} is already registered"),
            });
        }
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let salt = sha256_hex(format!("salt:{key}:{n}:{stamp}").as_bytes())[..16].to_string();
        let uid = sha256_hex(format!("uid:{key}:{n}:{stamp}").as_bytes())[..28].to_string();
        accounts.insert(
            key.clone(),
            Account {
                uid: uid.clone(),
                digest: digest(&salt, secret),
                salt,
            },
        );
        info!(identifier = %key, "user created");
        Ok(uid)
    }

    pub async fn reset_failures(&self, identifier: &str) {
        self.failures.lock().await.remove(&normalize(identifier));
    }

    async fn record_failure(&self, key: &str) {
        let mut failures = self.failures.lock().await;
        let count = failures.entry(key.to_string()).or_insert(0);
        *count += 1;
        warn!(identifier = %key, failures = *count, "sign-in failed");
    }
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_ascii_lowercase()
}

fn digest(salt: &str, secret: &str) -> String {
    sha256_hex(format!("{salt}:{secret}").as_bytes())
}

#[async_trait]
impl AuthService for InMemoryAuthService {
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, AuthError> {
        self.sign_in_calls.fetch_add(1, Ordering::Relaxed);
        let key = normalize(identifier);
        let failures = self.failures.lock().await.get(&key).copied().unwrap_or(0);
        if failures >= self.max_failed_attempts {
            warn!(identifier = %key, "sign-in rate limited");
            return Err(AuthError::RateLimited);
        }
        let uid = {
            let accounts = self.accounts.lock().await;
            accounts
                .get(&key)
                .filter(|account| digest(&account.salt, secret) == account.digest)
                .map(|account| account.uid.clone())
        };
        let Some(uid) = uid else {
            self.record_failure(&key).await;
            return Err(AuthError::InvalidCredential);
        };
        self.failures.lock().await.remove(&key);
        info!(identifier = %key, "signed in");
        Ok(Session {
            uid,
            identifier: key,
            issued_at: Utc::now(),
        })
    }
}
