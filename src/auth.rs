//! Credentials and bearer tokens
//!
//! Passwords are stored as `pbkdf2_sha256$<iterations>$<salt>$<hex digest>`.
//! Tokens are HS256 JWTs carrying the account id, role and external id.

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::model::{Account, Role};
use crate::storage::Database;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};

const HASH_PREFIX: &str = "pbkdf2_sha256";
const DIGEST_LEN: usize = 32;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let digest = derive(password, &salt, iterations);
    format!("{}${}${}${}", HASH_PREFIX, iterations, salt, hex::encode(digest))
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

/// Whether a stored value is already in the hashed format
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with(&format!("{}$", HASH_PREFIX))
}

/// Check a password against a stored hash. Unhashed values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(HASH_PREFIX), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    if expected.len() != DIGEST_LEN {
        return false;
    }

    let actual = derive(password, salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ==================== Tokens ====================

/// Bearer token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub external_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn account_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::unauthorized("Invalid token subject"))
    }
}

/// Issues and validates bearer tokens
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: i64,
}

impl TokenKeys {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        if config.token_secret.is_empty() {
            return Err(Error::Other(anyhow::anyhow!(
                "auth.token_secret is not set; run 'academia init'"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.token_secret.as_bytes()),
            ttl_minutes: config.token_ttl_minutes,
        })
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_minutes * 60
    }

    pub fn issue(&self, account: &Account) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            role: account.role,
            external_id: account.external_id,
            exp: iat + self.ttl_seconds(),
            iat,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to sign token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("rejected token: {}", e);
                Error::unauthorized("Invalid or expired token")
            })
    }
}

// ==================== Login ====================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: Account,
}

fn required(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// A login request matched to its account, not yet checked against the
/// password. Verification is the slow half and needs no database.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    account: Account,
    password: String,
}

/// Find the account a login request names
pub fn begin_login(db: &Database, req: &LoginRequest) -> Result<PendingLogin> {
    let (Some(email), Some(password), Some(role)) = (
        required(&req.email),
        req.password.as_deref().filter(|p| !p.is_empty()),
        required(&req.role),
    ) else {
        return Err(Error::validation("Email, password, and role are required"));
    };

    let role: Role = role.parse().map_err(|_| invalid_credentials())?;
    let account = db
        .get_account_by_email_and_role(email, role)?
        .ok_or_else(invalid_credentials)?;

    Ok(PendingLogin {
        account,
        password: password.to_string(),
    })
}

impl PendingLogin {
    /// Check the password and issue a token
    pub fn finish(self, keys: &TokenKeys) -> Result<LoginResponse> {
        if !verify_password(&self.password, &self.account.password_hash) {
            warn!("failed login for {} ({})", self.account.email, self.account.role);
            return Err(invalid_credentials());
        }

        info!("login: {} ({})", self.account.email, self.account.role);
        Ok(LoginResponse {
            access: keys.issue(&self.account)?,
            token_type: "Bearer",
            expires_in: keys.ttl_seconds(),
            user: self.account,
        })
    }
}

/// Authenticate by `(email, role)` and password and issue a token
pub fn login(db: &Database, keys: &TokenKeys, req: &LoginRequest) -> Result<LoginResponse> {
    begin_login(db, req)?.finish(keys)
}

fn invalid_credentials() -> Error {
    Error::unauthorized("Invalid credentials")
}

// ==================== Legacy passcodes ====================

/// How many stored values were converted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RehashReport {
    pub accounts: usize,
    pub profiles: usize,
}

/// Hash every stored password that is not already hashed
pub fn rehash(db: &Database, iterations: u32) -> Result<RehashReport> {
    db.in_transaction(|db| {
        let mut report = RehashReport::default();

        for account in db.list_accounts()? {
            if !is_hashed(&account.password_hash) {
                db.set_account_password_hash(
                    account.id,
                    &hash_password(&account.password_hash, iterations),
                )?;
                report.accounts += 1;
            }
        }

        for (key, stored) in db.list_profile_hashes()? {
            if !is_hashed(&stored) {
                db.set_profile_password_hash(key, &hash_password(&stored, iterations))?;
                report.profiles += 1;
            }
        }

        info!(
            "rehashed {} account and {} profile passwords",
            report.accounts, report.profiles
        );
        Ok(report)
    })
}
