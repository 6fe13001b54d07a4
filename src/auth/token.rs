//! Signed bearer tokens for users and applications.
//!
//! Both audiences are issued with the platform secret. Verification picks the
//! secret from the claim set: the platform secret for user claims, the
//! application's own client secret for application claims.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::{self, Store};
use crate::types::{Application, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationClaims {
    pub client_id: String,
    pub owner_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claim set read from a token before its signature is checked.
#[derive(Debug)]
enum ClaimSet {
    User(UserClaims),
    Application(ApplicationClaims),
}

impl ClaimSet {
    fn exp(&self) -> i64 {
        match self {
            ClaimSet::User(c) => c.exp,
            ClaimSet::Application(c) => c.exp,
        }
    }
}

/// A token whose signature and expiry have been checked.
#[derive(Debug, Clone)]
pub enum VerifiedToken {
    User(UserClaims),
    /// The application whose client secret verified the token.
    Application(Application),
}

pub struct TokenService {
    secret: Vec<u8>,
    ttl: Duration,
    store: Arc<dyn Store>,
}

impl TokenService {
    pub fn new(secret: Vec<u8>, ttl: Duration, store: Arc<dyn Store>) -> Self {
        Self { secret, ttl, store }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn sign_user_token(&self, user_id: &str, role: Role) -> Result<String> {
        let (iat, exp) = self.window();
        encode_claims(
            &self.secret,
            &UserClaims {
                sub: user_id.to_string(),
                role,
                iat,
                exp,
            },
        )
    }

    /// Issues an application token.
    ///
    /// The token is signed with the platform secret while verification expects
    /// the application's client secret, so tokens from here are rejected by
    /// [`TokenService::verify`] unless the two secrets coincide.
    pub fn sign_application_token(&self, client_id: &str, owner_id: &str) -> Result<String> {
        let (iat, exp) = self.window();
        encode_claims(
            &self.secret,
            &ApplicationClaims {
                client_id: client_id.to_string(),
                owner_id: owner_id.to_string(),
                iat,
                exp,
            },
        )
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedToken> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    /// Verifies `token` as of the unix time `now`.
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedToken> {
        let claims = peek_claims(token)?;
        if now >= claims.exp() {
            return Err(Error::TokenExpired);
        }

        match claims {
            ClaimSet::User(_) => {
                let verified: UserClaims = check_signature(token, &self.secret)?;
                Ok(VerifiedToken::User(verified))
            }
            ClaimSet::Application(claims) => {
                let app = self.resolve_application(&claims).await?;
                check_signature::<ApplicationClaims>(token, app.client_secret.as_bytes())?;
                Ok(VerifiedToken::Application(app))
            }
        }
    }

    async fn resolve_application(&self, claims: &ApplicationClaims) -> Result<Application> {
        let client_id = claims.client_id.clone();
        let owner_id = claims.owner_id.clone();
        match store::blocking(&self.store, move |s| s.find_application(&client_id, &owner_id)).await {
            Ok(Some(app)) => Ok(app),
            Ok(None) => Err(Error::SecretResolutionFailed),
            Err(e) => {
                tracing::error!("Application lookup failed: {e}");
                Err(Error::SecretResolutionFailed)
            }
        }
    }

    fn window(&self) -> (i64, i64) {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        (iat, iat.saturating_add(ttl))
    }
}

/// Signs `claims` with HS256 under `secret`.
pub fn encode_claims<T: Serialize>(secret: &[u8], claims: &T) -> Result<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| Error::Config(format!("failed to sign token: {e}")))
}

/// Reads the payload segment without checking the signature and classifies it.
fn peek_claims(token: &str) -> Result<ClaimSet> {
    let mut segments = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return Err(Error::MalformedToken);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| Error::MalformedToken)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| Error::MalformedToken)?;

    let claims = if value.get("sub").is_some() {
        ClaimSet::User(from_value(value)?)
    } else if value.get("client_id").is_some() && value.get("owner_id").is_some() {
        ClaimSet::Application(from_value(value)?)
    } else {
        return Err(Error::MalformedToken);
    };
    Ok(claims)
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|_| Error::MalformedToken)
}

fn check_signature<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Result<T> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims = HashSet::new();

    decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!("Token signature rejected: {e}");
            Error::InvalidSignature
        })
}
