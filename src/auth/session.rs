//! Session validation.
//!
//! The identity provider issues a signed session cookie after sign-in; the
//! proxy only needs to answer "is there a valid session, and whose is it".
//! [`SessionValidator`] is that seam. [`SignedSessionValidator`] verifies the
//! HMAC-signed cookie format shared with the issuer.

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::SessionConfig;
use crate::http::request::Request;

type HmacSha256 = Hmac<Sha256>;

/// Identity of the signed-in dashboard user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Verified email, used as the backend audit key
    pub email: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            user_id: None,
            name: None,
        }
    }
}

/// Resolves the session carried by a request.
///
/// `None` is the normal "not signed in" outcome, not an error.
pub trait SessionValidator: Send + Sync + 'static {
    fn validate(&self, request: &Request) -> impl Future<Output = Option<Identity>> + Send;
}

/// Claims carried inside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiry, unix seconds
    pub exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionRejection {
    #[error("malformed session token")]
    Malformed,
    #[error("session signature mismatch")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session has no email")]
    MissingEmail,
    #[error("email domain not allowed")]
    DomainNotAllowed,
}

/// Validates `base64url(claims).base64url(hmac_sha256(claims_part))` cookies.
#[derive(Debug)]
pub struct SignedSessionValidator {
    secret: SecretString,
    cookie_names: Vec<String>,
    allowed_email_domain: Option<String>,
}

impl SignedSessionValidator {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            cookie_names: SessionConfig::default().cookie_names,
            allowed_email_domain: None,
        }
    }

    /// Builds a validator from configuration. Returns `None` without a secret.
    pub fn from_config(config: SessionConfig) -> Option<Self> {
        let secret = config.secret?;
        Some(Self {
            secret,
            cookie_names: config.cookie_names,
            allowed_email_domain: config.allowed_email_domain,
        })
    }

    pub fn with_cookie_names(mut self, names: Vec<String>) -> Self {
        self.cookie_names = names;
        self
    }

    pub fn with_allowed_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_email_domain = Some(domain.into().trim_start_matches('@').to_ascii_lowercase());
        self
    }

    /// Finds the session token in the request cookies, honouring the
    /// configured cookie order.
    pub fn session_token<'a>(&self, request: &'a Request) -> Option<&'a str> {
        let cookie_header = request.header("cookie")?;
        self.cookie_names.iter().find_map(|name| {
            cookie_header.split([';', ',']).find_map(|cookie| {
                let (key, value) = cookie.trim().split_once('=')?;
                (key == name.as_str())
                    .then(|| value.trim_matches('"'))
                    .filter(|value| !value.is_empty())
            })
        })
    }

    /// Verifies a token against the secret and the clock `now` (unix seconds).
    pub fn verify(&self, token: &str, now: u64) -> Result<Identity, SessionRejection> {
        let (payload_part, signature_part) =
            token.split_once('.').ok_or(SessionRejection::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature_part)
            .map_err(|_| SessionRejection::Malformed)?;

        let mut mac = mac_for(self.secret.expose_secret()).ok_or(SessionRejection::Malformed)?;
        mac.update(payload_part.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionRejection::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|_| SessionRejection::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionRejection::Malformed)?;

        if claims.exp <= now {
            return Err(SessionRejection::Expired);
        }

        let email = claims
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or(SessionRejection::MissingEmail)?;

        if let Some(domain) = &self.allowed_email_domain {
            let allowed = email
                .rsplit_once('@')
                .is_some_and(|(_, host)| host.eq_ignore_ascii_case(domain));
            if !allowed {
                return Err(SessionRejection::DomainNotAllowed);
            }
        }

        Ok(Identity {
            email,
            user_id: claims.sub,
            name: claims.name,
        })
    }
}

impl SessionValidator for SignedSessionValidator {
    async fn validate(&self, request: &Request) -> Option<Identity> {
        let token = self.session_token(request)?;
        match self.verify(token, unix_now()) {
            Ok(identity) => Some(identity),
            Err(rejection) => {
                tracing::debug!(reason = %rejection, "Session rejected");
                None
            }
        }
    }
}

/// Issues a token in the format [`SignedSessionValidator`] accepts.
pub fn sign_session(secret: &str, claims: &SessionClaims) -> Option<String> {
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).ok()?);
    let mut mac = mac_for(secret)?;
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Some(format!("{payload}.{signature}"))
}

fn mac_for(secret: &str) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).ok()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
