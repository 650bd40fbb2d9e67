//! Password hashing and bearer tokens.
//!
//! Passwords are stored as PHC strings,
//! `$pbkdf2-sha256$i=<iterations>,l=32$<salt>$<hash>`. Tokens are compact
//! JWTs signed with HMAC (`HS256`, `HS384` or `HS512`) carrying `{sub, exp}`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::Rng;
use serde_json::json;
use sha2::{Sha256, Sha384, Sha512};
use study_models::{AuthConfig, StudyError, TokenClaims};
use tracing::debug;

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> Result<String, StudyError> {
        let salt_bytes: [u8; SALT_LEN] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(internal)?;
        let params = Params {
            rounds: self.iterations,
            output_length: HASH_LEN,
        };
        let hash = Pbkdf2
            .hash_password_customized(
                password.as_bytes(),
                Some(pbkdf2::Algorithm::Pbkdf2Sha256.ident()),
                None,
                params,
                &salt,
            )
            .map_err(internal)?;
        Ok(hash.to_string())
    }

    /// Iterations come from the stored hash. Malformed hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

fn internal(e: impl std::fmt::Display) -> StudyError {
    StudyError::InternalError {
        reason: e.to_string(),
    }
}

/// HMAC over `message`, ready to finalize or verify.
fn keyed<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<M, StudyError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(internal)?;
    mac.update(message);
    Ok(mac)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl Algorithm {
    fn parse(name: &str) -> Result<Self, StudyError> {
        match name {
            "HS256" => Ok(Algorithm::Hs256),
            "HS384" => Ok(Algorithm::Hs384),
            "HS512" => Ok(Algorithm::Hs512),
            other => Err(StudyError::ConfigError {
                reason: format!("unsupported token algorithm: {}", other),
            }),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Algorithm::Hs256 => "HS256",
            Algorithm::Hs384 => "HS384",
            Algorithm::Hs512 => "HS512",
        }
    }

    fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, StudyError> {
        Ok(match self {
            Algorithm::Hs256 => keyed::<Hmac<Sha256>>(key, message)?.finalize().into_bytes().to_vec(),
            Algorithm::Hs384 => keyed::<Hmac<Sha384>>(key, message)?.finalize().into_bytes().to_vec(),
            Algorithm::Hs512 => keyed::<Hmac<Sha512>>(key, message)?.finalize().into_bytes().to_vec(),
        })
    }

    /// Constant-time check of `signature` against the MAC of `message`.
    fn verify(&self, key: &[u8], message: &[u8], signature: &[u8]) -> Result<bool, StudyError> {
        Ok(match self {
            Algorithm::Hs256 => keyed::<Hmac<Sha256>>(key, message)?.verify_slice(signature).is_ok(),
            Algorithm::Hs384 => keyed::<Hmac<Sha384>>(key, message)?.verify_slice(signature).is_ok(),
            Algorithm::Hs512 => keyed::<Hmac<Sha512>>(key, message)?.verify_slice(signature).is_ok(),
        })
    }
}

/// Issues and validates access tokens.
#[derive(Debug, Clone)]
pub struct TokenService {
    secret: Vec<u8>,
    algorithm: Algorithm,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Result<Self, StudyError> {
        Ok(Self {
            secret: config.secret_key.as_bytes().to_vec(),
            algorithm: Algorithm::parse(&config.algorithm)?,
            lifetime: Duration::minutes(config.access_token_expire_minutes),
        })
    }

    pub fn create_access_token(&self, subject: &str) -> Result<String, StudyError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            exp: (Utc::now() + self.lifetime).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &TokenClaims) -> Result<String, StudyError> {
        let header = json!({ "alg": self.algorithm.name(), "typ": "JWT" });
        let payload = serde_json::to_vec(claims).map_err(internal)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.algorithm.sign(&self.secret, signing_input.as_bytes())?;
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verify signature and expiry. Any structural problem is
    /// `InvalidToken`; a valid but stale token is `TokenExpired`.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, StudyError> {
        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(StudyError::InvalidToken);
        };

        let header: serde_json::Value = URL_SAFE_NO_PAD
            .decode(header)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(StudyError::InvalidToken)?;
        if header.get("alg").and_then(|a| a.as_str()) != Some(self.algorithm.name()) {
            debug!("Rejecting token signed with a different algorithm");
            return Err(StudyError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| StudyError::InvalidToken)?;
        let valid = self
            .algorithm
            .verify(&self.secret, signing_input(token).as_bytes(), &signature)?;
        if !valid {
            return Err(StudyError::InvalidToken);
        }

        let claims: TokenClaims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(StudyError::InvalidToken)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(StudyError::TokenExpired);
        }
        Ok(claims)
    }
}

/// `header.payload` of a compact token.
fn signing_input(token: &str) -> &str {
    match token.rfind('.') {
        Some(idx) => &token[..idx],
        None => token,
    }
}
