use anyhow::{Context, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const YEAR_SECS: usize = 365 * 24 * 60 * 60;

/// Claims carried by a hub-minted bearer token (see the wire section for the shape).
#[derive(Debug, Serialize, Deserialize)]
pub struct BearerClaims {
    pub email: String,
    pub exp: usize,
}

/// Claims carried by a short-lived anonymous watercooler redirect token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnonymousRedirectClaims {
    pub team_id: String,
    pub purpose: String,
    pub iat: usize,
    pub exp: usize,
}

pub const ANONYMOUS_WATERCOOLER_PURPOSE: &str = "anonymous_watercooler";

/// The hub's signing secret. There is no dev default: a missing secret is a
/// misconfiguration, not something to silently paper over with a guessable key.
fn session_secret() -> Result<String> {
    std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")
}

fn now() -> Result<usize> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize)
}

/// Mint a bearer token for `email`, valid for one year.
pub fn create_jwt(email: &str) -> Result<String> {
    let claims = BearerClaims {
        email: email.to_string(),
        exp: now()? + YEAR_SECS,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(session_secret()?.as_bytes()),
    )?;
    Ok(token)
}

/// Verify a bearer token and return its claims.
pub fn verify_jwt(token: &str) -> Result<TokenData<BearerClaims>> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<BearerClaims>(
        token,
        &DecodingKey::from_secret(session_secret()?.as_bytes()),
        &validation,
    )?;
    Ok(data)
}

/// Mint an anonymous watercooler redirect token, valid for 10 minutes.
pub fn create_anonymous_redirect(team_id: &str) -> Result<String> {
    let iat = now()?;
    let claims = AnonymousRedirectClaims {
        team_id: team_id.to_string(),
        purpose: ANONYMOUS_WATERCOOLER_PURPOSE.to_string(),
        iat,
        exp: iat + 10 * 60,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(session_secret()?.as_bytes()),
    )?;
    Ok(token)
}

/// Verify an anonymous watercooler redirect token, rejecting any other purpose.
pub fn verify_anonymous_redirect(token: &str) -> Result<AnonymousRedirectClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<AnonymousRedirectClaims>(
        token,
        &DecodingKey::from_secret(session_secret()?.as_bytes()),
        &validation,
    )?;
    if data.claims.purpose != ANONYMOUS_WATERCOOLER_PURPOSE {
        anyhow::bail!("unexpected redirect token purpose: {}", data.claims.purpose);
    }
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_secret<T>(f: impl FnOnce() -> T) -> T {
        std::env::set_var("SESSION_SECRET", "test-secret-do-not-use-in-prod");
        f()
    }

    #[test]
    fn bearer_token_round_trips_email() {
        with_secret(|| {
            let token = create_jwt("ada@example.com").unwrap();
            let data = verify_jwt(&token).unwrap();
            assert_eq!(data.claims.email, "ada@example.com");
        });
    }

    #[test]
    fn anonymous_redirect_rejects_tampered_purpose() {
        with_secret(|| {
            let claims = AnonymousRedirectClaims {
                team_id: "acme".into(),
                purpose: "something_else".into(),
                iat: now().unwrap(),
                exp: now().unwrap() + 600,
            };
            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(session_secret().unwrap().as_bytes()),
            )
            .unwrap();
            assert!(verify_anonymous_redirect(&token).is_err());
        });
    }

    #[test]
    fn anonymous_redirect_round_trips_team_id() {
        with_secret(|| {
            let token = create_anonymous_redirect("acme").unwrap();
            let claims = verify_anonymous_redirect(&token).unwrap();
            assert_eq!(claims.team_id, "acme");
            assert_eq!(claims.purpose, ANONYMOUS_WATERCOOLER_PURPOSE);
        });
    }
}
