//! Token Issuer: signs SFU media grants and the hub's own anonymous redirect tokens.
//!
//! Two distinct signing keys are in play here, matching the two kinds of credential:
//! media grants are signed with the SFU's API key/secret (the SFU verifies them), while
//! anonymous redirect tokens are signed with the hub's own `SESSION_SECRET` (the hub
//! verifies them itself, on the redirect endpoint).

use anyhow::{Context, Result};
use livekit_api::access_token::{AccessToken, VideoGrants};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use auth::{verify_anonymous_redirect, AnonymousRedirectClaims};

const CALL_GRANT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const ANONYMOUS_GRANT_TTL: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallTokens {
    #[serde(rename = "audioToken")]
    pub audio_token: String,
    #[serde(rename = "videoToken")]
    pub video_token: String,
}

pub struct TokenIssuer {
    api_key: String,
    api_secret: String,
}

impl TokenIssuer {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Mint the audio+video grant pair for one participant of a call in `room_id`.
    pub fn mint_call_tokens(
        &self,
        room_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<CallTokens> {
        let audio_token = self.mint_grant(
            room_id,
            &format!("room:{room_id}:{user_id}:audio"),
            &format!("{display_name} audio"),
            CALL_GRANT_TTL,
        )?;
        let video_token = self.mint_grant(
            room_id,
            &format!("room:{room_id}:{user_id}:video"),
            &format!("{display_name} video"),
            CALL_GRANT_TTL,
        )?;
        Ok(CallTokens {
            audio_token,
            video_token,
        })
    }

    /// Mint a 3-hour audio-only grant for an anonymous watercooler participant.
    pub fn mint_anonymous_grant(&self, room_id: &str, identity: &str) -> Result<String> {
        self.mint_grant(room_id, identity, identity, ANONYMOUS_GRANT_TTL)
    }

    fn mint_grant(
        &self,
        room_id: &str,
        identity: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<String> {
        let grants = VideoGrants {
            room_join: true,
            room: room_id.to_string(),
            ..Default::default()
        };
        AccessToken::with_api_key(&self.api_key, &self.api_secret)
            .with_identity(identity)
            .with_name(name)
            .with_ttl(ttl)
            .with_grants(grants)
            .to_jwt()
            .context("signing media grant")
    }
}

/// A fresh `anonymous-XXXX` identity (4 random lowercase-alphanumeric characters).
pub fn anonymous_identity() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    let suffix: String = (0..4)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect();
    format!("anonymous-{suffix}")
}

/// Mint a 10-minute anonymous watercooler redirect token signed with the hub's own
/// session secret.
pub fn mint_anonymous_redirect(team_id: &str) -> Result<String> {
    auth::create_anonymous_redirect(team_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use std::collections::HashMap;

    #[derive(Debug, Deserialize)]
    struct RawGrantClaims {
        sub: String,
        name: Option<String>,
        exp: usize,
        iat: usize,
        video: HashMap<String, serde_json::Value>,
    }

    fn decode_unverified(token: &str) -> RawGrantClaims {
        // Tests only inspect shape/expiry; the signature is verified by the SFU, not here.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let data = decode::<RawGrantClaims>(token, &DecodingKey::from_secret(b""), &validation)
            .expect("decode grant");
        data.claims
    }

    #[test]
    fn call_tokens_carry_expected_identity_and_expiry() {
        let issuer = TokenIssuer::new("key", "secret");
        let tokens = issuer
            .mint_call_tokens("room-1", "user-1", "Ada")
            .expect("mint call tokens");

        let audio = decode_unverified(&tokens.audio_token);
        assert_eq!(audio.sub, "room:room-1:user-1:audio");
        assert_eq!(audio.name.as_deref(), Some("Ada audio"));
        assert!(audio.exp - audio.iat >= 23 * 60 * 60);
        assert_eq!(audio.video.get("room").and_then(|v| v.as_str()), Some("room-1"));

        let video = decode_unverified(&tokens.video_token);
        assert_eq!(video.sub, "room:room-1:user-1:video");
        assert_ne!(tokens.audio_token, tokens.video_token);
    }

    #[test]
    fn anonymous_grant_is_shorter_lived_than_call_grant() {
        let issuer = TokenIssuer::new("key", "secret");
        let identity = anonymous_identity();
        assert!(identity.starts_with("anonymous-"));
        assert_eq!(identity.len(), "anonymous-".len() + 4);

        let grant = issuer
            .mint_anonymous_grant("team-acme-watercooler", &identity)
            .expect("mint anonymous grant");
        let claims = decode_unverified(&grant);
        assert_eq!(claims.sub, identity);
        let lifetime = claims.exp - claims.iat;
        assert!(lifetime <= 3 * 60 * 60 + 5);
        assert!(lifetime < 23 * 60 * 60);
    }

    #[test]
    fn anonymous_redirect_round_trips_and_rejects_wrong_purpose() {
        std::env::set_var("SESSION_SECRET", "tokens-crate-test-secret");
        let token = mint_anonymous_redirect("acme").expect("mint redirect token");
        let claims = verify_anonymous_redirect(&token).expect("verify redirect token");
        assert_eq!(claims.team_id, "acme");
        assert_eq!(claims.purpose, auth::ANONYMOUS_WATERCOOLER_PURPOSE);
        assert_eq!(claims.exp - claims.iat, 10 * 60);
    }
}
