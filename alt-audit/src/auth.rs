//! Caller identity, capability checks and anti-forgery tokens.
//!
//! Tokens are bound to an action, a caller session and a time tick. A token
//! stays valid for the tick it was issued in and the one after, so with the
//! default 12 hour tick a token lives between 12 and 24 hours.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default tick length (half of the maximum token lifetime).
pub const DEFAULT_TICK: Duration = Duration::from_secs(12 * 60 * 60);

/// Bytes of the MAC kept in a token.
const TOKEN_BYTES: usize = 16;

/// Permission a caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Site administration: run exports and download reports.
    ManageOptions,
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    /// Opaque session identifier the token is bound to.
    pub session: String,
}

impl Caller {
    #[must_use]
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
        }
    }
}

/// Decides whether a caller holds a capability.
pub trait Authorizer: Send + Sync {
    fn has_capability(&self, caller: &Caller, capability: Capability) -> bool;
}

/// Grants every capability to a fixed set of administrator sessions.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    admin_sessions: HashSet<String>,
}

impl StaticAuthorizer {
    #[must_use]
    pub fn new<I, S>(admin_sessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admin_sessions: admin_sessions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for StaticAuthorizer {
    fn has_capability(&self, caller: &Caller, capability: Capability) -> bool {
        match capability {
            Capability::ManageOptions => {
                !caller.session.is_empty() && self.admin_sessions.contains(&caller.session)
            }
        }
    }
}

/// Action a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonceAction {
    Export,
    Download,
}

impl NonceAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Export => "alt_audit_export",
            Self::Download => "alt_audit_download",
        }
    }
}

/// Issues and verifies anti-forgery tokens with a server-side secret.
#[derive(Clone)]
pub struct NonceIssuer {
    secret: Vec<u8>,
    tick: Duration,
}

impl std::fmt::Debug for NonceIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceIssuer")
            .field("secret", &"<redacted>")
            .field("tick", &self.tick)
            .finish()
    }
}

impl NonceIssuer {
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            tick: DEFAULT_TICK,
        }
    }

    /// Change the tick length. Zero is treated as one second.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_secs(1));
        self
    }

    /// Issue a token for `action` and `caller`, valid now.
    #[must_use]
    pub fn issue(&self, action: NonceAction, caller: &Caller) -> String {
        self.issue_at(action, caller, Utc::now())
    }

    #[must_use]
    pub fn issue_at(&self, action: NonceAction, caller: &Caller, now: DateTime<Utc>) -> String {
        self.mac(action, caller, self.tick_at(now))
            .map(|mac| hex::encode(&mac.finalize().into_bytes()[..TOKEN_BYTES]))
            .unwrap_or_default()
    }

    /// Check a token against the current and previous tick.
    #[must_use]
    pub fn verify(&self, token: &str, action: NonceAction, caller: &Caller) -> bool {
        self.verify_at(token, action, caller, Utc::now())
    }

    #[must_use]
    pub fn verify_at(
        &self,
        token: &str,
        action: NonceAction,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> bool {
        if caller.session.is_empty() {
            return false;
        }
        let Ok(tag) = hex::decode(token) else {
            return false;
        };
        if tag.len() != TOKEN_BYTES {
            return false;
        }
        let tick = self.tick_at(now);
        [tick, tick.saturating_sub(1)].into_iter().any(|t| {
            self.mac(action, caller, t)
                .is_some_and(|mac| mac.verify_truncated_left(&tag).is_ok())
        })
    }

    fn tick_at(&self, now: DateTime<Utc>) -> u64 {
        let secs = u64::try_from(now.timestamp()).unwrap_or(0);
        secs.div_ceil(self.tick.as_secs().max(1))
    }

    /// MAC over `tick|action|session`. `None` only if the key is rejected.
    fn mac(&self, action: NonceAction, caller: &Caller, tick: u64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(format!("{tick}|{}|{}", action.as_str(), caller.session).as_bytes());
        Some(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_token_round_trip() {
        let issuer = NonceIssuer::new("s3cret");
        let caller = Caller::new("session-a");
        let token = issuer.issue_at(NonceAction::Export, &caller, at(1_700_000_000));
        assert_eq!(token.len(), 32);
        assert!(issuer.verify_at(&token, NonceAction::Export, &caller, at(1_700_000_000)));
    }

    #[test]
    fn test_token_bound_to_action_session_and_secret() {
        let issuer = NonceIssuer::new("s3cret");
        let caller = Caller::new("session-a");
        let now = at(1_700_000_000);
        let token = issuer.issue_at(NonceAction::Export, &caller, now);

        assert!(!issuer.verify_at(&token, NonceAction::Download, &caller, now));
        assert!(!issuer.verify_at(&token, NonceAction::Export, &Caller::new("session-b"), now));
        assert!(!NonceIssuer::new("other").verify_at(&token, NonceAction::Export, &caller, now));
        assert!(!issuer.verify_at("", NonceAction::Export, &caller, now));
    }

    #[test]
    fn test_token_expires_after_two_ticks() {
        let issuer = NonceIssuer::new("s3cret").with_tick(Duration::from_secs(100));
        let caller = Caller::new("session-a");
        let token = issuer.issue_at(NonceAction::Export, &caller, at(1_050));

        assert!(issuer.verify_at(&token, NonceAction::Export, &caller, at(1_100)));
        assert!(issuer.verify_at(&token, NonceAction::Export, &caller, at(1_150)));
        assert!(!issuer.verify_at(&token, NonceAction::Export, &caller, at(1_250)));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let issuer = NonceIssuer::new("s3cret");
        let caller = Caller::new("session-a");
        let now = at(1_700_000_000);
        let token = issuer.issue_at(NonceAction::Export, &caller, now);

        assert!(!issuer.verify_at(&token[..30], NonceAction::Export, &caller, now));
        assert!(!issuer.verify_at(&format!("{token}00"), NonceAction::Export, &caller, now));
        assert!(!issuer.verify_at("zz", NonceAction::Export, &caller, now));
        assert!(!issuer.verify_at(&token, NonceAction::Export, &Caller::new(""), now));
    }

    #[test]
    fn test_static_authorizer() {
        let auth = StaticAuthorizer::new(["admin-1"]);
        assert!(auth.has_capability(&Caller::new("admin-1"), Capability::ManageOptions));
        assert!(!auth.has_capability(&Caller::new("editor"), Capability::ManageOptions));
        assert!(!auth.has_capability(&Caller::new(""), Capability::ManageOptions));
    }
}
