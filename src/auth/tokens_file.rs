use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::auth::oauth::Tokens;

/// Seconds shaved off the expiry so a token is never used right at its edge.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Used when the provider omits `expires_in`.
const DEFAULT_LIFETIME_SECS: i64 = 3500;

/// The persisted OAuth credential (token.json).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at_epoch: Option<i64>, // epoch seconds
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// Builds a credential from a token response received at `now`.
    /// A response without a refresh token keeps `previous_refresh`.
    pub fn from_tokens(
        tokens: Tokens,
        now: i64,
        previous_refresh: Option<String>,
        scope: &str,
    ) -> Self {
        let lifetime = tokens
            .expires_in
            .map(|s| s as i64)
            .unwrap_or(DEFAULT_LIFETIME_SECS);
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token.or(previous_refresh),
            expires_at_epoch: Some(now + lifetime),
            scopes: vec![scope.to_string()],
        }
    }

    /// The access token if it is still usable at `now`.
    pub fn valid_access_token(&self, now: i64) -> Option<&str> {
        match (&self.access_token, self.expires_at_epoch) {
            (Some(at), Some(exp)) if now < exp - EXPIRY_SKEW_SECS => Some(at.as_str()),
            _ => None,
        }
    }
}

pub fn save_tokens(path: &Path, credential: &Credential) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(credential)?;
    fs::write(path, s).with_context(|| format!("writing credential file {}", path.display()))?;
    Ok(())
}

/// Load the credential file if present
pub fn load_tokens(path: &Path) -> Result<Option<Credential>> {
    if !path.exists() {
        return Ok(None);
    }
    let s = fs::read_to_string(path)?;
    let cred: Credential = serde_json::from_str(&s)
        .with_context(|| format!("parsing credential file {}", path.display()))?;
    Ok(Some(cred))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");
        assert!(load_tokens(&path).unwrap().is_none());

        let cred = Credential {
            access_token: Some("ya29.a0".into()),
            refresh_token: Some("1//0g".into()),
            expires_at_epoch: Some(1_700_000_000),
            scopes: vec!["https://www.googleapis.com/auth/gmail.readonly".into()],
        };
        save_tokens(&path, &cred).unwrap();
        assert_eq!(load_tokens(&path).unwrap(), Some(cred));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{not json").unwrap();
        assert!(load_tokens(&path).is_err());
    }

    #[test]
    fn validity_respects_skew() {
        let cred = Credential {
            access_token: Some("at".into()),
            expires_at_epoch: Some(1_000),
            ..Credential::default()
        };
        assert_eq!(cred.valid_access_token(900), Some("at"));
        assert_eq!(cred.valid_access_token(950), None);
        assert_eq!(cred.valid_access_token(2_000), None);

        let no_expiry = Credential {
            access_token: Some("at".into()),
            ..Credential::default()
        };
        assert_eq!(no_expiry.valid_access_token(0), None);
    }

    #[test]
    fn refresh_response_without_refresh_token_keeps_old_one() {
        let tokens = Tokens {
            access_token: "fresh".into(),
            refresh_token: None,
            expires_in: Some(3599),
        };
        let cred = Credential::from_tokens(tokens, 100, Some("kept".into()), "scope");
        assert_eq!(cred.refresh_token.as_deref(), Some("kept"));
        assert_eq!(cred.expires_at_epoch, Some(3699));
        assert_eq!(cred.access_token.as_deref(), Some("fresh"));
    }
}
