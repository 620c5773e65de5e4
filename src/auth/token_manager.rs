use anyhow::Result;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::oauth::{self, ClientCredentials, GMAIL_READONLY_SCOPE, Tokens};
use crate::auth::tokens_file::{self, Credential};
use crate::auth::{AuthError, token_store};
use crate::config::{self, Config};

/// The human-in-the-loop step that yields fresh tokens.
pub trait Authorizer {
    fn authorize(&self, client: &ClientCredentials) -> Result<Tokens>;
}

/// Browser consent with a loopback redirect.
pub struct BrowserAuthorizer {
    pub redirect_uri: String,
}

impl Authorizer for BrowserAuthorizer {
    fn authorize(&self, client: &ClientCredentials) -> Result<Tokens> {
        oauth::perform_pkce_flow(client, &self.redirect_uri, GMAIL_READONLY_SCOPE)
    }
}

/// Where the OAuth client comes from. Only needed for refresh and consent.
enum ClientSource {
    Resolved(ClientCredentials),
    Deferred(Config),
}

pub struct TokenManager {
    client: ClientSource,
    token_path: PathBuf,
    authorizer: Option<Box<dyn Authorizer>>,
}

impl TokenManager {
    /// Non-interactive manager; call `with_authorizer` to allow browser consent.
    pub fn new(client: ClientCredentials, token_path: PathBuf) -> Self {
        Self {
            client: ClientSource::Resolved(client),
            token_path,
            authorizer: None,
        }
    }

    pub fn with_authorizer(mut self, authorizer: Box<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// The client is resolved on first refresh or consent, so a valid cached
    /// token works without any client configured.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let token_path = config::resolve_token_path(cfg)?;
        Ok(Self {
            client: ClientSource::Deferred(cfg.clone()),
            token_path,
            authorizer: Some(Box::new(BrowserAuthorizer {
                redirect_uri: cfg.redirect_uri(),
            })),
        })
    }

    fn client(&self) -> Result<ClientCredentials> {
        match &self.client {
            ClientSource::Resolved(c) => Ok(c.clone()),
            ClientSource::Deferred(cfg) => resolve_client(cfg),
        }
    }

    /// Returns a valid access token; refreshes or re-authorizes if needed.
    /// Any new credential is written back before returning.
    pub fn get_access_token(&self) -> Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

        let cached = match tokens_file::load_tokens(&self.token_path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("ignoring unreadable credential file: {e:#}");
                None
            }
        };

        // 1) cached & not expired
        if let Some(at) = cached.as_ref().and_then(|c| c.valid_access_token(now)) {
            log::debug!("using cached access token");
            return Ok(at.to_string());
        }

        // 2) refresh if possible
        let client = self.client()?;
        let previous_refresh = cached.and_then(|c| c.refresh_token);
        if let Some(rt) = previous_refresh.as_deref() {
            log::info!("access token expired; refreshing");
            match oauth::refresh_access_token(&client, rt) {
                Ok(t) => return self.store(t, now, previous_refresh.clone()),
                Err(e) => log::warn!("refresh failed, falling back to interactive auth: {e:#}"),
            }
        }

        // 3) otherwise interactive consent
        let Some(authorizer) = &self.authorizer else {
            return Err(AuthError::AuthorizationRequired(self.token_path.display().to_string()).into());
        };
        log::info!("no usable credential; starting interactive authorization");
        let t = authorizer.authorize(&client)?;
        self.store(t, now, previous_refresh)
    }

    fn store(&self, tokens: Tokens, now: i64, previous_refresh: Option<String>) -> Result<String> {
        let cred = Credential::from_tokens(tokens, now, previous_refresh, GMAIL_READONLY_SCOPE);
        tokens_file::save_tokens(&self.token_path, &cred)?;
        Ok(cred.access_token.unwrap_or_default())
    }
}

/// Client id/secret from the secrets file, else `client_id` in config with the
/// secret looked up in the keyring or `OAUTH_CLIENT_SECRET`.
fn resolve_client(cfg: &Config) -> Result<ClientCredentials> {
    let secrets_path = config::resolve_client_secrets_path(cfg)?;

    let mut client = if secrets_path.exists() {
        ClientCredentials::from_secrets_file(&secrets_path)?
    } else if let Some(id) = &cfg.client_id {
        ClientCredentials::new(id.clone(), None)
    } else {
        return Err(AuthError::MissingClient(secrets_path.display().to_string()).into());
    };

    if client.client_secret.is_none() {
        client.client_secret = token_store::lookup_client_secret(&client.client_id);
    }
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct FakeAuthorizer {
        calls: Rc<Cell<usize>>,
    }

    impl Authorizer for FakeAuthorizer {
        fn authorize(&self, _client: &ClientCredentials) -> Result<Tokens> {
            self.calls.set(self.calls.get() + 1);
            Ok(Tokens {
                access_token: "from-consent".into(),
                refresh_token: Some("consent-refresh".into()),
                expires_in: Some(3599),
            })
        }
    }

    fn epoch_now() -> i64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
    }

    fn client_for(token_uri: &str) -> ClientCredentials {
        let mut c = ClientCredentials::new("cid", Some("secret".into()));
        c.token_uri = token_uri.to_string();
        c
    }

    #[test]
    fn valid_cached_token_needs_no_network() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        tokens_file::save_tokens(
            &path,
            &Credential {
                access_token: Some("cached".into()),
                refresh_token: Some("r".into()),
                expires_at_epoch: Some(epoch_now() + 3000),
                scopes: vec![],
            },
        )
        .unwrap();

        let mgr = TokenManager::new(client_for("http://127.0.0.1:9/token"), path);
        assert_eq!(mgr.get_access_token().unwrap(), "cached");
    }

    #[test]
    fn expired_token_is_refreshed_and_persisted() {
        let server = StubServer::start(|_| {
            (
                200,
                r#"{"access_token":"refreshed","token_type":"Bearer","expires_in":3599}"#.into(),
            )
        });
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        tokens_file::save_tokens(
            &path,
            &Credential {
                access_token: Some("stale".into()),
                refresh_token: Some("keep-me".into()),
                expires_at_epoch: Some(epoch_now() - 10),
                scopes: vec![],
            },
        )
        .unwrap();

        let mgr = TokenManager::new(client_for(&format!("{}/token", server.base_url)), path.clone());
        assert_eq!(mgr.get_access_token().unwrap(), "refreshed");

        let saved = tokens_file::load_tokens(&path).unwrap().unwrap();
        assert_eq!(saved.access_token.as_deref(), Some("refreshed"));
        assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
        assert!(saved.valid_access_token(epoch_now()).is_some());
    }

    #[test]
    fn cached_token_needs_no_client_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        tokens_file::save_tokens(
            &path,
            &Credential {
                access_token: Some("cached".into()),
                expires_at_epoch: Some(epoch_now() + 3000),
                ..Credential::default()
            },
        )
        .unwrap();

        let cfg = Config {
            token_path: Some(path.display().to_string()),
            client_secrets_path: Some(dir.path().join("absent.json").display().to_string()),
            ..Config::default()
        };
        let mgr = TokenManager::from_config(&cfg).unwrap();
        assert_eq!(mgr.get_access_token().unwrap(), "cached");
    }

    #[test]
    fn expired_token_without_client_config_is_missing_client() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            token_path: Some(dir.path().join("token.json").display().to_string()),
            client_secrets_path: Some(dir.path().join("absent.json").display().to_string()),
            ..Config::default()
        };
        let mgr = TokenManager::from_config(&cfg).unwrap();

        let err = mgr.get_access_token().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MissingClient(_))
        ));
    }

    #[test]
    fn missing_credential_without_authorizer_requires_authorization() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        let mgr = TokenManager::new(client_for("http://127.0.0.1:9/token"), path);

        let err = mgr.get_access_token().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::AuthorizationRequired(_))
        ));
    }

    #[test]
    fn rejected_refresh_falls_back_to_consent() {
        let server = StubServer::start(|_| (400, r#"{"error":"invalid_grant"}"#.into()));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        tokens_file::save_tokens(
            &path,
            &Credential {
                refresh_token: Some("revoked".into()),
                ..Credential::default()
            },
        )
        .unwrap();

        let calls = Rc::new(Cell::new(0));
        let mgr = TokenManager::new(client_for(&format!("{}/token", server.base_url)), path.clone())
            .with_authorizer(Box::new(FakeAuthorizer {
                calls: Rc::clone(&calls),
            }));

        assert_eq!(mgr.get_access_token().unwrap(), "from-consent");
        assert_eq!(calls.get(), 1);
        let saved = tokens_file::load_tokens(&path).unwrap().unwrap();
        assert_eq!(saved.refresh_token.as_deref(), Some("consent-refresh"));
    }
}
