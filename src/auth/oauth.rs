use anyhow::{Context, Result, anyhow};
use oauth2::TokenResponse;
use oauth2::basic::BasicClient;
use oauth2::reqwest::http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenUrl,
};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};
use tiny_http::{Response, Server};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens returned by the oauth flow (in-memory)
#[derive(Debug)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
}

/// The OAuth client registration used against Google.
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: Option<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            auth_uri: GOOGLE_AUTH_URL.to_string(),
            token_uri: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    /// Parse a Google client secrets file (`{"installed": {...}}` or `{"web": {...}}`).
    pub fn from_secrets_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading client secrets {}", path.display()))?;
        Self::from_secrets_json(&s)
            .with_context(|| format!("parsing client secrets {}", path.display()))
    }

    pub fn from_secrets_json(s: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(s)?;
        let entry = file
            .installed
            .or(file.web)
            .ok_or_else(|| anyhow!("client secrets have neither an 'installed' nor a 'web' entry"))?;
        Ok(Self {
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            auth_uri: entry.auth_uri.unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            token_uri: entry.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
        })
    }

    fn oauth_client(&self) -> Result<BasicClient> {
        let client_id = ClientId::new(self.client_id.clone());
        let client_secret = self.client_secret.clone().map(ClientSecret::new);
        let auth_url = AuthUrl::new(self.auth_uri.clone())?;
        let token_url = TokenUrl::new(self.token_uri.clone())?;
        Ok(BasicClient::new(
            client_id,
            client_secret,
            auth_url,
            Some(token_url),
        ))
    }
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<SecretsEntry>,
    web: Option<SecretsEntry>,
}

#[derive(Deserialize)]
struct SecretsEntry {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// Exchange a refresh token for a new access token using the oauth2 crate
pub fn refresh_access_token(client: &ClientCredentials, refresh_token: &str) -> Result<Tokens> {
    let oauth_client = client.oauth_client()?;

    let rt = RefreshToken::new(refresh_token.to_string());
    let token = oauth_client
        .exchange_refresh_token(&rt)
        .request(http_client)
        .map_err(|e| anyhow!("refresh grant rejected: {e}"))?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

/// Perform Authorization Code + PKCE flow. Opens system browser and captures code via tiny server.
/// Port 0 in `redirect_uri` binds an ephemeral port and rewrites the redirect to match.
pub fn perform_pkce_flow(
    client: &ClientCredentials,
    redirect_uri: &str,
    scope: &str,
) -> Result<Tokens> {
    let mut redirect = Url::parse(redirect_uri)
        .map_err(|e| anyhow!("Invalid redirect_uri '{redirect_uri}': {e}"))?;

    let host = redirect
        .host_str()
        .ok_or_else(|| anyhow!("redirect_uri missing host: {redirect_uri}"))?
        .to_string();

    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| anyhow!("redirect_uri missing/unknown port: {redirect_uri}"))?;

    let bind_ip: IpAddr = match host.as_str() {
        "localhost" | "127.0.0.1" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().map_err(|_| {
            anyhow!("redirect_uri host must be localhost/127.0.0.1 or an IP: {other}")
        })?,
    };

    // Listen before the browser can possibly redirect.
    let server = Server::http(SocketAddr::new(bind_ip, port))
        .map_err(|e| anyhow!("Failed to bind OAuth callback server on {bind_ip}:{port}: {e:?}"))?;
    let bound_port = server.server_addr().port();
    redirect
        .set_port(Some(bound_port))
        .map_err(|_| anyhow!("cannot set port on redirect_uri {redirect_uri}"))?;

    let oauth_client = client
        .oauth_client()?
        .set_redirect_uri(RedirectUrl::new(redirect.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (auth_url, csrf_token) = oauth_client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new(scope.to_string()))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    println!("Open this URL in your browser to authorize Gmail access:\n{auth_url}");
    if let Err(e) = open::that(auth_url.as_str()) {
        log::warn!("could not open browser automatically: {e}");
    }

    let code = wait_for_code(&server, &host, bound_port, csrf_token.secret())?;

    let token = oauth_client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request(http_client)
        .map_err(|e| {
            log::error!("Token exchange failed: {e:#?}");
            anyhow!("Token exchange failed: {e}")
        })?;

    Ok(Tokens {
        access_token: token.access_token().secret().to_string(),
        refresh_token: token.refresh_token().map(|r| r.secret().to_string()),
        expires_in: token.expires_in().map(|d| d.as_secs()),
    })
}

fn wait_for_code(server: &Server, host: &str, port: u16, expected_state: &str) -> Result<String> {
    let wait_until = Instant::now() + CALLBACK_TIMEOUT;

    while Instant::now() < wait_until {
        let Ok(maybe_request) = server.recv_timeout(Duration::from_millis(500)) else {
            continue;
        };
        let Some(request) = maybe_request else {
            continue;
        };

        // request.url() is a path+query like "/?state=...&code=..."
        let full = format!("http://{host}:{port}{}", request.url());
        let Ok(parsed) = Url::parse(&full) else {
            let _ = request.respond(Response::from_string("Bad redirect"));
            continue;
        };

        match parse_callback(&parsed, expected_state) {
            Callback::Code(code) => {
                let _ = request.respond(Response::from_string(
                    "Authorization received. You can close this tab.",
                ));
                return Ok(code);
            }
            Callback::Denied(reason) => {
                let _ = request.respond(Response::from_string(
                    "Authorization was denied. You can close this tab.",
                ));
                return Err(anyhow!("authorization denied: {reason}"));
            }
            Callback::Ignored => {
                let _ = request.respond(Response::from_string(
                    "No code found in redirect. You can close this tab.",
                ));
            }
        }
    }

    Err(anyhow!("No code received within timeout"))
}

#[derive(Debug, PartialEq)]
enum Callback {
    Code(String),
    Denied(String),
    Ignored,
}

fn parse_callback(url: &Url, expected_state: &str) -> Callback {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Callback::Ignored;
    }
    match (code, error) {
        (Some(code), _) => Callback::Code(code),
        (None, Some(err)) => Callback::Denied(err),
        (None, None) => Callback::Ignored,
    }
}
