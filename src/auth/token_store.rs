use anyhow::{Result, anyhow};
use keyring::{Entry, Error as KeyringError};

const SERVICE: &str = "mail_digest";
const SECRET_ENV: &str = "OAUTH_CLIENT_SECRET";

fn entry(client_id: &str) -> Result<Entry> {
    Entry::new(SERVICE, client_id).map_err(|e| anyhow!("keyring unavailable: {e}"))
}

pub fn save_client_secret(client_id: &str, client_secret: &str) -> Result<()> {
    entry(client_id)?
        .set_password(client_secret)
        .map_err(|e| anyhow!("storing client secret for {client_id}: {e}"))
}

pub fn load_client_secret(client_id: &str) -> Result<Option<String>> {
    match entry(client_id)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(anyhow!("reading client secret for {client_id}: {e}")),
    }
}

/// Keyring first, then `OAUTH_CLIENT_SECRET`. A broken keyring only logs.
pub fn lookup_client_secret(client_id: &str) -> Option<String> {
    let stored = load_client_secret(client_id).unwrap_or_else(|e| {
        log::warn!("{e}");
        None
    });
    stored.or_else(|| std::env::var(SECRET_ENV).ok().filter(|s| !s.trim().is_empty()))
}
