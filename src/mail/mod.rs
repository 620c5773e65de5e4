pub mod decoders;
pub mod gmail_client;

use anyhow::Result;

use crate::auth::token_manager::TokenManager;
use crate::domain::email::EmailRecord;
use crate::mail::gmail_client::GmailClient;

/// Where the pipeline gets its unread mail from.
pub trait MailSource {
    /// Up to `n` unread messages. Auth and transport errors propagate.
    fn fetch_unread(&mut self, n: u32) -> Result<Vec<EmailRecord>>;
}

/// Gmail behind an OAuth token manager.
pub struct GmailFetcher {
    tokens: TokenManager,
    client: GmailClient,
}

impl GmailFetcher {
    pub fn new(tokens: TokenManager, client: GmailClient) -> Self {
        Self { tokens, client }
    }
}

impl MailSource for GmailFetcher {
    fn fetch_unread(&mut self, n: u32) -> Result<Vec<EmailRecord>> {
        let access = self.tokens.get_access_token()?;
        self.client.fetch_unread(&access, n)
    }
}
