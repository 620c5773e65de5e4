pub mod oauth;
pub mod token_manager;
pub mod token_store;
pub mod tokens_file;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credential and no way to ask the user for consent.
    #[error("authorization required: no usable credential at {0}")]
    AuthorizationRequired(String),
    #[error("no OAuth client configured: set client_id in config.toml or provide {0}")]
    MissingClient(String),
}
