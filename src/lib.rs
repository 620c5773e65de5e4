pub mod auth;
pub mod chat;
pub mod config;
pub mod domain;
pub mod llm;
pub mod mail;
pub mod pipeline;
pub mod store;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_support;
