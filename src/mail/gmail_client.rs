use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::email::EmailRecord;
use crate::mail::decoders::{decode_body_data, html_to_text, snippet_text};

const UNREAD_LABEL: &str = "UNREAD";

#[derive(Debug, Deserialize)]
struct MessageList {
    messages: Option<Vec<MessageStub>>,
}

#[derive(Debug, Deserialize)]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailMessage {
    pub id: String,
    pub snippet: Option<String>,
    pub payload: Option<GmailPayload>,
}

#[derive(Debug, Deserialize)]
pub struct GmailPayload {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<GmailHeader>>,
    pub body: Option<GmailBody>,
    pub parts: Option<Vec<GmailPayload>>,
}

#[derive(Debug, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct GmailBody {
    pub data: Option<String>,
}

/// Thin client over the Gmail REST API for the authenticated user ("me").
pub struct GmailClient {
    http: Client,
    base_url: String,
}

impl GmailClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Ids of up to `max` unread messages, in the provider's order.
    pub fn list_unread(&self, access_token: &str, max: u32) -> Result<Vec<String>> {
        let url = format!("{}/users/me/messages", self.base_url);
        let max_results = max.to_string();
        let list: MessageList = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("labelIds", UNREAD_LABEL), ("maxResults", max_results.as_str())])
            .send()
            .context("listing unread messages")?
            .error_for_status()
            .context("listing unread messages")?
            .json()
            .context("decoding message list")?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| m.id)
            .take(max as usize)
            .collect())
    }

    pub fn get_message(&self, access_token: &str, id: &str) -> Result<GmailMessage> {
        let url = format!("{}/users/me/messages/{id}", self.base_url);
        let msg = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("format", "full")])
            .send()
            .with_context(|| format!("fetching message {id}"))?
            .error_for_status()
            .with_context(|| format!("fetching message {id}"))?
            .json()
            .with_context(|| format!("decoding message {id}"))?;
        Ok(msg)
    }

    pub fn fetch_unread(&self, access_token: &str, n: u32) -> Result<Vec<EmailRecord>> {
        let ids = self.list_unread(access_token, n)?;
        log::info!("{} unread message(s) listed", ids.len());

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let msg = self.get_message(access_token, &id)?;
            out.push(to_record(msg));
        }
        Ok(out)
    }
}

/// Normalize a full Gmail message. Never fails: a missing or undecodable body
/// falls back to the snippet.
pub fn to_record(msg: GmailMessage) -> EmailRecord {
    let snippet = msg.snippet.as_deref().map(snippet_text).unwrap_or_default();
    let (from, subject, body) = match &msg.payload {
        Some(payload) => {
            let body = match extract_body(payload) {
                Ok(Some(body)) => body,
                Ok(None) => snippet,
                Err(e) => {
                    log::warn!("message {}: body decode failed ({e}); using snippet", msg.id);
                    snippet
                }
            };
            (
                header(payload, "From").unwrap_or_default(),
                header(payload, "Subject").unwrap_or_default(),
                body,
            )
        }
        None => (String::new(), String::new(), snippet),
    };

    EmailRecord {
        id: msg.id,
        from,
        subject,
        body,
    }
}

fn header(payload: &GmailPayload, name: &str) -> Option<String> {
    payload
        .headers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn body_data(payload: &GmailPayload) -> Option<&str> {
    payload
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .filter(|d| !d.is_empty())
}

/// Primary payload data first; for multipart messages the first text/plain part,
/// then the first text/html part rendered as text.
fn extract_body(payload: &GmailPayload) -> Result<Option<String>, base64::DecodeError> {
    if let Some(data) = body_data(payload) {
        let text = decode_body_data(data)?;
        if is_mime(payload, "text/html") {
            return Ok(Some(html_to_text(&text).unwrap_or(text)));
        }
        return Ok(Some(text));
    }

    if let Some(part) = find_part(payload, "text/plain") {
        return body_data(part).map(decode_body_data).transpose();
    }
    if let Some(part) = find_part(payload, "text/html") {
        return Ok(body_data(part)
            .map(decode_body_data)
            .transpose()?
            .map(|html| html_to_text(&html).unwrap_or(html)));
    }
    Ok(None)
}

fn is_mime(payload: &GmailPayload, mime: &str) -> bool {
    payload
        .mime_type
        .as_deref()
        .is_some_and(|m| m.eq_ignore_ascii_case(mime))
}

fn find_part<'a>(payload: &'a GmailPayload, mime: &str) -> Option<&'a GmailPayload> {
    for part in payload.parts.as_deref().unwrap_or_default() {
        if is_mime(part, mime) && body_data(part).is_some() {
            return Some(part);
        }
        if let Some(found) = find_part(part, mime) {
            return Some(found);
        }
    }
    None
}
