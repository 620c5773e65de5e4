use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine as _, alphabet};

/// Gmail sends base64url, sometimes padded and sometimes not.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a `body.data` field. Invalid UTF-8 sequences become U+FFFD.
pub fn decode_body_data(data: &str) -> Result<String, base64::DecodeError> {
    let bytes = URL_SAFE_LENIENT.decode(data.trim())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn html_to_text(html: &str) -> Option<String> {
    html2text::config::plain()
        .string_from_read(html.as_bytes(), 100)
        .ok()
        .map(|t| {
            t.lines()
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
}

/// Snippets arrive HTML-escaped (`&#39;`, `&amp;`); return them as one plain line.
pub fn snippet_text(snippet: &str) -> String {
    let unescaped = html_to_text(snippet).unwrap_or_else(|| snippet.to_string());
    let mut out = String::new();
    for word in unescaped.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
