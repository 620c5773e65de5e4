/// Preamble for a single email summary; the email body follows.
pub const EMAIL_SUMMARY: &str = "You are an assistant that summarizes emails concisely in bullet points.\nSummarize this email:\n\n";

/// Preamble for the digest over all per-email summaries.
pub const GENERAL_SUMMARY: &str = "You are an assistant that generates a general summary from these bullet points.\nSummarize them concisely:\n\n";

/// Preamble for answering a question from retrieved emails.
pub const ANSWER_FROM_CONTEXT: &str =
    "Given the following email contents, answer the question succinctly:\n\n";

/// Separator between retrieved documents in the answer context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub fn email_summary(body: &str) -> String {
    format!("{EMAIL_SUMMARY}{body}")
}

pub fn general_summary(summaries: &[String]) -> String {
    format!("{GENERAL_SUMMARY}{}", summaries.join("\n"))
}

pub fn answer(documents: &[String], question: &str) -> String {
    let context = documents.join(CONTEXT_SEPARATOR);
    format!("{ANSWER_FROM_CONTEXT}{context}\n\nQuestion: {question}\nAnswer:")
}
