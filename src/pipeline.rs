use anyhow::{Context, Result};
use std::fs;
use std::io::{BufRead, Write};
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chat::run_chat;
use crate::domain::email::EmailRecord;
use crate::llm::Completer;
use crate::mail::MailSource;
use crate::store::repo::{DocumentIndex, IndexOutcome};
use crate::summarizer::Summarizer;

#[derive(Debug, PartialEq, Eq)]
pub enum CountInput {
    Count(u32),
    NotInteger,
    NotPositive,
}

/// Counts past `u32::MAX` saturate.
pub fn parse_count(line: &str) -> CountInput {
    match line.trim().parse::<i64>() {
        Ok(n) if n >= 1 => CountInput::Count(u32::try_from(n).unwrap_or(u32::MAX)),
        Ok(_) => CountInput::NotPositive,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => CountInput::Count(u32::MAX),
            IntErrorKind::NegOverflow => CountInput::NotPositive,
            _ => CountInput::NotInteger,
        },
    }
}

/// How a run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RunEnd {
    InvalidInput,
    NoEmails,
    Completed,
}

/// fetch → summarize + index each → general summary → chat.
pub struct Pipeline<'a> {
    pub mail: &'a mut dyn MailSource,
    pub index: &'a dyn DocumentIndex,
    pub llm: &'a dyn Completer,
    /// Where the run digest is written, if anywhere.
    pub digest_dir: Option<PathBuf>,
}

impl Pipeline<'_> {
    pub fn run<R: BufRead, W: Write>(&mut self, input: &mut R, out: &mut W) -> Result<RunEnd> {
        write!(out, "Enter how many top unread emails to summarize: ")?;
        out.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;

        let n = match parse_count(&line) {
            CountInput::Count(n) => n,
            CountInput::NotInteger => {
                writeln!(out, "Invalid input, must be an integer.")?;
                return Ok(RunEnd::InvalidInput);
            }
            CountInput::NotPositive => {
                writeln!(out, "Invalid input, must be a positive integer.")?;
                return Ok(RunEnd::InvalidInput);
            }
        };

        let emails = self.mail.fetch_unread(n)?;
        if emails.is_empty() {
            writeln!(out, "No unread emails found.")?;
            return Ok(RunEnd::NoEmails);
        }

        let summarizer = Summarizer::new(self.llm);
        let mut summaries = Vec::with_capacity(emails.len());
        for email in &emails {
            let summary = summarizer.summarize_one(&email.body);
            if self.index.index(&email.id, &email.body, &summary) == IndexOutcome::Failed {
                log::warn!("message {} was not indexed; chat will not see it", email.id);
            }
            writeln!(out, "\nEmail '{}' summary:\n{summary}\n", email.subject)?;
            summaries.push(summary);
        }

        let general = summarizer.summarize_all(&summaries);
        writeln!(out, "\nGeneral Summary:\n{general}")?;

        if let Some(dir) = &self.digest_dir {
            match write_digest(dir, &emails, &summaries, &general) {
                Ok(path) => log::info!("digest written to {}", path.display()),
                Err(e) => log::warn!("could not write digest: {e:#}"),
            }
        }

        run_chat(input, out, self.index, self.llm)?;
        Ok(RunEnd::Completed)
    }
}

/// Writes `digest-<epoch>.md` into `dir` and returns its path.
pub fn write_digest(
    dir: &Path,
    emails: &[EmailRecord],
    summaries: &[String],
    general: &str,
) -> Result<PathBuf> {
    let epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let mut md = format!("# Email digest ({epoch})\n\n");
    for (email, summary) in emails.iter().zip(summaries) {
        md.push_str(&format!(
            "## {}\nFrom: {}\n\n{summary}\n\n",
            email.subject, email.from
        ));
    }
    md.push_str(&format!("## General summary\n\n{general}\n"));

    fs::create_dir_all(dir)?;
    let path = dir.join(format!("digest-{epoch}.md"));
    fs::write(&path, md).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
