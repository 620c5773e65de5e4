use anyhow::Result;
use std::io::{BufRead, Write};

use crate::llm::{Completer, prompts};
use crate::store::repo::{DEFAULT_TOP_K, DocumentIndex};

/// Outcome of one line typed at the prompt.
#[derive(Debug, PartialEq)]
pub enum Turn {
    Exit,
    Blank,
    NoMatches,
    Answer(String),
}

pub fn is_exit_command(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Handle one query: retrieve, build the context prompt, ask the model.
pub fn respond(line: &str, index: &dyn DocumentIndex, llm: &dyn Completer) -> Turn {
    let query = line.trim();
    if is_exit_command(query) {
        return Turn::Exit;
    }
    if query.is_empty() {
        return Turn::Blank;
    }

    let hits = index.search(query, DEFAULT_TOP_K);
    if hits.is_empty() {
        return Turn::NoMatches;
    }
    log::debug!("{} document(s) retrieved for {query:?}", hits.len());

    let documents: Vec<String> = hits.into_iter().map(|h| h.document).collect();
    Turn::Answer(llm.complete(&prompts::answer(&documents, query)))
}

/// Reads questions until `exit`/`quit` or end of input.
pub fn run_chat<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    index: &dyn DocumentIndex,
    llm: &dyn Completer,
) -> Result<()> {
    writeln!(out, "\nAsk anything about your emails (type 'exit' to quit):")?;
    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out, "\nGoodbye!")?;
            return Ok(());
        }

        match respond(&line, index, llm) {
            Turn::Exit => {
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }
            Turn::Blank => {}
            Turn::NoMatches => writeln!(out, "No relevant emails found.")?,
            Turn::Answer(answer) => writeln!(out, "\n{answer}\n")?,
        }
    }
}
