use crate::llm::{Completer, prompts};

/// Prompt wrappers over a completer. Sentinels pass through as summary text.
pub struct Summarizer<'a> {
    llm: &'a dyn Completer,
}

impl<'a> Summarizer<'a> {
    pub fn new(llm: &'a dyn Completer) -> Self {
        Self { llm }
    }

    pub fn summarize_one(&self, body: &str) -> String {
        self.llm.complete(&prompts::email_summary(body))
    }

    pub fn summarize_all(&self, summaries: &[String]) -> String {
        self.llm.complete(&prompts::general_summary(summaries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Echo {
        prompts: RefCell<Vec<String>>,
    }

    impl Completer for Echo {
        fn complete(&self, prompt: &str) -> String {
            self.prompts.borrow_mut().push(prompt.to_string());
            "Error generating response.".to_string()
        }
    }

    #[test]
    fn wraps_body_and_passes_sentinel_through() {
        let llm = Echo {
            prompts: RefCell::new(Vec::new()),
        };
        let s = Summarizer::new(&llm);

        assert_eq!(s.summarize_one("Ship it Friday"), "Error generating response.");
        assert_eq!(s.summarize_all(&["sA".into(), "sB".into()]), "Error generating response.");

        let prompts = llm.prompts.borrow();
        assert!(prompts[0].starts_with("You are an assistant that summarizes emails"));
        assert!(prompts[0].ends_with("Summarize this email:\n\nShip it Friday"));
        assert!(prompts[1].ends_with("\n\nsA\nsB"));
    }
}
