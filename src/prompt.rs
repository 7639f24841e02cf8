// src/prompt.rs
//
// =============================================================================
// WF2WF: INTERACTIVE PROMPTER
// =============================================================================
//
// Asks the operator to resolve ambiguities the import orchestrator can't
// settle on its own (missing resource bounds, ambiguous environment
// target). Three modes: `Interactive` (read stdin), `Test` (scripted
// answers, for integration tests), `NonInteractive` (always take the
// default, used under `WF2WF_NO_PROMPT=1` or when stdin is not a tty).

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone)]
pub struct Question {
    pub prompt: String,
    pub default: String,
    pub choices: Vec<String>,
}

impl Question {
    pub fn new(prompt: impl Into<String>, default: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), default: default.into(), choices: Vec::new() }
    }

    pub fn with_choices(mut self, choices: Vec<String>) -> Self {
        self.choices = choices;
        self
    }

    fn validate(&self, answer: &str) -> bool {
        self.choices.is_empty() || self.choices.iter().any(|c| c == answer)
    }
}

pub trait Prompter {
    fn ask(&mut self, question: &Question) -> String;
}

/// Never blocks; always returns the question's default. Used for
/// `WF2WF_NO_PROMPT=1`, piped stdin, and any run that must be
/// deterministic and unattended.
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn ask(&mut self, question: &Question) -> String {
        log::info!("prompt suppressed, using default: {} -> {}", question.prompt, question.default);
        question.default.clone()
    }
}

/// Scripted answers for integration tests: pops the next queued answer,
/// falling back to the default if the queue runs dry (so a test can
/// script only the questions it cares about).
pub struct TestPrompter {
    answers: VecDeque<String>,
}

impl TestPrompter {
    pub fn new(answers: Vec<String>) -> Self {
        Self { answers: answers.into() }
    }
}

impl Prompter for TestPrompter {
    fn ask(&mut self, question: &Question) -> String {
        let answer = self.answers.pop_front().unwrap_or_else(|| question.default.clone());
        if question.validate(&answer) {
            answer
        } else {
            question.default.clone()
        }
    }
}

/// Reads from stdin/writes to stdout. Falls back to the default on EOF
/// (piped input exhausted) or an invalid choice after one retry.
pub struct InteractivePrompter;

impl Prompter for InteractivePrompter {
    fn ask(&mut self, question: &Question) -> String {
        let stdin = io::stdin();
        for attempt in 0..2 {
            if question.choices.is_empty() {
                print!("{} [{}]: ", question.prompt, question.default);
            } else {
                print!("{} ({}) [{}]: ", question.prompt, question.choices.join("/"), question.default);
            }
            let _ = io::stdout().flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => return question.default.clone(),
                Ok(_) => {
                    let answer = line.trim();
                    if answer.is_empty() {
                        return question.default.clone();
                    }
                    if question.validate(answer) {
                        return answer.to_string();
                    }
                    if attempt == 0 {
                        println!("'{answer}' is not one of {:?}, try again", question.choices);
                    }
                }
            }
        }
        question.default.clone()
    }
}

/// Mode selection mirrors `RunConfig`: explicit test answers win, then
/// `WF2WF_NO_PROMPT`/non-tty, then interactive.
pub fn get_prompter(no_prompt: bool, scripted_answers: Option<Vec<String>>) -> Box<dyn Prompter> {
    if let Some(answers) = scripted_answers {
        return Box::new(TestPrompter::new(answers));
    }
    if no_prompt || !atty_stdin() {
        return Box::new(NonInteractivePrompter);
    }
    Box::new(InteractivePrompter)
}

fn atty_stdin() -> bool {
    use std::io::IsTerminal;
    io::stdin().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_prompter_always_returns_default() {
        let mut p = NonInteractivePrompter;
        let q = Question::new("pick an environment", "shared_filesystem")
            .with_choices(vec!["shared_filesystem".into(), "cloud_native".into()]);
        assert_eq!(p.ask(&q), "shared_filesystem");
    }

    #[test]
    fn test_prompter_falls_back_to_default_when_queue_empty() {
        let mut p = TestPrompter::new(vec!["cloud_native".into()]);
        let q = Question::new("env?", "shared_filesystem");
        assert_eq!(p.ask(&q), "cloud_native");
        assert_eq!(p.ask(&q), "shared_filesystem");
    }

    #[test]
    fn test_prompter_rejects_invalid_choice() {
        let mut p = TestPrompter::new(vec!["bogus".into()]);
        let q = Question::new("env?", "shared_filesystem").with_choices(vec!["shared_filesystem".into()]);
        assert_eq!(p.ask(&q), "shared_filesystem");
    }
}
