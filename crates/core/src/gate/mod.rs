//! Confirmation gate: yes/no/quit questions to the operator.
//!
//! Quitting is reported as [`GateError::UserQuit`]. Callers treat it as a
//! request to abort through their normal rollback path, not as a failure.

mod prompter;

pub use prompter::{LinePrompter, Prompter, StdinPrompter};

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Answer to a confirmation question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn is_yes(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

/// How a question is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Yes, no, or quit.
    #[default]
    Standard,
    /// Yes or no only.
    Binary,
    /// Yes, no, or quit, where "no" also quits.
    AbortOnNo,
}

/// Reasons a question did not produce an answer.
#[derive(Debug, Error)]
pub enum GateError {
    /// The operator chose to quit, or declined in abort-on-no mode.
    #[error("{0}")]
    UserQuit(QuitReason),

    /// Reading the answer failed.
    #[error("failed to read confirmation: {0}")]
    Input(#[from] std::io::Error),
}

/// Why the operator left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitReason {
    Quit,
    Declined,
    EndOfInput,
}

impl std::fmt::Display for QuitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quit => f.write_str("User quit"),
            Self::Declined => f.write_str("User declined"),
            Self::EndOfInput => f.write_str("No more input"),
        }
    }
}

impl GateError {
    /// Whether this is an operator quit rather than an I/O failure.
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::UserQuit(_))
    }
}

/// Asks questions through a [`Prompter`].
#[derive(Clone)]
pub struct ConfirmationGate {
    prompter: Arc<dyn Prompter>,
}

impl ConfirmationGate {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }

    /// Asks until a valid answer is given. Empty input selects the default.
    pub async fn ask(
        &self,
        question: &str,
        default_yes: bool,
        mode: ConfirmMode,
    ) -> Result<Answer, GateError> {
        let prompt = format!("{} {} ", question, choices(default_yes, mode));

        loop {
            let Some(input) = self.prompter.read_answer(&prompt).await? else {
                return Err(GateError::UserQuit(QuitReason::EndOfInput));
            };

            match parse_answer(&input, default_yes, mode) {
                Some(Choice::Yes) => return Ok(Answer::Yes),
                Some(Choice::No) if mode == ConfirmMode::AbortOnNo => {
                    return Err(GateError::UserQuit(QuitReason::Declined))
                }
                Some(Choice::No) => return Ok(Answer::No),
                Some(Choice::Quit) => return Err(GateError::UserQuit(QuitReason::Quit)),
                None => {
                    debug!("Unrecognized confirmation input: {:?}", input);
                    let hint = if mode == ConfirmMode::Binary {
                        "Please enter 'y' or 'n'"
                    } else {
                        "Please enter 'y', 'n', or 'q' to quit"
                    };
                    self.prompter.notify(hint).await?;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Yes,
    No,
    Quit,
}

fn choices(default_yes: bool, mode: ConfirmMode) -> &'static str {
    match (default_yes, mode == ConfirmMode::Binary) {
        (true, false) => "[Y/n/q]",
        (false, false) => "[y/N/q]",
        (true, true) => "[Y/n]",
        (false, true) => "[y/N]",
    }
}

fn parse_answer(input: &str, default_yes: bool, mode: ConfirmMode) -> Option<Choice> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" if default_yes => Some(Choice::Yes),
        "" => Some(Choice::No),
        "y" | "yes" => Some(Choice::Yes),
        "n" | "no" => Some(Choice::No),
        "q" | "quit" if mode != ConfirmMode::Binary => Some(Choice::Quit),
        _ => None,
    }
}
