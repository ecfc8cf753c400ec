//! Destructive-action confirmation

use std::io::{BufRead, Write};

/// Asks the operator to confirm a destructive action by typing `expected`
pub trait Confirmation: Send + Sync {
    fn confirm(&self, expected: &str) -> bool;
}

/// Reads the confirmation from a line of terminal input
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, expected: &str) -> bool {
        prompt_and_read(
            &mut std::io::stdout(),
            &mut std::io::stdin().lock(),
            expected,
        )
    }
}

/// Show the prompt on `out`, then compare one line of `input`
fn prompt_and_read(out: &mut impl Write, input: &mut impl BufRead, expected: &str) -> bool {
    let shown = write!(out, "Type '{}' to confirm deletion: ", expected).and_then(|()| out.flush());
    if let Err(e) = shown {
        tracing::warn!("Could not show the confirmation prompt: {}", e);
    }

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(_) => matches_exactly(&line, expected),
        Err(e) => {
            tracing::warn!("Could not read confirmation: {}", e);
            false
        }
    }
}

/// Fixed answer, for non-interactive callers and tests
pub struct FixedConfirmation(pub String);

impl Confirmation for FixedConfirmation {
    fn confirm(&self, expected: &str) -> bool {
        matches_exactly(&self.0, expected)
    }
}

/// Compare an answer with the line terminator removed and nothing else
fn matches_exactly(answer: &str, expected: &str) -> bool {
    answer.trim_end_matches(['\r', '\n']) == expected
}
