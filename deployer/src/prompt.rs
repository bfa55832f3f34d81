//! Operator confirmation when manifest files are missing.

use crate::error::{DeployError, Result};
use std::io::{BufRead, Write};

/// Asks the operator a yes/no question.
#[cfg_attr(test, mockall::automock)]
pub trait OperatorPrompt {
    /// Returns `true` to continue, `false` to abort.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Prompt`] if the answer cannot be read.
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Interprets one line of operator input.
///
/// Returns `None` for anything that is not an explicit yes or no, so the
/// caller asks again rather than guessing.
///
/// # Examples
///
/// ```
/// use fractal_deployer::prompt::parse_answer;
///
/// assert_eq!(parse_answer("Y\n"), Some(true));
/// assert_eq!(parse_answer(" no "), Some(false));
/// assert_eq!(parse_answer(""), None);
/// ```
#[must_use]
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Asks on a writer and reads answers from a reader until one is explicit.
///
/// End of input counts as "no".
///
/// # Errors
///
/// Returns [`DeployError::Prompt`] on read or write failure.
pub fn ask(question: &str, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<bool> {
    loop {
        write!(output, "{question} [y/n]: ").map_err(DeployError::Prompt)?;
        output.flush().map_err(DeployError::Prompt)?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(DeployError::Prompt)?;
        if read == 0 {
            writeln!(output).map_err(DeployError::Prompt)?;
            return Ok(false);
        }
        if let Some(answer) = parse_answer(&line) {
            return Ok(answer);
        }
        writeln!(output, "Please answer y or n.").map_err(DeployError::Prompt)?;
    }
}

/// Prompts on the terminal, reading stdin and writing to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl OperatorPrompt for TerminalPrompt {
    fn confirm(&self, question: &str) -> Result<bool> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let mut stderr = std::io::stderr();
        ask(question, &mut input, &mut stderr)
    }
}

/// Answers yes without asking; selected by `--assume-yes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl OperatorPrompt for AssumeYes {
    fn confirm(&self, question: &str) -> Result<bool> {
        log::info!("{question} yes (--assume-yes)");
        Ok(true)
    }
}
