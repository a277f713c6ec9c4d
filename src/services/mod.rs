pub mod discovery;
pub mod profile_check;
pub mod registers;

use async_trait::async_trait;
use std::io::{self, Write};

use crate::utils::error::{TstatError, TstatResult};

pub use discovery::{move_device, scan, MoveOutcome, ScanHit, ScanReport};
pub use profile_check::{fix, verify, FixReport, Mismatch, VerifyReport};
pub use registers::{
    read_one, read_range, set_relay, set_temperature, set_time, write_from_file, write_one,
    FileWriteReport, RegisterReadResult, WriteSummary,
};

/// Operator confirmation for destructive steps.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> TstatResult<bool>;
}

/// Anything that does not contain an `n` counts as yes.
pub fn accepts(answer: &str) -> bool {
    !answer.to_lowercase().contains('n')
}

// Prompts go to stderr so stdout carries only results.
fn write_prompt<W: Write>(out: &mut W, prompt: &str) -> io::Result<()> {
    out.write_all(prompt.as_bytes())?;
    out.flush()
}

pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> TstatResult<bool> {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
            write_prompt(&mut io::stderr(), &prompt)?;
            let mut input = String::new();
            io::stdin().read_line(&mut input)?;
            Ok(input)
        })
        .await
        .map_err(|e| TstatError::InvalidInput(format!("Confirmation prompt failed: {}", e)))??;
        Ok(accepts(answer.trim()))
    }
}

#[cfg(test)]
pub struct FixedAnswer(String);

#[cfg(test)]
impl FixedAnswer {
    pub fn new(answer: &str) -> Self {
        Self(answer.to_string())
    }
}

#[cfg(test)]
#[async_trait]
impl Confirm for FixedAnswer {
    async fn confirm(&self, _prompt: &str) -> TstatResult<bool> {
        Ok(accepts(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(accepts("y"));
        assert!(accepts("YES"));
        assert!(accepts(""));
        assert!(!accepts("n"));
        assert!(!accepts("No"));
        assert!(!accepts("nope"));
    }

    #[test]
    fn test_prompt_written_verbatim() {
        let mut out = Vec::new();
        write_prompt(&mut out, "Are you sure? (y/n) ").unwrap();
        assert_eq!(out, b"Are you sure? (y/n) ");
    }
}
