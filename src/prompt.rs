use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};

/// Yes/no decision before a destructive step.
pub trait Confirm {
    fn confirm(&self, question: &str) -> Result<bool>;
}

/// Asks on stdout and reads one line from stdin. EOF counts as "no".
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> Result<bool> {
        print!("{question} [y/N]: ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read answer from stdin")?;
        Ok(is_affirmative(&answer))
    }
}

/// Fixed answer, used for `--yes` and in tests.
pub struct Preset(pub bool);

impl Confirm for Preset {
    fn confirm(&self, question: &str) -> Result<bool> {
        log::debug!("{question} -> {}", if self.0 { "yes" } else { "no" });
        Ok(self.0)
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("  YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }
}
