use agentfs_core::{Classification, CommandApprover, SafetyVerdict};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Asks on the terminal before a non-safe command runs.
pub struct StdinApprover {
    /// Skip the prompt and approve everything (`--yes`).
    pub assume_yes: bool,
}

#[async_trait]
impl CommandApprover for StdinApprover {
    async fn approve(&self, command: &str, classification: &Classification) -> bool {
        if self.assume_yes {
            return true;
        }

        let mut prompt = format!("Command classified as {}: {command}\n", classification.verdict);
        if let Some(pattern) = &classification.matched_pattern {
            prompt.push_str(&format!("  matched dangerous pattern: {pattern}\n"));
        }
        if classification.verdict == SafetyVerdict::Unknown {
            for unlisted in &classification.unlisted {
                prompt.push_str(&format!("  not on the safe list: {unlisted}\n"));
            }
        }
        prompt.push_str("Run it? [y/N] ");

        let mut stderr = tokio::io::stderr();
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            return false;
        }

        let mut answer = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut answer).await {
            Ok(_) => parse_answer(&answer),
            Err(e) => {
                tracing::warn!("Failed to read confirmation: {e:?}");
                false
            }
        }
    }
}

fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
