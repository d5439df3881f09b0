//! Prompt input sources.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Source of operator answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Shows `prompt` and reads one line. `None` means input is closed.
    async fn read_answer(&self, prompt: &str) -> std::io::Result<Option<String>>;

    /// Shows a message without waiting for input.
    async fn notify(&self, message: &str) -> std::io::Result<()>;
}

/// Prompts on stderr and reads answers line by line from `R`.
pub struct LinePrompter<R> {
    input: Mutex<BufReader<R>>,
}

/// Prompter reading the process's standard input.
pub type StdinPrompter = LinePrompter<tokio::io::Stdin>;

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin())
    }
}

impl<R> LinePrompter<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn from_reader(reader: R) -> Self {
        Self {
            input: Mutex::new(BufReader::new(reader)),
        }
    }
}

#[async_trait]
impl<R> Prompter for LinePrompter<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_answer(&self, prompt: &str) -> std::io::Result<Option<String>> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(prompt.as_bytes()).await?;
        stderr.flush().await?;

        let mut line = String::new();
        let read = self.input.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    async fn notify(&self, message: &str) -> std::io::Result<()> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(format!("{}\n", message).as_bytes()).await?;
        stderr.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_reads_lines_until_end_of_input() {
        let input = Builder::new().read(b"y\r\n").read(b" no \n").build();
        let prompter = LinePrompter::from_reader(input);

        assert_eq!(prompter.read_answer("? ").await.unwrap().as_deref(), Some("y"));
        assert_eq!(prompter.read_answer("? ").await.unwrap().as_deref(), Some(" no "));
        assert_eq!(prompter.read_answer("? ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let input = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            .build();
        let prompter = LinePrompter::from_reader(input);

        let err = prompter.read_answer("? ").await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
