//! Scripted prompter for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::gate::Prompter;

/// Prompter that replays scripted answers.
///
/// When the script runs out it reports end of input, or waits forever after
/// [`ScriptedPrompter::hang_when_exhausted`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    answers: Arc<Mutex<VecDeque<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    notices: Arc<Mutex<Vec<String>>>,
    hang_when_empty: bool,
}

impl ScriptedPrompter {
    pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().map(String::from).collect())),
            ..Default::default()
        }
    }

    /// Leave the prompt pending once the script is used up.
    pub fn hang_when_exhausted(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Notices shown so far.
    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn read_answer(&self, prompt: &str) -> std::io::Result<Option<String>> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
        if next.is_none() && self.hang_when_empty {
            std::future::pending::<()>().await;
        }
        Ok(next)
    }

    async fn notify(&self, message: &str) -> std::io::Result<()> {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(message.to_string());
        }
        Ok(())
    }
}
