//! Multi-turn conversation
//!
//! A session keeps the last few question/answer turns and passes them along as
//! context. Asking a new question cancels the one still in flight.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;
use crate::question::{Question, Turn};
use crate::router::{CancelToken, Router};
use crate::synth::Answer;

pub const DEFAULT_MAX_HISTORY: usize = 20;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Session {
    router: Arc<Router>,
    history: Mutex<Vec<Turn>>,
    current: Mutex<Option<CancelToken>>,
    max_history: usize,
}

impl Session {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            history: Mutex::new(Vec::new()),
            current: Mutex::new(None),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Prior turns, oldest first
    pub fn history(&self) -> Vec<Turn> {
        lock(&self.history).clone()
    }

    pub fn clear(&self) {
        lock(&self.history).clear();
    }

    /// Cancel the in-flight question, if any
    pub fn cancel_current(&self) {
        if let Some(token) = lock(&self.current).take() {
            token.cancel();
        }
    }

    /// Ask a question, routing it automatically
    pub async fn ask(&self, text: &str) -> Result<Answer> {
        self.ask_with(text, &[]).await
    }

    /// Ask a question; a non-empty `tool_ids` bypasses classification
    pub async fn ask_with(&self, text: &str, tool_ids: &[String]) -> Result<Answer> {
        let question = Question::new(text)?.with_context(self.history());
        let token = self.begin();

        let result = if tool_ids.is_empty() {
            self.router.answer(&question, &token).await
        } else {
            match self.router.explicit(tool_ids) {
                Ok(decision) => self.router.answer_with(&question, &decision, &token).await,
                Err(e) => Err(e),
            }
        };

        self.finish(&token);
        let answer = result?;
        self.record(Turn::new(question.text(), answer.text.clone()));
        Ok(answer)
    }

    /// Install a fresh token, cancelling whichever query it supersedes
    fn begin(&self) -> CancelToken {
        let token = CancelToken::new();
        if let Some(previous) = lock(&self.current).replace(token.clone()) {
            log::info!("new question supersedes the one in flight");
            previous.cancel();
        }
        token
    }

    fn finish(&self, token: &CancelToken) {
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|t| t.same_as(token)) {
            *current = None;
        }
    }

    fn record(&self, turn: Turn) {
        let mut history = lock(&self.history);
        history.push(turn);
        if history.len() > self.max_history {
            let excess = history.len() - self.max_history;
            history.drain(..excess);
        }
    }
}
