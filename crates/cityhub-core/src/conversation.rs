//! The conversation state machine.
//!
//! ```text
//! Idle --submit--> Pending --resolve(Ok)--> Idle
//!                     |
//!                     +--resolve(Err)/cancel--> Failed --retry--> Pending
//! ```
//!
//! `Conversation` never talks to the network itself. `submit` and `retry`
//! hand back a [`PendingRequest`] for the caller to run against a
//! [`CompletionBackend`], and the outcome is fed back through `resolve`.
//! At most one request is in flight at a time.

use tracing::{debug, info, warn};

use crate::backend::CompletionBackend;
use crate::error::{BackendError, SubmitRejected};
use crate::markup::html_to_text;
use crate::state::{Role, Turn, TurnId};

/// The one exchange currently waiting on the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Bot turn the answer will be written into
    pub turn_id: TurnId,
    /// Normalized prompt to send
    pub prompt: String,
}

#[derive(Debug, Clone)]
struct RetryState {
    prompt: String,
    turn_id: TurnId,
}

#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    in_flight: Option<PendingRequest>,
    retry: Option<RetryState>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn(&self, id: &TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<&PendingRequest> {
        self.in_flight.as_ref()
    }

    pub fn can_retry(&self) -> bool {
        self.retry.is_some() && !self.is_pending()
    }

    pub fn last_failed_prompt(&self) -> Option<&str> {
        self.retry.as_ref().map(|r| r.prompt.as_str())
    }

    pub fn last_failed_turn_id(&self) -> Option<&TurnId> {
        self.retry.as_ref().map(|r| &r.turn_id)
    }

    /// Start a new exchange: a user turn plus an empty bot placeholder.
    ///
    /// The prompt is normalized to plain text first. Nothing changes when a
    /// request is already pending or the prompt is empty.
    pub fn submit(&mut self, prompt_text: &str) -> Result<PendingRequest, SubmitRejected> {
        if self.is_pending() {
            debug!("submit ignored, request in flight");
            return Err(SubmitRejected::Busy);
        }

        let prompt = html_to_text(prompt_text);
        if prompt.is_empty() {
            debug!("submit ignored, empty prompt");
            return Err(SubmitRejected::EmptyInput);
        }

        let bot = Turn::bot_placeholder();
        let request = PendingRequest {
            turn_id: bot.id.clone(),
            prompt: prompt.clone(),
        };

        self.turns.push(Turn::user(prompt));
        self.turns.push(bot);
        self.in_flight = Some(request.clone());

        info!(turn = %request.turn_id, "submitted prompt");
        Ok(request)
    }

    /// Re-run the last failed request into the same bot turn
    pub fn retry(&mut self) -> Result<PendingRequest, SubmitRejected> {
        if self.is_pending() {
            debug!("retry ignored, request in flight");
            return Err(SubmitRejected::Busy);
        }

        let retry = self.retry.clone().ok_or(SubmitRejected::NothingToRetry)?;
        let Some(turn) = self.turns.iter_mut().find(|t| t.id == retry.turn_id) else {
            warn!(turn = %retry.turn_id, "failed turn vanished, dropping retry state");
            self.retry = None;
            return Err(SubmitRejected::NothingToRetry);
        };
        turn.text.clear();
        turn.is_error = false;

        let request = PendingRequest {
            turn_id: retry.turn_id,
            prompt: retry.prompt,
        };
        self.in_flight = Some(request.clone());

        info!(turn = %request.turn_id, "retrying prompt");
        Ok(request)
    }

    /// Record the outcome of the in-flight request.
    ///
    /// Returns false (and changes nothing) when `turn_id` is not the request
    /// currently in flight.
    pub fn resolve(&mut self, turn_id: &TurnId, result: Result<String, BackendError>) -> bool {
        match &self.in_flight {
            Some(request) if &request.turn_id == turn_id => {}
            _ => {
                warn!(turn = %turn_id, "ignoring result for a request that is not in flight");
                return false;
            }
        }
        let Some(request) = self.in_flight.take() else {
            return false;
        };

        let Some(turn) = self.turns.iter_mut().find(|t| t.id == request.turn_id) else {
            warn!(turn = %request.turn_id, "bot turn missing, result dropped");
            return false;
        };

        match result {
            Ok(text) => {
                info!(turn = %request.turn_id, "request succeeded");
                turn.text = text.trim().to_string();
                turn.is_error = false;
                self.retry = None;
            }
            Err(err) => {
                warn!(turn = %request.turn_id, error = %err, "request failed");
                turn.text = format!("Error: {}", err);
                turn.is_error = true;
                self.retry = Some(RetryState {
                    prompt: request.prompt,
                    turn_id: request.turn_id,
                });
            }
        }
        true
    }

    /// Give up on the in-flight request. It becomes a retryable failure.
    pub fn cancel(&mut self) -> Option<TurnId> {
        let turn_id = self.in_flight.as_ref()?.turn_id.clone();
        self.resolve(&turn_id, Err(BackendError::Cancelled));
        Some(turn_id)
    }

    /// Drop every turn and the retry state
    pub fn clear(&mut self) -> Result<(), SubmitRejected> {
        if self.is_pending() {
            return Err(SubmitRejected::Busy);
        }
        self.turns.clear();
        self.retry = None;
        Ok(())
    }

    /// Submit and wait for the backend. Returns the bot turn's id.
    pub async fn exchange(
        &mut self,
        backend: &dyn CompletionBackend,
        prompt_text: &str,
    ) -> Result<TurnId, SubmitRejected> {
        let request = self.submit(prompt_text)?;
        Ok(self.dispatch(backend, request).await)
    }

    /// Retry and wait for the backend. Returns the bot turn's id.
    pub async fn retry_with(&mut self, backend: &dyn CompletionBackend) -> Result<TurnId, SubmitRejected> {
        let request = self.retry()?;
        Ok(self.dispatch(backend, request).await)
    }

    async fn dispatch(&mut self, backend: &dyn CompletionBackend, request: PendingRequest) -> TurnId {
        let result = backend.complete(&request.prompt).await;
        self.resolve(&request.turn_id, result);
        request.turn_id
    }

    /// Number of user turns so far
    pub fn question_count(&self) -> usize {
        self.turns.iter().filter(|t| t.role == Role::User).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Answers from a queue and records every prompt it saw
    struct Scripted {
        answers: Mutex<VecDeque<Result<String, BackendError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: Vec<Result<String, BackendError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                prompts: Mutex::default(),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(BackendError::NoChoice))
        }
    }

    fn refused() -> BackendError {
        BackendError::Status {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "upstream down".to_string(),
        }
    }

    #[test]
    fn test_empty_prompt_is_ignored() {
        let mut conversation = Conversation::new();
        for prompt in ["", "   ", "\n\t", "<p> </p>", "&nbsp;"] {
            assert_eq!(conversation.submit(prompt), Err(SubmitRejected::EmptyInput));
        }
        assert!(conversation.turns().is_empty());
        assert!(!conversation.is_pending());
    }

    #[test]
    fn test_submit_while_pending_is_ignored() {
        let mut conversation = Conversation::new();
        conversation.submit("first").unwrap();

        assert_eq!(conversation.submit("second"), Err(SubmitRejected::Busy));
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.turns()[0].text, "first");
    }

    #[test]
    fn test_submit_appends_user_and_placeholder() {
        let mut conversation = Conversation::new();
        let request = conversation.submit("  <b>hello</b> ").unwrap();

        assert!(conversation.is_pending());
        assert_eq!(request.prompt, "hello");

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].role, Role::Bot);
        assert_eq!(turns[1].id, request.turn_id);
        assert!(turns[1].is_placeholder());
        assert_ne!(turns[0].id, turns[1].id);
    }

    #[test]
    fn test_submit_keeps_plain_angle_brackets() {
        let mut conversation = Conversation::new();
        let request = conversation.submit("is rent < $2000 or > $3000?").unwrap();

        assert_eq!(request.prompt, "is rent < $2000 or > $3000?");
        assert_eq!(conversation.turns()[0].text, "is rent < $2000 or > $3000?");
    }

    #[tokio::test]
    async fn test_backend_sees_decoded_prompt() {
        let backend = Scripted::new(vec![Ok("yes".to_string())]);
        let mut conversation = Conversation::new();

        conversation.exchange(&backend, "caf&eacute; open if temp > 30?").await.unwrap();

        assert_eq!(backend.prompts(), vec!["caf\u{e9} open if temp > 30?"]);
        assert_eq!(conversation.turns()[0].text, "caf\u{e9} open if temp > 30?");
    }

    #[test]
    fn test_success_fills_bot_turn() {
        let mut conversation = Conversation::new();
        let request = conversation.submit("hello").unwrap();

        assert!(conversation.resolve(&request.turn_id, Ok("  hi there \n".to_string())));

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].text, "hi there");
        assert!(!turns[1].is_error);
        assert!(!conversation.is_pending());
        assert!(conversation.last_failed_prompt().is_none());
    }

    #[test]
    fn test_failure_marks_turn_and_records_retry() {
        let mut conversation = Conversation::new();
        let request = conversation.submit("hello").unwrap();

        conversation.resolve(&request.turn_id, Err(refused()));

        let bot = &conversation.turns()[1];
        assert!(bot.is_error);
        assert_eq!(bot.text, "Error: request failed with status 502 Bad Gateway: upstream down");
        assert!(!conversation.is_pending());
        assert_eq!(conversation.last_failed_prompt(), Some("hello"));
        assert_eq!(conversation.last_failed_turn_id(), Some(&request.turn_id));
        assert!(conversation.can_retry());
    }

    #[test]
    fn test_retry_reuses_bot_turn() {
        let mut conversation = Conversation::new();
        let first = conversation.submit("hello").unwrap();
        conversation.resolve(&first.turn_id, Err(refused()));

        let again = conversation.retry().unwrap();
        assert_eq!(again, first);
        assert_eq!(conversation.turns().len(), 2);
        assert!(conversation.turns()[1].is_placeholder());
        assert!(conversation.is_pending());
        assert!(!conversation.can_retry());

        conversation.resolve(&again.turn_id, Ok("hi there".to_string()));
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.turns()[1].text, "hi there");
        assert!(!conversation.turns()[1].is_error);
        assert!(conversation.last_failed_prompt().is_none());
        assert!(conversation.last_failed_turn_id().is_none());
    }

    #[test]
    fn test_retry_without_failure() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.retry(), Err(SubmitRejected::NothingToRetry));

        let request = conversation.submit("hello").unwrap();
        assert_eq!(conversation.retry(), Err(SubmitRejected::Busy));

        conversation.resolve(&request.turn_id, Ok("hi".to_string()));
        assert_eq!(conversation.retry(), Err(SubmitRejected::NothingToRetry));
    }

    #[test]
    fn test_stale_result_is_ignored() {
        let mut conversation = Conversation::new();
        let first = conversation.submit("one").unwrap();
        conversation.resolve(&first.turn_id, Ok("1".to_string()));
        let second = conversation.submit("two").unwrap();

        assert!(!conversation.resolve(&first.turn_id, Ok("late".to_string())));
        assert_eq!(conversation.turns()[1].text, "1");
        assert!(conversation.is_pending());

        assert!(conversation.resolve(&second.turn_id, Ok("2".to_string())));
        assert!(!conversation.resolve(&second.turn_id, Ok("again".to_string())));
        assert_eq!(conversation.turns()[3].text, "2");
    }

    #[test]
    fn test_cancel_makes_request_retryable() {
        let mut conversation = Conversation::new();
        assert!(conversation.cancel().is_none());

        let request = conversation.submit("hello").unwrap();
        assert_eq!(conversation.cancel(), Some(request.turn_id.clone()));

        assert!(!conversation.is_pending());
        assert_eq!(conversation.turns()[1].text, "Error: request cancelled");
        assert_eq!(conversation.last_failed_turn_id(), Some(&request.turn_id));
    }

    #[test]
    fn test_new_failure_replaces_retry_target() {
        let mut conversation = Conversation::new();
        let first = conversation.submit("one").unwrap();
        conversation.resolve(&first.turn_id, Err(refused()));
        let second = conversation.submit("two").unwrap();
        conversation.resolve(&second.turn_id, Err(BackendError::Timeout));

        assert_eq!(conversation.last_failed_prompt(), Some("two"));
        assert_eq!(conversation.last_failed_turn_id(), Some(&second.turn_id));
        assert!(conversation.turns()[1].is_error);
        assert_eq!(conversation.question_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut conversation = Conversation::new();
        let request = conversation.submit("hello").unwrap();
        assert_eq!(conversation.clear(), Err(SubmitRejected::Busy));

        conversation.resolve(&request.turn_id, Err(refused()));
        conversation.clear().unwrap();
        assert!(conversation.turns().is_empty());
        assert!(!conversation.can_retry());
    }

    #[tokio::test]
    async fn test_exchange_success_scenario() {
        let backend = Scripted::new(vec![Ok("hi there".to_string())]);
        let mut conversation = Conversation::new();

        let turn_id = conversation.exchange(&backend, "hello").await.unwrap();

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!((turns[0].role, turns[0].text.as_str()), (Role::User, "hello"));
        assert_eq!((turns[1].role, turns[1].text.as_str()), (Role::Bot, "hi there"));
        assert_eq!(turns[1].id, turn_id);
        assert!(!turns[1].is_error);
        assert!(!conversation.is_pending());
        assert_eq!(backend.prompts(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_exchange_failure_then_retry_scenario() {
        let backend = Scripted::new(vec![Err(refused()), Ok("hi there".to_string())]);
        let mut conversation = Conversation::new();

        let failed = conversation.exchange(&backend, "hello").await.unwrap();
        let bot = conversation.turn(&failed).unwrap();
        assert!(bot.is_error);
        assert!(bot.text.starts_with("Error: "));

        let retried = conversation.retry_with(&backend).await.unwrap();
        assert_eq!(retried, failed);

        let turns = conversation.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "hello");
        assert_eq!(turns[1].text, "hi there");
        assert!(!turns[1].is_error);
        assert!(!conversation.can_retry());
        assert_eq!(backend.prompts(), vec!["hello", "hello"]);
    }

    #[tokio::test]
    async fn test_exchange_against_local_endpoint() {
        use crate::backend::test_server::serve_once;
        use crate::backend::LocalClient;

        let (url, _server) = serve_once(200, "text/plain", "hi there").await;
        let backend = LocalClient::new(reqwest::Client::new(), &url);
        let mut conversation = Conversation::new();

        let turn_id = conversation.exchange(&backend, "hello").await.unwrap();
        assert_eq!(conversation.turn(&turn_id).unwrap().text, "hi there");
    }
}
