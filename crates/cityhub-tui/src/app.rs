use std::sync::Arc;

use cityhub_core::{
    BackendError, CompletionBackend, Conversation, PendingRequest, Provider, Settings,
    SubmitRejected, TurnId,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Loading indicator: how many dots to draw, cycling 1, 2, 3, 1, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingDots(u8);

impl LoadingDots {
    pub const MAX: u8 = 3;

    pub fn new() -> Self {
        Self(1)
    }

    pub fn advance(&mut self) {
        self.0 = if self.0 < Self::MAX { self.0 + 1 } else { 1 };
    }

    pub fn reset(&mut self) {
        self.0 = 1;
    }

    pub fn count(&self) -> u8 {
        self.0
    }

    pub fn glyphs(&self) -> String {
        vec!["•"; self.0 as usize].join(" ")
    }
}

impl Default for LoadingDots {
    fn default() -> Self {
        Self::new()
    }
}

/// The request currently running on the runtime
pub struct RequestTask {
    pub turn_id: TurnId,
    handle: JoinHandle<Result<String, BackendError>>,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input buffer
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Conversation state
    pub conversation: Conversation,
    pub request_task: Option<RequestTask>,

    // Animation state
    pub dots: LoadingDots,

    // Chat pane scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub follow_bottom: bool,

    // Backend
    backend: Arc<dyn CompletionBackend>,
    pub provider: Provider,
    pub model: Option<String>,
}

impl App {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: &Settings) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            conversation: Conversation::new(),
            request_task: None,

            dots: LoadingDots::new(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            follow_bottom: true,

            backend,
            provider: settings.provider,
            model: settings.model.clone(),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_pending(&self) -> bool {
        self.conversation.is_pending()
    }

    /// Whether `turn_id` is the bot turn still waiting on the backend
    pub fn is_awaiting(&self, turn_id: &TurnId) -> bool {
        self.conversation
            .in_flight()
            .is_some_and(|request| &request.turn_id == turn_id)
    }

    /// Send whatever is in the input box
    pub fn submit_input(&mut self) -> Result<(), SubmitRejected> {
        let request = self.conversation.submit(&self.input)?;
        self.input.clear();
        self.cursor = 0;
        self.dispatch(request);
        Ok(())
    }

    pub fn retry(&mut self) -> Result<(), SubmitRejected> {
        let request = self.conversation.retry()?;
        self.dispatch(request);
        Ok(())
    }

    fn dispatch(&mut self, request: PendingRequest) {
        let backend = Arc::clone(&self.backend);
        let prompt = request.prompt;
        info!(turn = %request.turn_id, backend = backend.name(), "dispatching request");

        let handle = tokio::spawn(async move { backend.complete(&prompt).await });
        self.request_task = Some(RequestTask {
            turn_id: request.turn_id,
            handle,
        });
        self.dots.reset();
        self.follow_bottom = true;
    }

    /// Feed a finished request back into the conversation. Never blocks.
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .is_some_and(|task| task.handle.is_finished());
        if !finished {
            return;
        }
        let Some(task) = self.request_task.take() else {
            return;
        };

        let result = match task.handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(BackendError::Cancelled),
            Err(err) => Err(BackendError::Task(err.to_string())),
        };
        self.conversation.resolve(&task.turn_id, result);
        self.follow_bottom = true;
    }

    /// Abort the running request; the bot turn becomes a retryable error.
    ///
    /// A task that already finished keeps its result for `poll_request`.
    pub fn cancel_request(&mut self) {
        if self
            .request_task
            .as_ref()
            .is_some_and(|task| task.handle.is_finished())
        {
            debug!("request already finished, cancel ignored");
            return;
        }
        if let Some(task) = self.request_task.take() {
            task.handle.abort();
            debug!(turn = %task.turn_id, "request task aborted");
        }
        self.conversation.cancel();
    }

    pub fn clear_conversation(&mut self) {
        if self.conversation.clear().is_ok() {
            self.chat_scroll = 0;
            self.follow_bottom = true;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_pending() {
            self.dots.advance();
        }
    }

    /// Stop background work before the terminal is restored
    pub fn shutdown(&mut self) {
        if let Some(task) = self.request_task.take() {
            task.handle.abort();
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn page_size(&self) -> u16 {
        (self.visible_height() / 2).max(1)
    }

    /// Keep the newest turn (and the dots) in view
    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_scroll();
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    fn max_scroll(&self) -> u16 {
        self.chat_line_count().saturating_sub(self.visible_height())
    }

    /// Rendered height of the chat pane's content
    pub fn chat_line_count(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for turn in self.conversation.turns() {
            total_lines = total_lines.saturating_add(1); // Role line ("You:" or "CityHub:")
            if turn.is_placeholder() && self.is_awaiting(&turn.id) {
                total_lines = total_lines.saturating_add(2); // dots + blank line
                continue;
            }
            for line in turn.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { char_count.div_ceil(wrap_width) };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            if turn.is_error {
                total_lines = total_lines.saturating_add(1); // retry hint
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        total_lines
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn delete_before_cursor(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete_at_cursor(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
