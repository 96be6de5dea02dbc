use std::io::{self, Stderr};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
}

/// Terminal input plus the animation tick, merged into one channel.
///
/// Both producer tasks are aborted when the handler is dropped.
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    reader: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn event reader task
        let tx_events = tx.clone();
        let reader = tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    // Only handle key press events, not release
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(w, h)) => Some(AppEvent::Resize(w, h)),
                    _ => None,
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        let ticker = tokio::spawn(tick_loop(tx, tick_interval));

        Self { rx, reader, ticker }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.reader.abort();
        self.ticker.abort();
    }
}

async fn tick_loop(tx: mpsc::UnboundedSender<AppEvent>, tick_interval: Duration) {
    let mut interval = tokio::time::interval(tick_interval);
    loop {
        interval.tick().await;
        if tx.send(AppEvent::Tick).is_err() {
            break;
        }
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    execute!(io::stderr(), EnterAlternateScreen)?;

    // Enable mouse capture
    execute!(io::stderr(), crossterm::event::EnableMouseCapture)?;

    let backend = CrosstermBackend::new(io::stderr());
    let terminal = Terminal::new(backend)?;

    Ok(terminal)
}

pub fn restore() -> Result<()> {
    execute!(io::stderr(), crossterm::event::DisableMouseCapture)?;
    execute!(io::stderr(), LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tick_loop_stops_when_receiver_is_gone() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = tokio::spawn(tick_loop(tx, Duration::from_millis(5)));

        assert!(matches!(rx.recv().await, Some(AppEvent::Tick)));
        assert!(matches!(rx.recv().await, Some(AppEvent::Tick)));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(2), ticker)
            .await
            .expect("tick task should end")
            .unwrap();
    }

    #[tokio::test]
    async fn test_aborted_ticker_stops_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = tokio::spawn(tick_loop(tx, Duration::from_millis(5)));
        assert!(matches!(rx.recv().await, Some(AppEvent::Tick)));

        ticker.abort();
        assert!(ticker.await.unwrap_err().is_cancelled());

        // Drain what was queued before the abort, then the channel is closed
        while rx.try_recv().is_ok() {}
        assert!(rx.recv().await.is_none());
    }
}
