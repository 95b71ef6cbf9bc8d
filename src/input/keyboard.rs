//! Keyboard stand-ins for the touch pad and wake word

use std::io::BufRead;
use std::sync::OnceLock;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{TriggerKind, TriggerSender, TriggerSource};
use crate::Result;

/// Lines of text shared by every keyboard source
#[derive(Debug, Clone)]
pub struct LineFeed {
    tx: broadcast::Sender<String>,
}

static STDIN_FEED: OnceLock<LineFeed> = OnceLock::new();

impl Default for LineFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFeed {
    /// A feed with no producer; lines arrive through [`LineFeed::push`]
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// The process-wide feed of stdin lines
    ///
    /// The reader thread starts on first use and ends at EOF.
    #[must_use]
    pub fn stdin() -> Self {
        STDIN_FEED
            .get_or_init(|| {
                let feed = Self::new();
                let tx = feed.tx.clone();
                std::thread::spawn(move || {
                    for line in std::io::stdin().lock().lines() {
                        match line {
                            Ok(line) => {
                                let _ = tx.send(line);
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "stdin closed");
                                break;
                            }
                        }
                    }
                });
                feed
            })
            .clone()
    }

    /// Inject a line
    pub fn push(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }

    fn spawn_listener<F>(&self, triggers: TriggerSender, kind: TriggerKind, matches: F) -> JoinHandle<()>
    where
        F: Fn(&str) -> bool + Send + 'static,
    {
        let mut rx = self.tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(line) if matches(&line) => {
                        triggers.fire(kind);
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Pressing ENTER simulates a touch
#[derive(Debug)]
pub struct KeyboardTouch {
    feed: LineFeed,
    task: Option<JoinHandle<()>>,
}

impl KeyboardTouch {
    #[must_use]
    pub const fn new(feed: LineFeed) -> Self {
        Self { feed, task: None }
    }
}

impl TriggerSource for KeyboardTouch {
    fn name(&self) -> &'static str {
        "keyboard-touch"
    }

    fn start(&mut self, triggers: TriggerSender) -> Result<()> {
        tracing::info!("dry run: press ENTER to simulate touch");
        self.task = Some(
            self.feed
                .spawn_listener(triggers, TriggerKind::Touch, |_| true),
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Typing a line containing the keyword simulates the wake word
#[derive(Debug)]
pub struct KeyboardWakeWord {
    keyword: String,
    feed: LineFeed,
    task: Option<JoinHandle<()>>,
}

impl KeyboardWakeWord {
    #[must_use]
    pub fn new(keyword: String, feed: LineFeed) -> Self {
        Self {
            keyword,
            feed,
            task: None,
        }
    }
}

impl TriggerSource for KeyboardWakeWord {
    fn name(&self) -> &'static str {
        "keyboard-wake-word"
    }

    fn start(&mut self, triggers: TriggerSender) -> Result<()> {
        tracing::info!(keyword = %self.keyword, "type the wake word to start an interaction");
        let keyword = self.keyword.to_lowercase();
        self.task = Some(self.feed.spawn_listener(
            triggers,
            TriggerKind::WakeWord,
            move |line| line.to_lowercase().contains(&keyword),
        ));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::input::trigger_channel;

    #[tokio::test]
    async fn enter_fires_touch() {
        let feed = LineFeed::new();
        let (tx, mut rx) = trigger_channel();
        let mut touch = KeyboardTouch::new(feed.clone());
        touch.start(tx).unwrap();

        feed.push("");
        let trigger = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.kind, TriggerKind::Touch);
        touch.stop();
    }

    #[tokio::test]
    async fn wake_word_matches_case_insensitively() {
        let feed = LineFeed::new();
        let (tx, mut rx) = trigger_channel();
        let mut wake = KeyboardWakeWord::new("Hey Orb".to_string(), feed.clone());
        wake.start(tx).unwrap();

        feed.push("good morning");
        feed.push("well HEY ORB what's up");
        let trigger = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.kind, TriggerKind::WakeWord);
        assert!(rx.try_recv().is_err());
        wake.stop();
    }
}
