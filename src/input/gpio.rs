//! Capacitive touch pad on a GPIO pin (sysfs interface)

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::{TriggerKind, TriggerSender, TriggerSource};
use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const SYSFS_GPIO: &str = "/sys/class/gpio";

/// Rising-edge detector with a bounce window
#[derive(Debug, Clone)]
pub struct Debouncer {
    bounce: Duration,
    level: bool,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(bounce: Duration) -> Self {
        Self {
            bounce,
            level: false,
            last_accepted: None,
        }
    }

    /// Feed the current pin level; returns `true` for an accepted press
    pub fn update(&mut self, level: bool, now: Instant) -> bool {
        let rising = level && !self.level;
        self.level = level;
        if !rising {
            return false;
        }
        if self
            .last_accepted
            .is_some_and(|t| now.saturating_duration_since(t) < self.bounce)
        {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

/// Touch pad wired active-high to a GPIO pin
#[derive(Debug)]
pub struct GpioTouch {
    pin: Option<u32>,
    value_path: PathBuf,
    bounce: Duration,
    task: Option<JoinHandle<()>>,
}

impl GpioTouch {
    /// Touch pad on BCM `pin`
    #[must_use]
    pub fn new(pin: u32, bounce: Duration) -> Self {
        Self {
            pin: Some(pin),
            value_path: PathBuf::from(format!("{SYSFS_GPIO}/gpio{pin}/value")),
            bounce,
            task: None,
        }
    }

    /// Poll an arbitrary value file (`0`/`1`) instead of a sysfs pin
    #[must_use]
    pub const fn with_value_path(value_path: PathBuf, bounce: Duration) -> Self {
        Self {
            pin: None,
            value_path,
            bounce,
            task: None,
        }
    }

    /// Export the pin and set it as an input if it is not already
    fn export(&self) -> Result<()> {
        let Some(pin) = self.pin else {
            return Ok(());
        };
        if self.value_path.exists() {
            return Ok(());
        }
        std::fs::write(format!("{SYSFS_GPIO}/export"), pin.to_string())
            .map_err(|e| Error::Config(format!("cannot export GPIO {pin}: {e}")))?;
        std::fs::write(format!("{SYSFS_GPIO}/gpio{pin}/direction"), "in")
            .map_err(|e| Error::Config(format!("cannot configure GPIO {pin}: {e}")))?;
        Ok(())
    }
}

impl TriggerSource for GpioTouch {
    fn name(&self) -> &'static str {
        "gpio-touch"
    }

    fn start(&mut self, triggers: TriggerSender) -> Result<()> {
        self.export()?;
        tracing::info!(path = %self.value_path.display(), "watching touch pad");

        let path = self.value_path.clone();
        let mut debouncer = Debouncer::new(self.bounce);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            let mut warned = false;
            loop {
                ticker.tick().await;
                match tokio::fs::read_to_string(&path).await {
                    Ok(value) => {
                        warned = false;
                        if debouncer.update(value.trim() == "1", Instant::now()) {
                            triggers.fire(TriggerKind::Touch);
                        }
                    }
                    Err(e) if !warned => {
                        tracing::warn!(path = %path.display(), error = %e, "touch pad read failed");
                        warned = true;
                    }
                    Err(_) => {}
                }
            }
        }));
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
    use super::*;
    use crate::input::trigger_channel;

    #[test]
    fn only_rising_edges_count() {
        let now = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(250));
        assert!(!d.update(false, now));
        assert!(d.update(true, now));
        assert!(!d.update(true, now + Duration::from_millis(500)));
    }

    #[test]
    fn presses_inside_bounce_window_are_ignored() {
        let now = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(250));
        assert!(d.update(true, now));
        d.update(false, now + Duration::from_millis(50));
        assert!(!d.update(true, now + Duration::from_millis(100)));
        d.update(false, now + Duration::from_millis(200));
        assert!(d.update(true, now + Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn value_file_change_fires_touch() {
        let dir = tempfile::tempdir().unwrap();
        let value = dir.path().join("value");
        std::fs::write(&value, "0\n").unwrap();

        let (tx, mut rx) = trigger_channel();
        let mut touch = GpioTouch::with_value_path(value.clone(), Duration::from_millis(250));
        touch.start(tx).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&value, "1\n").unwrap();

        let trigger = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trigger.kind, TriggerKind::Touch);
        touch.stop();
    }
}
