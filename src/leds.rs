//! LED ring animation
//!
//! A background task renders one frame every 50ms from the shared
//! [`OrbStatus`] and pushes it to a [`PixelStrip`].

use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::Result;
use crate::config::LedConfig;
use crate::state::{OrbState, OrbStatus};

/// Time between rendered frames
pub const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// How long `stop` waits for the animation task
const STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// One pixel colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale each channel by `factor`, truncating like integer conversion
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scaled(self, factor: f64) -> Self {
        let f = |c: u8| (f64::from(c) * factor).clamp(0.0, 255.0) as u8;
        Self::new(f(self.r), f(self.g), f(self.b))
    }
}

/// Output device for rendered frames
pub trait PixelStrip: Send {
    /// Display one frame
    ///
    /// # Errors
    ///
    /// Returns error if the device rejects the frame
    fn show(&mut self, pixels: &[Rgb]) -> Result<()>;
}

/// Strip that only logs (no LED hardware attached)
#[derive(Debug, Default)]
pub struct DryRunStrip {
    frames: u64,
    last_first: Option<Rgb>,
}

impl DryRunStrip {
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl PixelStrip for DryRunStrip {
    fn show(&mut self, pixels: &[Rgb]) -> Result<()> {
        self.frames += 1;
        let first = pixels.first().copied();
        if first != self.last_first {
            tracing::trace!(frame = self.frames, first = ?first, "led frame");
            self.last_first = first;
        }
        Ok(())
    }
}

/// Strip for the configuration
///
/// No native ws281x driver is bundled, so hardware mode logs frames as well.
#[must_use]
pub fn build_strip(config: &LedConfig, dry_run: bool) -> Box<dyn PixelStrip> {
    if dry_run {
        tracing::info!("LED dry-run: animations logged only");
    } else {
        tracing::warn!(
            pin = config.pin,
            dma = config.dma,
            freq_hz = config.freq_hz,
            invert = config.invert,
            "no LED driver available, animations logged only"
        );
    }
    Box::new(DryRunStrip::default())
}

/// Render the frame for `state` at animation time `t` seconds
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_frame(state: OrbState, t: f64, level: f32, count: usize) -> Vec<Rgb> {
    let position = |i: usize| i as f64 / count.max(1) as f64;
    let channel = |base: f64, scale: f64| (base * scale) as u8;

    match state {
        OrbState::Ambient => (0..count)
            .map(|i| {
                let ripple = 0.5 + 0.5 * (position(i) * TAU + t * 0.8).sin();
                Rgb::new(
                    8.0f64.mul_add(ripple, 2.0) as u8,
                    25.0f64.mul_add(ripple, 22.0) as u8,
                    40.0f64.mul_add(ripple, 26.0) as u8,
                )
            })
            .collect(),
        OrbState::Listening => {
            let breathe = 0.65f64.mul_add(0.5 + 0.5 * (t * 2.2).sin(), 0.35);
            vec![
                Rgb::new(
                    channel(8.0, breathe),
                    channel(45.0, breathe),
                    channel(55.0, breathe)
                );
                count
            ]
        }
        OrbState::Speaking => {
            let amplitude = 0.8f64.mul_add(f64::from(level.clamp(0.0, 1.0)), 0.2);
            (0..count)
                .map(|i| {
                    let wave = 0.5 + 0.5 * (position(i) * TAU - t * 4.5).sin();
                    let intensity = 0.75f64.mul_add(wave, 0.25) * amplitude;
                    Rgb::new(
                        channel(6.0, intensity),
                        channel(40.0, intensity),
                        channel(56.0, intensity),
                    )
                })
                .collect()
        }
        OrbState::Error => {
            let blink = if ((t * 6.0) as u64) % 2 == 0 { 1.0 } else { 0.1 };
            vec![
                Rgb::new(
                    channel(35.0, blink),
                    channel(8.0, blink),
                    channel(8.0, blink)
                );
                count
            ]
        }
        OrbState::Processing => vec![Rgb::new(6, 10, 12); count],
    }
}

/// Drives the LED ring from the shared status
pub struct LedController {
    count: usize,
    brightness: f64,
    status: Arc<OrbStatus>,
    strip: Box<dyn PixelStrip>,
}

impl LedController {
    #[must_use]
    pub fn new(config: &LedConfig, status: Arc<OrbStatus>, strip: Box<dyn PixelStrip>) -> Self {
        Self {
            count: config.count as usize,
            brightness: config.brightness,
            status,
            strip,
        }
    }

    /// Start the animation task
    #[must_use]
    pub fn start(self) -> LedHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let count = self.count;
        let task = tokio::spawn(self.run(stop_rx));
        LedHandle {
            count,
            stop_tx: Some(stop_tx),
            task,
        }
    }

    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) -> Box<dyn PixelStrip> {
        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut t = 0.0f64;
        let mut warned = false;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let frame: Vec<Rgb> = render_frame(
                        self.status.state(),
                        t,
                        self.status.speaking_level(),
                        self.count,
                    )
                    .into_iter()
                    .map(|px| px.scaled(self.brightness))
                    .collect();

                    if let Err(e) = self.strip.show(&frame)
                        && !warned
                    {
                        tracing::warn!(error = %e, "failed to update LEDs");
                        warned = true;
                    }
                    t += FRAME_INTERVAL.as_secs_f64();
                }
            }
        }

        self.strip
    }
}

/// Running animation task
pub struct LedHandle {
    count: usize,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<Box<dyn PixelStrip>>,
}

impl LedHandle {
    /// Stop animating and blank the ring
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match tokio::time::timeout(STOP_TIMEOUT, &mut self.task).await {
            Ok(Ok(mut strip)) => {
                if let Err(e) = strip.show(&vec![Rgb::BLACK; self.count]) {
                    tracing::warn!(error = %e, "failed to clear LEDs");
                }
            }
            Ok(Err(e)) => tracing::warn!(error = %e, "LED task failed"),
            Err(_) => {
                tracing::warn!("LED task did not stop in time");
                self.task.abort();
            }
        }
    }
}
