//! Ambient Orb - a touch or wake word activated voice assistant
//!
//! The orb loops a background soundtrack. When triggered it ducks the
//! soundtrack, records one utterance, asks an AI provider for a short spoken
//! reply, plays it while the LED ring follows the voice, then fades back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Inputs                          │
//! │   GPIO touch  │  keyboard  │  wake word  │  HTTP API  │
//! └────────────────────────┬─────────────────────────────┘
//!                          │ triggers
//! ┌────────────────────────▼─────────────────────────────┐
//! │                    Orchestrator                       │
//! │  Ambient ducking │ Capture │ Conversation │ Playback  │
//! └────────────────────────┬─────────────────────────────┘
//!                          │
//! ┌────────────────────────▼─────────────────────────────┐
//! │         AI provider (transcribe / chat / speech)      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod ambient;
pub mod api;
pub mod config;
pub mod conversation;
pub mod daemon;
pub mod error;
pub mod input;
pub mod leds;
pub mod orchestrator;
pub mod provider;
pub mod state;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use orchestrator::{CycleOutcome, Orchestrator};
pub use state::{OrbState, OrbStatus};
