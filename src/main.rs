use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ambient_orb::config::{PlaybackBackend, file::default_config_path};
use ambient_orb::voice::{MicRecorder, Recorder, build_playback, decode_file, frame_rms};
use ambient_orb::{Config, Daemon};

/// Ambient Orb - touch or wake word activated voice assistant
#[derive(Parser)]
#[command(name = "orb", version, about)]
struct Cli {
    /// Config file (YAML, or TOML by extension)
    #[arg(short, long, env = "ORB_CONFIG")]
    config: Option<PathBuf>,

    /// Use the keyboard instead of GPIO and log LED frames
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Record one utterance and report its level
    TestMic {
        /// Maximum recording length in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Play a sound file, or a test tone when no file is given
    TestSpeaker {
        /// WAV or MP3 file to play
        path: Option<PathBuf>,
    },
    /// Validate the configuration and print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,ambient_orb=info",
        1 => "info,ambient_orb=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(&config_path, duration).await,
            Command::TestSpeaker { path } => test_speaker(&config_path, path).await,
            Command::CheckConfig => check_config(&config_path),
        };
    }

    let mut config = Config::load(&config_path)?;
    if cli.dry_run {
        config.dry_run = true;
    }
    tracing::info!(
        config = %config_path.display(),
        dry_run = config.dry_run,
        "starting ambient orb"
    );
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;
    Ok(())
}

/// Record one utterance with the configured capture settings
#[allow(clippy::cast_precision_loss)]
async fn test_mic(config_path: &Path, duration: u64) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let mut settings = config.capture;
    settings.max_seconds = duration as f64;

    println!("Recording for up to {duration} seconds...");
    println!("Stay quiet for a second while the noise floor is measured, then speak.\n");

    let recording = MicRecorder::new(settings).record().await?;
    let audio = decode_file(recording.path())?;
    let peak = audio.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

    println!("Duration: {:.2}s", recording.seconds());
    println!("RMS:      {:.4}", frame_rms(&audio.samples));
    println!("Peak:     {peak:.4}");
    println!("\n---");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: alsamixer (to check capture levels)");

    Ok(())
}

/// Play a file, or a generated 440 Hz tone
async fn test_speaker(config_path: &Path, path: Option<PathBuf>) -> anyhow::Result<()> {
    let backend = match Config::load(config_path) {
        Ok(config) => config.playback,
        Err(e) => {
            tracing::warn!(error = %e, "config not usable, falling back to native playback");
            PlaybackBackend::Native
        }
    };
    let playback = build_playback(backend);

    let tone;
    let target = if let Some(path) = path {
        path
    } else {
        tone = write_test_tone()?;
        tone.to_path_buf()
    };

    println!("Playing {} via {backend:?} backend...", target.display());
    playback.play_blocking(&target).await?;

    println!("\n---");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: aplay -l (to list devices)");
    println!("  2. Try: alsamixer (to check output levels)");

    Ok(())
}

/// Two seconds of a 440 Hz sine at 30% volume
fn write_test_tone() -> anyhow::Result<tempfile::TempPath> {
    const SAMPLE_RATE: u32 = 24_000;
    const FREQUENCY: f32 = 440.0;

    let file = tempfile::Builder::new()
        .prefix("orb_tone_")
        .suffix(".wav")
        .tempfile()?;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(file.path(), spec)?;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    for i in 0..SAMPLE_RATE * 2 {
        let t = i as f32 / SAMPLE_RATE as f32;
        let sample = (2.0 * std::f32::consts::PI * FREQUENCY * t).sin() * 0.3;
        writer.write_sample((sample * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;

    Ok(file.into_temp_path())
}

fn check_config(config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    println!("Config: {}", config_path.display());
    println!("  stop keyword:   {}", config.stop_keyword);
    println!(
        "  ambient volume: {} (ducked {})",
        config.ambient.volume_normal, config.ambient.volume_ducked
    );
    println!(
        "  capture:        {} Hz, silence {:.1}s, max {:.1}s",
        config.capture.sample_rate, config.capture.silence_seconds, config.capture.max_seconds
    );
    println!(
        "  models:         {} / {} / {} ({})",
        config.models.transcribe, config.models.chat, config.models.tts, config.models.tts_voice
    );
    println!("  ambient loop:   {}", config.paths.ambient_loop.display());
    println!("  dry run:        {}", config.dry_run);
    println!(
        "  wake word:      {}",
        if config.wake_word.enabled {
            config.wake_word.keyword.as_str()
        } else {
            "disabled"
        }
    );
    println!(
        "  conversation:   {}",
        if config.conversation.enabled {
            format!("{} turns", config.conversation.max_turns)
        } else {
            "disabled".to_string()
        }
    );
    if config.web.enabled {
        println!("  status API:     {}:{}", config.web.host, config.web.port);
    }
    println!("  playback:       {:?}", config.playback);
    println!(
        "  API key:        {}",
        if config.openai.api_key.is_some() { "set" } else { "MISSING" }
    );

    config.require_api_key()?;
    Ok(())
}
