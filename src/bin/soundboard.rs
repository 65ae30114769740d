//! Soundboard command-line client
//!
//! Triggers sounds on a remote soundboard server and uploads new ones.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use soundboard_client::{
    audio::{ChannelLayout, SymphoniaDecoder},
    codec::{FrameReader, OpusDecoder},
    config::AppConfig,
    protocol::PlaySoundSpec,
    session::SessionClient,
    transcode::Transcoder,
};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "soundboard", version, about = "Remote soundboard control client")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL, e.g. http://127.0.0.1:8081
    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    guild: Option<String>,

    #[arg(long, global = true)]
    channel: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play one sound
    Play { name: String },
    /// Play snippets back to back, each as <name>:<start>-<end> in ms
    PlayMulti {
        #[arg(required = true)]
        specs: Vec<PlaySoundSpec>,
    },
    /// Send a raw multi-play instruction without checking it
    Instruct { text: String },
    /// Stop playback
    Stop,
    /// Transcode an audio file and upload it
    Upload { file: PathBuf },
    /// Transcode an audio file into a packed blob on disk
    Transcode { input: PathBuf, output: PathBuf },
    /// Summarize a packed blob
    Inspect { blob: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    if cli.guild.is_some() {
        config.session.guild_id = cli.guild;
    }
    if cli.channel.is_some() {
        config.session.channel_id = cli.channel;
    }

    match cli.command {
        Command::Transcode { input, output } => {
            let blob = transcode_file(&config, &input).await?;
            std::fs::write(&output, &blob)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!("Wrote {} bytes to {}", blob.len(), output.display());
        }
        Command::Inspect { blob } => inspect(&blob)?,
        Command::Play { name } => {
            let client = connect(&config)?;
            client.play(&name).await?;
            finish(&client).await;
        }
        Command::PlayMulti { specs } => {
            let client = connect(&config)?;
            client.play_multiple(&specs).await?;
            finish(&client).await;
        }
        Command::Instruct { text } => {
            let client = connect(&config)?;
            client.play_multiple_instruction(&text).await?;
            finish(&client).await;
        }
        Command::Stop => {
            let client = connect(&config)?;
            client.stop().await?;
            finish(&client).await;
        }
        Command::Upload { file } => {
            let client = connect(&config)?;
            let blob = transcode_file(&config, &file).await?;
            client.upload(blob).await?;
            tracing::info!("Uploaded {}", file.display());
        }
    }

    Ok(())
}

fn connect(config: &AppConfig) -> Result<SessionClient> {
    let client = SessionClient::new(&config.server)?;
    let identity = config.session.identity();
    client.init(identity.guild_id, identity.channel_id);
    Ok(client)
}

/// Close the control connection once queued commands have been written
async fn finish(client: &SessionClient) {
    if tokio::time::timeout(CLOSE_TIMEOUT, client.close()).await.is_err() {
        tracing::warn!("Server did not acknowledge close");
    }
}

async fn transcode_file(config: &AppConfig, path: &Path) -> Result<Bytes> {
    let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let decoder = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => SymphoniaDecoder::with_extension(ext),
        None => SymphoniaDecoder::new(),
    };
    let transcoder = Transcoder::with_decoder(decoder, config.encoder.clone());
    Ok(transcoder.transcode(Bytes::from(raw)).await?)
}

fn inspect(path: &Path) -> Result<()> {
    let blob = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut decoder = OpusDecoder::new(48000, ChannelLayout::Stereo)?;

    let mut largest = 0;
    for chunk in FrameReader::new(&blob) {
        let chunk = chunk?;
        largest = largest.max(chunk.len());
        decoder.decode(chunk)?;
    }

    let stats = decoder.stats();
    if stats.frames_decoded == 0 {
        bail!("{} contains no frames", path.display());
    }
    println!("File:      {}", path.display());
    println!("Size:      {} bytes", blob.len());
    println!("Frames:    {}", stats.frames_decoded);
    println!("Largest:   {} bytes", largest);
    println!("Duration:  {} ms", stats.duration_ms);
    Ok(())
}
