use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use voxchat::api::{self, ApiState};
use voxchat::audio::{OUTPUT_SAMPLE_RATE, decode_wav};
use voxchat::{ChatMessage, Config, OpenAiClient, TurnEvent, TurnPipeline};

/// voxchat - talk to an assistant, hear it answer
#[derive(Parser)]
#[command(name = "voxchat", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP and WebSocket server (default)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single turn from a WAV file
    Turn {
        /// Utterance to answer
        input: PathBuf,
        /// Where to write the spoken reply
        #[arg(short, long, default_value = "reply.wav")]
        out: PathBuf,
        /// JSON file with earlier messages ([{"role": "user", "content": "..."}])
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxchat=info",
        1 => "info,voxchat=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
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
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Turn {
            input,
            out,
            history,
        } => turn(config, &input, &out, history.as_deref()).await,
    }
}

/// Build the turn pipeline from configuration
fn build_pipeline(config: Config) -> anyhow::Result<TurnPipeline> {
    let api_key = config
        .api_key
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
    let client = OpenAiClient::new(api_key, config.openai)?;

    let settings = client.settings();
    tracing::info!(
        stt = %settings.stt_model,
        llm = %settings.llm_model,
        tts = %settings.tts_model,
        voice = %settings.voice,
        "using hosted models"
    );

    Ok(TurnPipeline::from_openai(Arc::new(client)).with_instructions(config.instructions))
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let server = config.server.clone();
    let port = port.unwrap_or(server.port);

    tracing::info!(
        port,
        concurrency_limit = server.concurrency_limit,
        time_limit_secs = server.time_limit.map(|d| d.as_secs()),
        "starting voxchat"
    );

    let state = Arc::new(ApiState::new(build_pipeline(config)?, &server));
    api::serve(state, port).await?;

    Ok(())
}

async fn turn(
    config: Config,
    input: &Path,
    out: &Path,
    history: Option<&Path>,
) -> anyhow::Result<()> {
    let wav = tokio::fs::read(input).await?;
    let audio = decode_wav(&wav)?;

    let history: Option<Vec<ChatMessage>> = match history {
        Some(path) => Some(serde_json::from_slice(&tokio::fs::read(path).await?)?),
        None => None,
    };

    let pipeline = build_pipeline(config)?;
    let mut events = pipeline.run(&audio, history)?;

    let mut samples: Vec<i16> = Vec::new();
    let mut frames = 0usize;
    while let Some(event) = events.next().await {
        match event {
            TurnEvent::Chat(messages) => println!("{}", serde_json::to_string(&messages)?),
            TurnEvent::Audio(frame) => {
                frames += 1;
                samples.extend_from_slice(&frame.samples);
            }
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: OUTPUT_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(out, spec)?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    tracing::info!(
        frames,
        samples = samples.len(),
        path = %out.display(),
        "reply written"
    );

    Ok(())
}
