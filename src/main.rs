use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use persona_voicebot::config::TtsConfig;
use persona_voicebot::voice::{
    AudioCapture, Microphone, PLAYBACK_SAMPLE_RATE, Speaker, SpeechToText, TextToSpeech,
    VoiceOutput, chunk_energy, decode_mp3, resample,
};
use persona_voicebot::{
    ClientConfig, RelayClient, RelayConfig, RelayServer, RelayState, Stopped, VoiceClient,
};

/// Voicebot - talk to a persona chatbot out loud
#[derive(Parser)]
#[command(name = "voicebot", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP relay in front of the chat model
    Relay {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the voice client
    Client {
        /// Relay chat URL
        #[arg(long)]
        relay_url: Option<url::Url>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "info,persona_voicebot=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Relay { host, port } => run_relay(host, port).await,
        Command::Client { relay_url } => run_client(relay_url).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker(),
        Command::TestTts { text } => test_tts(&text).await,
    }
}

/// Cancel the token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        trigger.cancel();
    });

    token
}

async fn run_relay(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = RelayConfig::load()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    let state = RelayState::from_config(&config);
    let shutdown = cancel_on_ctrl_c();

    RelayServer::new(state, &config)
        .run(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn run_client(relay_url: Option<url::Url>) -> anyhow::Result<()> {
    let mut config = ClientConfig::load()?;
    if let Some(url) = relay_url {
        config.relay_url = url;
    }

    tracing::info!(
        relay = %config.relay_url,
        stt = %config.stt.provider,
        tts = %config.tts.provider,
        "starting voice client"
    );

    let mut client = VoiceClient::new(
        Microphone::new(config.listen),
        SpeechToText::from_config(&config.stt),
        RelayClient::new(config.relay_url.clone()),
        VoiceOutput::new(TextToSpeech::from_config(&config.tts), config.audio_dir.clone()),
    );

    let cancel = cancel_on_ctrl_c();
    match client.run(&cancel).await? {
        Stopped::ExitCommand => tracing::debug!("stopped by exit command"),
        Stopped::Cancelled => tracing::debug!("stopped by interrupt"),
    }

    Ok(())
}

/// Print a per-second level meter for the default microphone
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::open()?;

    println!(
        "Sample rate: {} Hz, {} channel(s) mixed to mono",
        capture.sample_rate(),
        capture.channels()
    );
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = chunk_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy / 100.0).min(50.0) as usize;
        let meter = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] energy: {energy:7.1} | peak: {peak:.4} | [{meter}]", i + 1);
    }

    drop(capture);

    println!("\n---");
    println!("Speech must rise above the ambient level to be picked up.");
    println!("If the meter never moves, check your default input device.");

    Ok(())
}

/// Play a 440 Hz tone for 2 seconds
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());
    Speaker::new().play_samples(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Synthesize text through the client's TTS settings and play it
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = TtsConfig::load()?;
    let tts = TextToSpeech::from_config(&config);

    println!("Synthesizing speech with {}...", config.provider);
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    let (samples, sample_rate) = decode_mp3(&mp3_data)?;
    println!("Decoded {} samples at {sample_rate} Hz", samples.len());

    let samples = resample(&samples, sample_rate, PLAYBACK_SAMPLE_RATE)?;

    println!("Playing audio...");
    Speaker::new().play_samples(samples)?;
    println!("Done!");

    Ok(())
}
