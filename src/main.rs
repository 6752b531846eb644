use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use video_subtitler::{
    cancel_pair, Config, Credentials, LogProgress, ProcessingSettings, SubtitlePipeline,
};

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Command::new("processor")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Transcribe a video and burn the subtitles into it")
        .arg(
            Arg::new("input")
                .value_name("INPUT_VIDEO")
                .help("Video to subtitle")
                .required(true),
        )
        .arg(
            Arg::new("output")
                .value_name("OUTPUT_VIDEO")
                .help("Where to write the processed video")
                .required(true),
        )
        .arg(
            Arg::new("settings")
                .value_name("SETTINGS_JSON")
                .help(r#"Processing settings, e.g. {"subtitleFormat":"vtt","burnSubtitles":true}"#)
                .default_value("{}"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", report(&e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "video_subtitler=debug,processor=debug,info"
    } else {
        "video_subtitler=info,processor=info,warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stdout is reserved for the result line
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let input = PathBuf::from(required(matches, "input")?);
    let output = PathBuf::from(required(matches, "output")?);
    let settings_json = matches
        .get_one::<String>("settings")
        .map(String::as_str)
        .unwrap_or("{}");

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path.as_ref())?.with_env_overrides(),
        None => match Config::load() {
            Ok(config) => config.with_env_overrides(),
            Err(e) => {
                warn!("Failed to load config, using defaults: {}", e);
                Config::from_env()
            }
        },
    };
    debug!("{}", config.summary());

    let settings = ProcessingSettings::from_json(settings_json)?;
    let credentials = Credentials::from_env(&config.transcription.api_key_env)?;

    info!("📁 Input: {}", input.display());
    info!("📂 Output: {}", output.display());
    info!(
        "⚙️  Format: {}, burn subtitles: {}",
        settings.subtitle_format, settings.burn_subtitles
    );

    let (cancel, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling...");
            cancel.cancel();
        }
    });

    let pipeline = SubtitlePipeline::from_config(&config, credentials, signal)?;
    let result = pipeline.run(&input, &settings, &LogProgress).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    // The video is only written once its subtitles are on disk
    let subtitle_path = sidecar_path(&output, result.subtitle_format.extension());
    tokio::fs::write(&subtitle_path, &result.subtitles)
        .await
        .with_context(|| format!("failed to write {}", subtitle_path.display()))?;

    if let Err(e) = tokio::fs::write(&output, &result.video).await {
        let _ = tokio::fs::remove_file(&subtitle_path).await;
        return Err(e).with_context(|| format!("failed to write {}", output.display()));
    }

    info!("💬 Subtitles saved as: {}", subtitle_path.display());
    println!(
        "Success! Output saved as: {} ({} bytes)",
        output.display(),
        result.video.len()
    );

    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing argument: {}", name))
}

/// Subtitle file written next to `output`. An output already named
/// `*.{extension}` gets `*.subtitles.{extension}` instead of being overwritten.
fn sidecar_path(output: &Path, extension: &str) -> PathBuf {
    let collides = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

    if collides {
        output.with_extension(format!("subtitles.{}", extension))
    } else {
        output.with_extension(extension)
    }
}

/// Error message with each cause appended once
fn report(err: &anyhow::Error) -> String {
    let mut message = err.to_string();
    for cause in err.chain().skip(1) {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    message
}
