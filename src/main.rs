//! gemini-relay CLI - single-shot, streaming and title generation against Gemini

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gemini_relay::{
    api::StdoutConsumer,
    config::Config,
    AnswerId, Attachment, ConversationTurn, GeminiRelay,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gemini-relay")]
#[command(about = "Relay Gemini completions, whole or streamed as Server-Sent Events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: ~/.config/gemini-relay/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the full answer and print it
    Ask {
        /// Prompt text
        prompt: String,

        /// Model to use (default from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Files to attach
        #[arg(short, long)]
        attach: Vec<PathBuf>,
    },

    /// Stream the answer to stdout as SSE events
    Stream {
        /// Prompt text
        prompt: String,

        /// Model to use (default from config)
        #[arg(short, long)]
        model: Option<String>,

        /// Files to attach
        #[arg(short, long)]
        attach: Vec<PathBuf>,

        /// Reuse an existing answer id (regeneration)
        #[arg(long)]
        answer_id: Option<String>,
    },

    /// Generate a short title for a transcript
    Title {
        /// Transcript text, or @path to read it from a file
        transcript: String,

        /// Model to use (default from config)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so streamed events on stdout stay clean
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_from(config_path.clone())?;

    match cli.command {
        Commands::Ask {
            prompt,
            model,
            attach,
        } => {
            run_ask(&config, prompt, model, attach).await?;
        }
        Commands::Stream {
            prompt,
            model,
            attach,
            answer_id,
        } => {
            run_stream(&config, prompt, model, attach, answer_id).await?;
        }
        Commands::Title { transcript, model } => {
            run_title(&config, transcript, model).await?;
        }
        Commands::Config(cmd) => {
            run_config_command(&config, config_path, cmd)?;
        }
    }

    Ok(())
}

async fn load_attachments(paths: Vec<PathBuf>) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::new();
    for path in paths {
        let data = tokio::fs::read(&path).await?;
        let mime_type = guess_mime(&path);
        attachments.push(Attachment::new(path.display().to_string(), mime_type, data));
    }
    Ok(attachments)
}

fn guess_mime(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("txt") | Some("md") | Some("csv") | Some("log") | Some("json") | Some("toml")
        | Some("yaml") | Some("yml") | Some("rs") | Some("py") | Some("go") | Some("js")
        | Some("ts") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        // Unknown files go as inline bytes, never through lossy UTF-8
        _ => "application/octet-stream",
    }
}

async fn run_ask(
    config: &Config,
    prompt: String,
    model: Option<String>,
    attach: Vec<PathBuf>,
) -> Result<()> {
    let relay = GeminiRelay::from_config(config);
    let model = model.unwrap_or_else(|| config.gemini.model.clone());
    let attachments = load_attachments(attach).await?;
    let messages = vec![ConversationTurn::user(prompt)];

    info!("Asking {} (single-shot)", model);
    let answer = relay
        .run_single_shot(&model, &messages, &attachments)
        .await
        .map_err(report)?;

    println!("{}", answer.text);
    Ok(())
}

async fn run_stream(
    config: &Config,
    prompt: String,
    model: Option<String>,
    attach: Vec<PathBuf>,
    answer_id: Option<String>,
) -> Result<()> {
    let relay = GeminiRelay::from_config(config);
    let model = model.unwrap_or_else(|| config.gemini.model.clone());
    let attachments = load_attachments(attach).await?;
    let messages = vec![ConversationTurn::user(prompt)];
    let answer_id = match answer_id {
        Some(existing) => AnswerId::for_request(&existing, true),
        None => AnswerId::generate(),
    };

    info!("Streaming {} as answer {}", model, answer_id);
    let mut consumer = StdoutConsumer::new();
    let answer = relay
        .run_streaming(&mut consumer, &model, &messages, &attachments, answer_id)
        .await
        .map_err(report)?;

    if answer.truncated {
        tracing::warn!("Stream cut off at the line cap; answer may be incomplete");
    }
    info!("Streamed {} characters", answer.text.chars().count());
    Ok(())
}

async fn run_title(config: &Config, transcript: String, model: Option<String>) -> Result<()> {
    let relay = GeminiRelay::from_config(config);
    let model = model.unwrap_or_else(|| config.gemini.model.clone());
    let transcript = match transcript.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => transcript,
    };

    let title = relay
        .generate_short_label(&model, &transcript)
        .await
        .map_err(report)?;
    println!("{}", title);
    Ok(())
}

/// Log the debug detail, surface only the user-safe message
fn report(err: gemini_relay::RelayError) -> anyhow::Error {
    if let Some(detail) = &err.debug {
        tracing::debug!(code = err.code(), "{}", detail);
    }
    anyhow::anyhow!("[{}] {}", err.code(), err)
}

fn run_config_command(config: &Config, path: PathBuf, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save_to(path.clone())?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigCommands::Show => {
            println!("{:#?}", config);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_guess_mime_known_text() {
        assert_eq!(guess_mime(Path::new("notes.md")), "text/plain");
        assert_eq!(guess_mime(Path::new("src/main.RS")), "text/plain");
    }

    #[test]
    fn test_guess_mime_unknown_is_binary() {
        assert_eq!(guess_mime(Path::new("archive.zip")), "application/octet-stream");
        assert_eq!(guess_mime(Path::new("Makefile")), "application/octet-stream");
        let blob = Attachment::new("blob.bin", guess_mime(Path::new("blob.bin")), vec![0xff, 0x00]);
        assert!(!blob.is_text());
    }
}
