//! # Forq CLI
//!
//! Command-line interface for a Forq message-queue server.
//!
//! This module provides CLI commands for:
//! - Producing messages, optionally delayed
//! - Consuming messages and acknowledging or rejecting them
//! - Showing the resolved client configuration
//!
//! Messages are written to stdout as JSON lines; logs go to stderr.

use clap::{Parser, Subcommand};
use forq_client::{
    AsyncConsumer, AsyncProducer, ClientConfig, ConfigurationError, ConsumerChannels, ErrorCode,
    HttpTransport, NewMessage, QueueError, QueuedProduction,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Capacity of each channel wired into the consumer
const CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// CLI Structure
// ============================================================================

/// Forq CLI - produce and consume queue messages
#[derive(Debug, Parser)]
#[command(name = "forq")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Produce and consume messages on a Forq queue server")]
pub struct Cli {
    /// Configuration file path (toml, yaml or json)
    #[arg(short, long, env = "FORQ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send messages to a queue
    Produce {
        /// Target queue
        #[arg(short, long)]
        queue: String,

        /// Message content; repeat to send several messages
        #[arg(short = 'm', long = "content", required = true)]
        contents: Vec<String>,

        /// Delay before the messages become visible, in milliseconds
        #[arg(short, long)]
        delay_ms: Option<u32>,
    },

    /// Receive messages from a queue and settle them
    Consume {
        /// Source queue
        #[arg(short, long)]
        queue: String,

        /// Stop after this many messages
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Reject messages instead of acknowledging them
        #[arg(long)]
        reject: bool,
    },

    /// Show the resolved configuration with secrets redacted
    Config,
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Queue(QueueError::Configuration(_)) => 1,
            Self::Queue(_) => 2,
            Self::Io(_) | Self::Serialization(_) => 3,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    execute(cli).await
}

/// Run a parsed command line
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    debug!(config = ?config, "Configuration loaded");

    match cli.command {
        Commands::Produce {
            queue,
            contents,
            delay_ms,
        } => execute_produce_command(config, queue, contents, delay_ms).await,
        Commands::Consume {
            queue,
            limit,
            reject,
        } => execute_consume_command(config, queue, limit, reject).await,
        Commands::Config => execute_config_command(&config),
    }
}

/// Initialize logging to stderr based on CLI arguments
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&cli.log_level))
        .map_err(|e| ConfigurationError::Invalid {
            message: format!("log level '{}': {}", cli.log_level, e),
        })?;

    let json_layer = cli.json_logs.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!cli.json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigurationError::Invalid {
            message: format!("logging already initialized: {}", e),
        })?;

    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_produce_command(
    config: ClientConfig,
    queue: String,
    contents: Vec<String>,
    delay_ms: Option<u32>,
) -> Result<(), CliError> {
    let transport = Arc::new(HttpTransport::new(config)?);
    let count = contents.len();

    // Sized so no failure is dropped while the producer drains
    let (production_tx, production_rx) = mpsc::channel(count);
    let (error_tx, mut error_rx) = mpsc::channel(count);

    let mut producer = AsyncProducer::new(transport, production_rx, error_tx);
    producer.start()?;

    for content in contents {
        let mut message = NewMessage::new(content);
        if let Some(delay) = delay_ms {
            message = message.with_delay(chrono::Duration::milliseconds(i64::from(delay)));
        }
        if production_tx
            .send(QueuedProduction::new(message, queue.as_str()))
            .await
            .is_err()
        {
            break;
        }
    }

    // The producer exits once the closed channel is empty
    drop(production_tx);
    producer.wait().await;

    let mut failures = Vec::new();
    while let Ok(error) = error_rx.try_recv() {
        warn!(queue = %queue, error = %error, "Message was not produced");
        failures.push(error);
    }

    info!(
        queue = %queue,
        produced = count - failures.len(),
        failed = failures.len(),
        "Produce finished"
    );

    match failures.into_iter().next() {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

async fn execute_consume_command(
    config: ClientConfig,
    queue: String,
    limit: Option<usize>,
    reject: bool,
) -> Result<(), CliError> {
    let transport = Arc::new(HttpTransport::consumer(config)?);

    let (message_tx, mut message_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (ack_tx, ack_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (nack_tx, nack_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (error_tx, mut error_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let mut consumer = AsyncConsumer::new(
        transport,
        queue.as_str(),
        ConsumerChannels::new(message_tx, ack_rx, nack_rx, error_tx),
    )?;
    consumer.start()?;

    let settle = if reject { &nack_tx } else { &ack_tx };
    let mut handled = 0usize;
    let mut outcome = Ok(());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    while limit.map_or(true, |limit| handled < limit) {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!(queue = %queue, "Interrupted, shutting down");
                break;
            }
            message = message_rx.recv() => {
                let Some(message) = message else {
                    break;
                };
                print_json_line(&message)?;
                handled += 1;
                if settle.send(message.id).await.is_err() {
                    break;
                }
            }
            error = error_rx.recv() => {
                let Some(error) = error else {
                    break;
                };
                if error.code() == Some(&ErrorCode::Unauthorized) {
                    outcome = Err(error.into());
                    break;
                }
                warn!(queue = %queue, error = %error, "Queue operation failed");
            }
        }
    }

    consumer.close().await;

    while let Ok(error) = error_rx.try_recv() {
        warn!(queue = %queue, error = %error, "Queue operation failed during shutdown");
    }

    info!(queue = %queue, handled, rejected = reject, "Consume finished");
    outcome
}

fn execute_config_command(config: &ClientConfig) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &config.redacted())?;
    writeln!(stdout)?;
    Ok(())
}

fn print_json_line<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
