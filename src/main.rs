use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

mod domain;
mod application;
mod infrastructure;

use application::errors::ConfigError;
use application::messaging::{Collaborators, Dispatcher, DispatcherSettings, EventSink};
use application::services::{LinkPolicy, SessionPolicy, StatusReporter, TokenValidator};
use infrastructure::adapters::discord::{self, DiscordGateway, RestIdentityLookup, SessionHandles, SongbirdTransport};
use infrastructure::config::Config;
use infrastructure::http;

#[derive(Parser)]
#[command(name = "voice-greeter")]
#[command(about = "Discord voice bot that greets members joining a channel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config and DISCORD_BOT_TOKEN)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and the status server (default)
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
    /// Check the bot token against the Discord API and exit
    CheckToken,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => match load_config(&cli.config, cli.token) {
            Ok(config) => run_bot(config),
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Version => {
            println!("voice-greeter v{}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Commands::InitConfig => init_config(),
        Commands::CheckToken => match load_config(&cli.config, cli.token) {
            Ok(config) => check_token(config),
            Err(e) => {
                tracing::error!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}

/// File (if present) then environment then command line
fn load_config(config_path: &str, token_override: Option<String>) -> Result<Config, ConfigError> {
    let mut config = if Path::new(config_path).exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(token) = token_override {
        config.discord.token = Some(token);
    }
    Ok(config)
}

fn run_bot(config: Config) -> ExitCode {
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(serve(config))
}

async fn serve(config: Config) -> ExitCode {
    let addr = match config.socket_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting {}", config.bot.name);
    tracing::info!(
        "Token: {}, voice channel: {}, token check: {}",
        if config.discord.token.is_some() { "(set)" } else { "(missing)" },
        config.discord.voice_channel_id,
        config.discord.token_check
    );
    match discord::probe(&config.audio.welcome_sound).await {
        Ok(clip) => tracing::info!("Welcome sound: {}", clip),
        Err(e) => tracing::warn!("Welcome sound is not playable yet: {}", e),
    }

    let reporter = StatusReporter::new();
    let (sink, events) = EventSink::channel();
    let handles = SessionHandles::new();

    let deps = Collaborators {
        gateway: Arc::new(DiscordGateway::new(sink.clone(), handles.clone())),
        transport: Arc::new(SongbirdTransport::new(sink.clone(), handles)),
        validator: TokenValidator::new(Arc::new(RestIdentityLookup::new()), config.validate_timeout()),
    };
    let dispatcher = Dispatcher::new(dispatcher_settings(&config), deps, reporter.clone(), sink, events);
    let app = http::router(reporter, &config.bot.name);

    tokio::select! {
        _ = dispatcher.run() => {
            tracing::warn!("Dispatcher exited");
        }
        result = http::serve(addr, app) => {
            if let Err(e) = result {
                tracing::error!("Status server failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    ExitCode::SUCCESS
}

fn dispatcher_settings(config: &Config) -> DispatcherSettings {
    DispatcherSettings {
        credential: config.discord.token.clone(),
        channel_id: config.discord.voice_channel_id,
        presence: config.bot.presence.clone(),
        welcome_sound: config.audio.welcome_sound.clone(),
        session: SessionPolicy {
            max_attempts: config.session.max_attempts,
            backoff_base: config.backoff_base(),
            token_check: config.discord.token_check,
        },
        link: LinkPolicy {
            resume_timeout: config.resume_timeout(),
            rejoin_delay: config.rejoin_delay(),
        },
        playback_retry: config.playback_retry(),
    }
}

fn check_token(config: Config) -> ExitCode {
    let Some(token) = config.discord.token.clone() else {
        eprintln!("DISCORD_BOT_TOKEN is not set");
        return ExitCode::FAILURE;
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let validator = TokenValidator::new(Arc::new(RestIdentityLookup::new()), config.validate_timeout());
    match rt.block_on(validator.validate(&token)) {
        Ok(identity) => {
            println!("Token OK: {}", identity);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_config() -> ExitCode {
    match serde_yaml::to_string(&Config::default()) {
        Ok(yaml) => {
            println!("{}", yaml);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Failed to render config: {}", e);
            ExitCode::FAILURE
        }
    }
}
