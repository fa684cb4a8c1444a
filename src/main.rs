//! Chat Moderator CLI - command-line interface for the moderation assistant
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to moderator operations
//! - Handles external concerns like stdin, process exit codes and terminal output
//! - Keeps the interactive loop itself in the library

use anyhow::{Context, Result};
use chat_moderator::config::DEFAULT_CONFIG_FILES;
use chat_moderator::{
    Correction, EmbeddingCache, FeedbackSession, ModerationConfig, Moderator, OutputFormat,
    ReportFormatter, ReportOptions,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process;

/// Chat Moderator - learn and detect rule violations in chat messages
#[derive(Parser)]
#[command(name = "chat-moderator")]
#[command(version = "0.1.0")]
#[command(about = "Interactive moderation assistant that learns rule violations from feedback")]
#[command(long_about = "Chat Moderator compares messages against labeled violation examples by sentence similarity, expands toxic abbreviations, and learns from moderator feedback. Runs the interactive chat loop when no subcommand is given.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive moderation chat
    Chat,

    /// Screen one message without asking for feedback
    Check {
        /// Message to screen
        text: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Teach the moderator about one message
    Learn {
        /// Message to learn
        text: String,

        /// Violation level 1-5, or 0 for "not a violation"
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=5))]
        level: u8,
    },

    /// List the stored violation examples
    Examples {
        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },

    /// Embedding cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache statistics
    Stats,

    /// Clear the cache
    Clear,
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    match run_command(cli) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn run_command(cli: Cli) -> Result<i32> {
    let use_colors = !cli.no_color;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::ValidateConfig { config_file } => run_validate_config(config_file.or(cli.config)),
        Commands::Chat => run_chat(load_config(cli.config)?, use_colors),
        Commands::Check { text, format } => {
            run_check(load_config(cli.config)?, &text, format, use_colors)
        }
        Commands::Learn { text, level } => run_learn(load_config(cli.config)?, &text, level),
        Commands::Examples { format } => run_examples(load_config(cli.config)?, format, use_colors),
        Commands::Cache { action } => run_cache_command(load_config(cli.config)?, action),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ModerationConfig> {
    match path {
        Some(path) => ModerationConfig::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => ModerationConfig::discover().context("Failed to load configuration"),
    }
}

fn open_moderator(config: ModerationConfig) -> Result<Moderator> {
    Moderator::open(config).context("Failed to open moderation stores")
}

fn formatter(use_colors: bool) -> ReportFormatter {
    ReportFormatter::new(ReportOptions { use_colors, ..ReportOptions::default() })
}

fn run_chat(config: ModerationConfig, use_colors: bool) -> Result<i32> {
    println!("Loading moderation model...");
    let mut moderator = open_moderator(config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = FeedbackSession::new(&mut moderator, stdin.lock(), stdout.lock())
        .with_formatter(formatter(use_colors))
        .run()
        .context("Moderation session failed")?;

    println!("{}", summary.format_display());
    Ok(0)
}

fn run_check(
    config: ModerationConfig,
    text: &str,
    format: OutputFormatArg,
    use_colors: bool,
) -> Result<i32> {
    let moderator = open_moderator(config)?;
    let screening = moderator.screen(text.trim())?;

    print!("{}", formatter(use_colors).format_screening(&screening, format.into())?);

    Ok(if screening.is_violation() { 1 } else { 0 })
}

fn run_learn(config: ModerationConfig, text: &str, level: u8) -> Result<i32> {
    let correction = Correction::parse(&level.to_string())?;
    let mut moderator = open_moderator(config)?;
    let expanded = moderator.matcher().expand(text.trim());

    if moderator.apply_correction(&expanded, correction)? {
        match correction {
            Correction::Violation(severity) => {
                println!("✅ Learned violation [{}]: {}", severity, expanded)
            }
            Correction::NotViolation => println!("✅ Learned non-violation: {}", expanded),
        }
    } else {
        println!("ℹ️  Already marked as acceptable: {}", expanded);
    }
    Ok(0)
}

fn run_examples(config: ModerationConfig, format: OutputFormatArg, use_colors: bool) -> Result<i32> {
    let moderator = open_moderator(config)?;
    let examples = moderator.examples().examples();

    print!("{}", formatter(use_colors).format_examples(examples, format.into())?);
    Ok(0)
}

fn run_validate_config(config_path: Option<PathBuf>) -> Result<i32> {
    let config_path = config_path
        .or_else(|| DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.exists()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));

    println!("Validating configuration: {}", config_path.display());

    match ModerationConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("✅ Configuration is valid");

            println!("📊 Configuration summary:");
            println!(
                "  Detection: similarity >= {}, abbreviation score >= {}",
                config.detection.similarity_threshold, config.detection.fuzzy_threshold
            );
            println!("  Embedder: {:?} ({} dimensions)", config.embedder.kind, config.embedder.dimensions);
            println!("  Examples: {}", config.storage.examples.display());
            println!("  Non-violations: {}", config.storage.non_violations.display());
            println!("  Abbreviations: {}", config.storage.abbreviations.display());
            println!("  Exit keyword: {}", config.session.exit_keyword);
            println!("  Fingerprint: {}", config.fingerprint());

            Ok(0)
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {}", e);
            Ok(1)
        }
    }
}

fn run_cache_command(config: ModerationConfig, action: CacheCommands) -> Result<i32> {
    let Some(cache_path) = config.storage.embedding_cache else {
        println!("Embedding cache is disabled in the configuration");
        return Ok(1);
    };

    match action {
        CacheCommands::Stats => {
            if !cache_path.exists() {
                println!("No cache file found at {}", cache_path.display());
                return Ok(1);
            }

            let mut cache = EmbeddingCache::new(&cache_path);
            cache.load()?;

            let stats = cache.statistics();
            println!("📊 Cache Statistics");
            println!("   File: {}", cache_path.display());
            println!("   {}", stats.format_display());
            println!("   Created: {}", format_timestamp(stats.created_at));
            println!("   Updated: {}", format_timestamp(stats.updated_at));

            Ok(0)
        }
        CacheCommands::Clear => {
            EmbeddingCache::new(&cache_path).clear()?;

            println!("✅ Cache cleared: {}", cache_path.display());
            Ok(0)
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn format_timestamp(timestamp: u64) -> String {
    use chrono::{TimeZone, Utc};

    let dt = Utc.timestamp_opt(timestamp as i64, 0).single().unwrap_or_else(Utc::now);

    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
