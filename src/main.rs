//! flag-translator 命令行入口

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use flag_translator::detection::{diagnose, find_all_flags};
use flag_translator::env::{core::LogLevel, core::NoColor, generate_env_docs, EnvVar};
use flag_translator::flags::flag_languages;
use flag_translator::translation::config::{JsonFileStore, MemoryStore, SettingsStore};
use flag_translator::translation::{
    ConfigManager, ReactionOutcome, ServiceKind, Settings, TranslationClient, TranslatorConfig,
};
use flag_translator::{html_to_page, serialize_page, FlagTranslator};

/// 国旗回应翻译器
#[derive(Parser)]
#[command(name = "flag-translator")]
#[command(about = "Translate chat messages that received a flag emoji reaction")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log detection details
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the flag to language table
    Flags,

    /// Translate text through the endpoint chain
    Translate {
        /// Target language code
        #[arg(long)]
        to: String,

        /// Preferred service: libretranslate or deepl
        #[arg(long, default_value = "libretranslate")]
        service: ServiceKind,

        /// DeepL API key
        #[arg(long)]
        api_key: Option<String>,

        /// Text to translate
        text: String,
    },

    /// Translate every flag reaction in a saved chat page
    Scan {
        /// Saved HTML page
        page: PathBuf,

        /// JSON settings store
        #[arg(long)]
        store: Option<PathBuf>,

        /// Page charset
        #[arg(long, default_value = "utf-8")]
        charset: String,

        /// Write the resulting page here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List flag elements in a saved page and explain how each is handled
    Inspect {
        /// Saved HTML page
        page: PathBuf,

        /// Page charset
        #[arg(long, default_value = "utf-8")]
        charset: String,
    },

    /// Print the environment variable reference
    EnvDocs,

    /// Write an example configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = "flag-translator.toml")]
        path: PathBuf,
    },
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        LogLevel::get()
            .unwrap_or_else(|e| {
                eprintln!("{}", e);
                "info".to_string()
            })
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(!NoColor::get_or_default(false))
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<TranslatorConfig, Box<dyn std::error::Error>> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

fn print_flags() -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    for (flag, language) in flag_languages() {
        writeln!(stdout, "{}  {}", flag, language)?;
    }
    Ok(())
}

fn inspect(page: &Path, charset: &str) -> Result<(), Box<dyn std::error::Error>> {
    let page = html_to_page(&fs::read(page)?, charset);
    let elements = find_all_flags(&page);
    let mut stdout = io::stdout().lock();

    writeln!(stdout, "{} flag element(s)", elements.len())?;
    for element in elements {
        let diagnosis = diagnose(&page, &element.node);
        writeln!(stdout, "\n{} {}", element.description, element.flags.join(" "))?;
        writeln!(stdout, "  reaction:  {}", diagnosis.is_reaction)?;
        writeln!(
            stdout,
            "  flag:      {}",
            match (diagnosis.flag, diagnosis.language) {
                (Some(flag), Some(language)) => format!("{} → {}", flag, language),
                (Some(flag), None) => format!("{} → (unknown)", flag),
                _ => "-".to_string(),
            }
        )?;
        match &diagnosis.container {
            Some((_, strategy)) => writeln!(stdout, "  container: {}", strategy)?,
            None => writeln!(stdout, "  container: -")?,
        }
        if let Some(id) = &diagnosis.message_id {
            writeln!(stdout, "  message:   {}", id)?;
        }
        if let Some(text) = &diagnosis.message_text {
            writeln!(stdout, "  text:      {:?}", text)?;
        }
    }

    Ok(())
}

async fn scan<S: SettingsStore>(
    page: &Path,
    store: S,
    config: TranslatorConfig,
    charset: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let page = html_to_page(&fs::read(page)?, charset);
    let mut translator = FlagTranslator::new(page, store, config);

    let outcomes = translator.init().await;
    let translated = outcomes
        .iter()
        .filter(|outcome| {
            matches!(
                outcome,
                ReactionOutcome::Translated | ReactionOutcome::Cached | ReactionOutcome::AlreadyShown
            )
        })
        .count();
    let cache = translator.service().cache().get_stats();
    tracing::info!(
        "处理了 {} 个回应，{} 个已翻译，缓存命中率 {:.0}%",
        outcomes.len(),
        translated,
        cache.hit_rate() * 100.0
    );

    let page = translator.into_host();
    let data = serialize_page(&page, charset);
    match output {
        Some(path) => fs::write(path, data)?,
        None => io::stdout().lock().write_all(&data)?,
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Flags => print_flags()?,
        Commands::EnvDocs => print!("{}", generate_env_docs()),
        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(&path)?;
            println!("Wrote {}", path.display());
        }
        Commands::Inspect { page, charset } => inspect(&page, &charset)?,
        Commands::Translate {
            to,
            service,
            api_key,
            text,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let settings = Settings {
                translation_service: service,
                ..Settings::default()
            };
            let client = TranslationClient::from_config(&settings, &config, api_key.as_deref())?;
            println!("{}", client.translate(&text, &to).await?);
        }
        Commands::Scan {
            page,
            store,
            charset,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            match store {
                Some(path) => {
                    scan(&page, JsonFileStore::new(path), config, &charset, output.as_deref())
                        .await?
                }
                None => scan(&page, MemoryStore::new(), config, &charset, output.as_deref()).await?,
            }
        }
    }

    Ok(())
}
