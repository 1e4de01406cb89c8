use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use shopsage_core::config::Config;
use shopsage_core::credentials::{self, Credential};
use shopsage_core::provider::{GeminiProvider, OllamaProvider};
use shopsage_core::rag::LoadedCatalogue;
use shopsage_core::{PipelineResult, RagEngine};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shopsage")]
#[command(about = "Ask product questions against the catalogue", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Answer a single question")]
    Ask {
        #[arg(help = "The product question")]
        query: String,

        #[arg(short = 'k', long, help = "Number of catalogue entries to retrieve")]
        top_k: Option<usize>,

        #[arg(long, env = "SHOPSAGE_USER_API_KEY", hide_env_values = true, help = "Your own Gemini API key, tried before the default")]
        api_key: Option<String>,

        #[arg(long, help = "Print the result as JSON")]
        json: bool,
    },

    #[command(about = "Answer questions read from stdin, one per line")]
    Chat {
        #[arg(long, env = "SHOPSAGE_USER_API_KEY", hide_env_values = true, help = "Your own Gemini API key, tried before the default")]
        api_key: Option<String>,
    },

    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Load the catalogue and print its statistics")]
    Inspect,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shopsage_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { query, top_k, api_key, json } => {
            ask(&cli.config, &query, top_k, api_key, json).await
        }
        Commands::Chat { api_key } => chat(&cli.config, api_key).await,
        Commands::Show => show_config(&cli.config),
        Commands::Inspect => inspect(&cli.config).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config> {
    if config_path.exists() {
        Config::load(config_path).context("Failed to load config")
    } else {
        Ok(Config::default())
    }
}

async fn build_engine(config: &Config) -> Result<RagEngine> {
    let default_key = credentials::resolve_default_credential(&config.credentials);
    RagEngine::new(
        config,
        Arc::new(OllamaProvider::from_config(config)),
        Arc::new(GeminiProvider::from_config(config)),
        default_key,
    )
    .await
    .context("Failed to load the catalogue")
}

async fn ask(
    config_path: &Path,
    query: &str,
    top_k: Option<usize>,
    api_key: Option<String>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config).await?;

    let top_k = top_k.unwrap_or(engine.default_top_k());
    let result = engine
        .run(query, top_k, Credential::from_optional(api_key))
        .await
        .context("Failed to answer question")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render(&result);
    }
    Ok(())
}

async fn chat(config_path: &Path, api_key: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config).await?;
    let caller_key = Credential::from_optional(api_key);

    println!(
        "{} Ask me anything about beauty products ({} to leave).",
        "→".blue(),
        "exit".bold()
    );

    let stdin = std::io::stdin();
    loop {
        print!("{} ", "you>".green().bold());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == "exit" || query == "quit" {
            break;
        }

        match engine.ask(query, caller_key.clone()).await {
            Ok(result) => render(&result),
            Err(e) => eprintln!("{} {}", "✗".red().bold(), e),
        }
        println!();
    }

    Ok(())
}

fn render(result: &PipelineResult) {
    println!("{}", result.response);

    if let Some(products) = &result.retrieved_products {
        println!();
        println!("{}", "Recommended products:".bold().green());
        for p in products {
            println!("  {} {} by {}", "•".cyan(), p.name.bold(), p.brand);
            println!("    Price: ${:.2} | Rating: {}/5", p.price, p.rating);
        }
    }
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let has_default_key = credentials::resolve_default_credential(&config.credentials).is_some();

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  Temperature:     {}", config.llm.temperature);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Base URL:        {}", config.embedding.base_url);
    println!(
        "  Model:           {}",
        config.embedding.model.as_deref().unwrap_or("(from document collection)").cyan()
    );
    println!("  Dimension:       {}", config.embedding.dimension);
    println!();
    println!("{}", "Retrieval:".bold());
    println!("  Top K:           {}", config.retrieval.top_k);
    println!("  Similarity floor: {}", config.retrieval.similarity_floor);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Index:           {}", config.storage.index_path.display());
    println!("  Documents:       {}", config.storage.documents_path.display());
    println!();
    println!("{}", "Credentials:".bold());
    println!("  Secrets file:    {}", config.credentials.secrets_path.display());
    println!(
        "  Default key:     {}",
        if has_default_key {
            "configured".green()
        } else {
            "not configured".yellow()
        }
    );

    Ok(())
}

async fn inspect(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let catalogue = LoadedCatalogue::load(&config, Arc::new(OllamaProvider::from_config(&config)))
        .await
        .context("Failed to load the catalogue")?;

    println!("{}", "Catalogue:".bold().green());
    println!("  Documents:       {}", catalogue.len());
    println!("  Dimension:       {}", catalogue.dimension());
    println!("  Embedding model: {}", catalogue.embedder().model().cyan());

    Ok(())
}
