mod config;
mod llm;
mod pr;
mod rca;
mod report;
mod store;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;

use config::Config;
use rca::RcaPipeline;
use store::{ConversationHistory, CredentialStore, JsonFileStore, KeyValueStore, Role};

/// Bitbucket RCA — turns a Bitbucket Pull Request URL into a plain-language
/// Root Cause Analysis report using Gemini.
#[derive(Parser, Debug)]
#[command(name = "bitbucket-rca", version, about)]
struct Cli {
    /// Config file (defaults to ./.bitbucket-rca.toml when present)
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an RCA report for a pull request
    Generate {
        /// Bitbucket Pull Request URL (e.g., https://bitbucket.org/ws/repo/pull-requests/42)
        pr_url: String,

        /// Optional output file path for the markdown report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that a Gemini API key works
    ValidateKey {
        api_key: String,
    },

    /// Manage stored credentials
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show or clear the conversation history
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Store the Gemini API key
    SetGeminiKey {
        api_key: String,

        /// Check the key against Gemini before saving it
        #[arg(long)]
        validate: bool,
    },

    /// Store Atlassian email and Bitbucket API token for private repositories
    SetBitbucket { email: String, token: String },

    /// Remove the stored Bitbucket credentials
    ClearBitbucket,

    /// Show the current settings with secrets masked
    Show,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("loading configuration");
    let config = Config::load(cli.config_file.as_deref())?;
    let store_path = config.store_path();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&store_path));

    match cli.command {
        Command::Generate { pr_url, output } => {
            run_generate(pr_url.trim(), output.as_deref(), &config, store).await?;
        }

        Command::ValidateKey { api_key } => {
            let pipeline = RcaPipeline::from_config(&config, store)?;
            pipeline.validate_api_key(api_key.trim()).await?;
            println!("{}", "API key is valid!".green().bold());
        }

        Command::Config(command) => {
            run_config_command(command, &config, store, &store_path).await?;
        }

        Command::History(HistoryCommand::Show) => {
            let history = ConversationHistory::load(store).await?;
            report::print_history(history.entries());
        }

        Command::History(HistoryCommand::Clear) => {
            let mut history = ConversationHistory::load(store).await?;
            history.clear().await?;
            println!("Conversation history cleared.");
        }
    }

    Ok(())
}

async fn run_generate(
    pr_url: &str,
    output: Option<&Path>,
    config: &Config,
    store: Arc<dyn KeyValueStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = RcaPipeline::from_config(config, store.clone())?;
    let mut history = ConversationHistory::load(store).await?;
    if pr::is_valid_pr_url(pr_url) {
        history.push(Role::User, pr_url, false).await?;
    }

    let span = info_span!("rca_generate", pr_url = %pr_url);
    match pipeline.run(pr_url).instrument(span).await {
        Ok(result) => {
            history
                .push(Role::Assistant, result.to_chat_message(), false)
                .await?;
            report::output(&result, output)?;
            info!("done");
            Ok(())
        }
        Err(err) => {
            let recorded = history.push(Role::Assistant, err.to_string(), true).await;
            if let Err(store_err) = recorded {
                warn!(error = %store_err, "failed to record error in history");
            }
            Err(err.into())
        }
    }
}

async fn run_config_command(
    command: ConfigCommand,
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    store_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = CredentialStore::new(store.clone());

    match command {
        ConfigCommand::SetGeminiKey { api_key, validate } => {
            let api_key = api_key.trim();
            if api_key.is_empty() {
                return Err("Please enter a Gemini API key".into());
            }
            if validate {
                RcaPipeline::from_config(config, store)?
                    .validate_api_key(api_key)
                    .await?;
            }
            credentials.save_gemini_api_key(api_key).await?;
            println!("{}", "Gemini API key saved.".green());
        }

        ConfigCommand::SetBitbucket { email, token } => {
            let (email, token) = (email.trim(), token.trim());
            if email.is_empty() || token.is_empty() {
                return Err("Please enter both Atlassian email and API token".into());
            }
            credentials.save_bitbucket_credentials(email, token).await?;
            println!("{}", "Bitbucket credentials saved.".green());
        }

        ConfigCommand::ClearBitbucket => {
            credentials.clear_bitbucket_credentials().await?;
            println!("Bitbucket credentials cleared.");
        }

        ConfigCommand::Show => {
            let creds = credentials.load().await?;
            println!("Store:           {}", store_path.display());
            println!("Bitbucket API:   {}", config.bitbucket.api_base);
            println!("Gemini endpoint: {}", config.gemini.endpoint);
            println!(
                "Gemini API key:  {}",
                describe_secret(creds.gemini_api_key.as_deref())
            );
            println!(
                "Bitbucket email: {}",
                creds.bitbucket_email.as_deref().unwrap_or("not configured")
            );
            println!(
                "Bitbucket token: {}",
                describe_secret(creds.bitbucket_token.as_deref())
            );
        }
    }

    Ok(())
}

/// Mask all but the last four characters of a secret. Short secrets are
/// fully masked.
fn describe_secret(secret: Option<&str>) -> String {
    match secret {
        None => "not configured".red().to_string(),
        Some(secret) if secret.chars().count() <= 4 => "****".to_string(),
        Some(secret) => {
            let chars: Vec<char> = secret.chars().collect();
            let visible: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("{}{}", "*".repeat(chars.len().saturating_sub(4).min(8)), visible)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_command() {
        let cli = Cli::try_parse_from([
            "bitbucket-rca",
            "generate",
            "https://bitbucket.org/ws/repo/pull-requests/1",
            "-o",
            "rca.md",
        ])
        .unwrap();
        match cli.command {
            Command::Generate { pr_url, output } => {
                assert_eq!(pr_url, "https://bitbucket.org/ws/repo/pull-requests/1");
                assert_eq!(output, Some(PathBuf::from("rca.md")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_generate_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let config = Config::default();
        let store: Arc<dyn KeyValueStore> = Arc::new(crate::store::MemoryStore::default());
        let fut = run_generate("not-a-url", None, &config, store);
        assert_send(&fut);
    }

    #[test]
    fn test_describe_secret_masks() {
        assert_eq!(describe_secret(Some("abcdef123456")), "********3456");
        assert_eq!(describe_secret(Some("abc")), "****");
        assert!(describe_secret(None).contains("not configured"));
    }
}
