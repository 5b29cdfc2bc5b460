use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pressroom")]
#[command(
    version,
    about = "Editorial pipeline that prepares articles and drives a CMS to publish drafts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize pressroom in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Run the orchestrator: sync loop plus worker pools
    Run,

    /// Run one document-store sync round
    Sync,

    /// Operate on worklist items
    Worklist {
        #[command(subcommand)]
        action: WorklistAction,
    },

    /// Manage proofreading rulesets
    Ruleset {
        #[command(subcommand)]
        action: RulesetAction,
    },

    /// Show lane counts and AI spend
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum WorklistAction {
    /// List items, optionally filtered by status
    List {
        #[arg(long, help = "Filter by status lane")]
        status: Option<String>,
        #[arg(long, help = "Include archived items")]
        archived: bool,
    },
    /// Show one item with its article and open issues
    Show { id: i64 },
    /// Confirm the parse and start proofreading
    Confirm {
        id: i64,
        #[arg(long, default_value = "operator")]
        operator: String,
    },
    /// Re-run parsing on an item under review
    Reparse { id: i64 },
    /// Record a decision on a proofreading issue
    Decide {
        id: i64,
        #[arg(long)]
        issue: i64,
        #[arg(long, help = "accepted, rejected, or modified")]
        decision: String,
        #[arg(long, help = "Replacement text for a modified decision")]
        content: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "operator")]
        operator: String,
        #[arg(long, help = "Supersede an existing decision")]
        supersede: bool,
    },
    /// Finalize the review and write the corrected body
    Finalize {
        id: i64,
        #[arg(long, default_value = "operator")]
        operator: String,
    },
    /// Trigger publication
    Publish {
        id: i64,
        #[arg(long, help = "playwright, computer_use, or hybrid")]
        provider: Option<String>,
    },
    /// Reset a failed item to an earlier lane (note required)
    Reset {
        id: i64,
        #[arg(long, help = "Target status lane")]
        to: String,
        #[arg(long, default_value = "operator")]
        operator: String,
        #[arg(long, help = "Why the reset is safe")]
        note: String,
    },
    /// Request cancellation of the item's running job
    Cancel { id: i64 },
    /// Raise the AI cost cap for one article
    RaiseCap {
        article_id: i64,
        #[arg(long)]
        cap_usd: f64,
    },
}

#[derive(Subcommand)]
enum RulesetAction {
    /// List rulesets with status and generation
    List,
    /// Import a draft ruleset from a TOML file
    Import { path: PathBuf },
    /// Publish a draft ruleset (archives the previous active one)
    Publish {
        id: i64,
        #[arg(long, default_value = "admin")]
        publisher: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'f', long, default_value = "toml", help = "Output format: toml, json")]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    use pressroom::cli::commands;

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(force)?;
        }
        Commands::Run => {
            let rt = Runtime::new()?;
            rt.block_on(commands::run::run())?;
        }
        Commands::Sync => {
            let rt = Runtime::new()?;
            rt.block_on(commands::sync::run())?;
        }
        Commands::Worklist { action } => {
            let rt = Runtime::new()?;
            rt.block_on(async {
                match action {
                    WorklistAction::List { status, archived } => {
                        commands::worklist::list(status, archived).await
                    }
                    WorklistAction::Show { id } => commands::worklist::show(id).await,
                    WorklistAction::Confirm { id, operator } => {
                        commands::worklist::confirm(id, &operator).await
                    }
                    WorklistAction::Reparse { id } => commands::worklist::reparse(id).await,
                    WorklistAction::Decide {
                        id,
                        issue,
                        decision,
                        content,
                        notes,
                        operator,
                        supersede,
                    } => {
                        commands::worklist::decide(
                            id, issue, &decision, content, notes, &operator, supersede,
                        )
                        .await
                    }
                    WorklistAction::Finalize { id, operator } => {
                        commands::worklist::finalize(id, &operator).await
                    }
                    WorklistAction::Publish { id, provider } => {
                        commands::worklist::publish(id, provider).await
                    }
                    WorklistAction::Reset {
                        id,
                        to,
                        operator,
                        note,
                    } => commands::worklist::reset(id, &to, &operator, &note).await,
                    WorklistAction::Cancel { id } => commands::worklist::cancel(id).await,
                    WorklistAction::RaiseCap { article_id, cap_usd } => {
                        commands::worklist::raise_cap(article_id, cap_usd).await
                    }
                }
            })?;
        }
        Commands::Ruleset { action } => {
            let rt = Runtime::new()?;
            rt.block_on(async {
                match action {
                    RulesetAction::List => commands::ruleset::list().await,
                    RulesetAction::Import { path } => commands::ruleset::import(&path).await,
                    RulesetAction::Publish { id, publisher } => {
                        commands::ruleset::publish(id, &publisher).await
                    }
                }
            })?;
        }
        Commands::Status => {
            let rt = Runtime::new()?;
            rt.block_on(commands::status::run())?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                commands::config::show(format == "json")?;
            }
            ConfigAction::Path => {
                commands::config::path()?;
            }
            ConfigAction::Init { force } => {
                commands::config::init(force)?;
            }
        },
    }

    Ok(())
}
