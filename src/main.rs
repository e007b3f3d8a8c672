//! Personal OS command line: the tracking daemon plus the session and rule
//! management operations.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use personalos_lib::{
    db::{
        BatchClassificationRequest, ClassificationInput, ClassificationRequest, CreateRuleRequest,
        Database, ReclassifyRequest,
    },
    init_logging, open_database, run_daemon,
    segmentation::SegmentationEngine,
    settings::Settings,
};

#[derive(Parser)]
#[command(name = "personalos")]
#[command(version)]
#[command(about = "Tracks the focused window and folds it into classified activity sessions", long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sampling and processing loops until interrupted
    Run,

    /// Fold the current raw event backlog into sessions once
    Process,

    /// Unclassified time grouped by app and window title
    Unclassified,

    /// Label every unclassified session of one app/window pair
    Classify {
        #[arg(long)]
        app: String,
        #[arg(long, default_value = "")]
        title: String,
        #[command(flatten)]
        label: LabelArgs,
    },

    /// Label several app/window pairs from a JSON request ("-" reads stdin)
    ClassifyBatch { file: PathBuf },

    /// Set the classification of a single session
    Reclassify {
        #[arg(long)]
        session_id: i64,
        #[command(flatten)]
        label: LabelArgs,
    },

    /// Delete one session
    DeleteSession { session_id: i64 },

    /// List classifications
    Classifications,

    /// Manage auto-classification rules
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },

    /// Classified time since UTC midnight
    Summary,

    /// Most recently classified sessions
    Recent {
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Show effective settings
    Config {
        /// Write the effective settings back to the settings file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    List,
    Add {
        #[arg(long)]
        app: String,
        /// Substring the window title must contain (empty matches any title)
        #[arg(long, default_value = "")]
        title_contains: String,
        #[arg(long, default_value = "0")]
        priority: i64,
        #[command(flatten)]
        label: LabelArgs,
    },
    Delete { rule_id: i64 },
}

#[derive(Args)]
struct LabelArgs {
    /// Classification name; created on first use
    #[arg(long)]
    name: String,
    #[arg(long)]
    helpful: bool,
    /// Goal context such as Work, Relax or Learn
    #[arg(long, default_value = "")]
    goal: String,
}

impl From<LabelArgs> for ClassificationInput {
    fn from(args: LabelArgs) -> Self {
        ClassificationInput {
            user_defined_name: args.name,
            is_helpful: args.helpful,
            goal_context: args.goal,
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli).await {
        log::error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings_path = match cli.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&settings_path)?;

    let store = || open_database(&settings);

    match cli.command {
        Commands::Run => run_daemon(settings.clone()).await,
        Commands::Config { write } => {
            if write {
                settings.save(&settings_path)?;
            }
            print_json(&json!({
                "path": settings_path,
                "database_path": settings.database_path()?,
                "settings": settings,
            }))
        }
        Commands::Process => {
            let engine = SegmentationEngine::new(store()?, settings.segmentation());
            print_json(&engine.run_pass().await?)
        }
        Commands::Unclassified => print_json(&store()?.unclassified_activities().await?),
        Commands::Classify { app, title, label } => {
            let updated = store()?
                .apply_classification(ClassificationRequest {
                    app_name: app,
                    window_title: title,
                    classification: label.into(),
                })
                .await?;
            print_json(&json!({ "status": "success", "sessions_updated": updated }))
        }
        Commands::ClassifyBatch { file } => {
            let request: BatchClassificationRequest = read_json(&file)?;
            let updated = store()?.apply_classification_batch(request).await?;
            print_json(&json!({ "status": "success", "sessions_updated": updated }))
        }
        Commands::Reclassify { session_id, label } => {
            store()?
                .reclassify_session(ReclassifyRequest {
                    session_id,
                    classification: label.into(),
                })
                .await?;
            print_json(&json!({ "status": "success" }))
        }
        Commands::DeleteSession { session_id } => {
            store()?.delete_session(session_id).await?;
            print_json(&json!({ "status": "success" }))
        }
        Commands::Classifications => print_json(&store()?.list_classifications().await?),
        Commands::Rules { command } => run_rule_command(command, &store()?).await,
        Commands::Summary => print_json(&store()?.today_summary(Utc::now()).await?),
        Commands::Recent { limit } => {
            print_json(&store()?.recent_classified_sessions(limit).await?)
        }
    }
}

async fn run_rule_command(command: RuleCommands, db: &Database) -> Result<()> {
    match command {
        RuleCommands::List => print_json(&db.list_rules().await?),
        RuleCommands::Add {
            app,
            title_contains,
            priority,
            label,
        } => {
            let rule_id = db
                .create_rule(CreateRuleRequest {
                    app_name: app,
                    window_title_contains: title_contains,
                    priority,
                    classification: label.into(),
                })
                .await?;
            print_json(&json!({ "status": "success", "rule_id": rule_id }))
        }
        RuleCommands::Delete { rule_id } => {
            let deleted = db.delete_rule(rule_id).await?;
            print_json(&json!({ "status": "success", "deleted": deleted }))
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read request from stdin")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read request from {}", path.display()))?
    };
    serde_json::from_str(&contents).context("invalid request body")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
