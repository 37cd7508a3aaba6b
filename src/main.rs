//! hv - administrative tooling for the hv doujin library.

mod error;

use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::StreamExt;
use hv_config::{Config, PasswordConfig};
use hv_library::ImportEvent;
use hv_store::{Database, DoujinRepository, PasswordParams, UserRepository};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{ErrorKind, Result};

const DEFAULT_LOG_FILTER: &str = "hv=info,hv_store=info,hv_library=info,hv_config=info";

/// Administrative tooling for the hv doujin library.
#[derive(Parser, Debug)]
#[command(name = "hv", version)]
struct Cli {
    /// Config file to use instead of searching for config.json.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the format of the metadata.json file used for imports.
    MetaFormat,
    /// Manage the library database.
    Manage {
        #[command(subcommand)]
        command: Manage,
    },
}

#[derive(Subcommand, Debug)]
enum Manage {
    /// Import a doujin from a folder holding a metadata.json file and one
    /// image per page, named from 1.
    ImportDoujin { folder: PathBuf },
    /// Import every sub-folder of a folder as a doujin.
    ImportDoujinsFrom { folder: PathBuf },
    /// Register a new user.
    RegisterUser { username: String, password: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manage = match cli.command {
        Command::MetaFormat => {
            print!("{}", hv_library::META_FORMAT);
            return Ok(());
        },
        Command::Manage { command } => command,
    };

    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let db = Database::connect(&config.database_path)
        .await
        .or_raise(|| ErrorKind::Database(config.database_path.clone()))?
        .with_password_params(password_params(config.password));

    let result = match manage {
        Manage::ImportDoujin { folder } => import_doujin(&db, &folder).await,
        Manage::ImportDoujinsFrom { folder } => import_doujins_from(&db, &folder).await,
        Manage::RegisterUser { username, password } => register_user(&db, &username, &password).await,
    };
    db.close().await;
    result
}

fn password_params(config: PasswordConfig) -> PasswordParams {
    PasswordParams { iterations: config.iterations, memory_kib: config.memory_kib, parallelism: config.parallelism }
}

async fn import_doujin(db: &Database, folder: &Path) -> Result<()> {
    let repo = DoujinRepository::from(db);
    let id = hv_library::import_folder(&repo, folder).await.or_raise(|| ErrorKind::Import(folder.to_path_buf()))?;
    tracing::info!(id, folder = %folder.display(), "doujin imported");
    Ok(())
}

async fn import_doujins_from(db: &Database, root: &Path) -> Result<()> {
    let repo = DoujinRepository::from(db);
    let mut events = std::pin::pin!(hv_library::import_all(&repo, root));
    while let Some(event) = events.next().await {
        match event.or_raise(|| ErrorKind::Import(root.to_path_buf()))? {
            ImportEvent::Started => tracing::info!(root = %root.display(), "importing doujins"),
            ImportEvent::Imported { folder, id } => tracing::info!(id, folder = %folder.display(), "doujin imported"),
            ImportEvent::Complete(count) => tracing::info!(count, "import complete"),
        }
    }
    Ok(())
}

async fn register_user(db: &Database, username: &str, password: &str) -> Result<()> {
    UserRepository::from(db)
        .register(username, password)
        .await
        .or_raise(|| ErrorKind::Register(username.to_string()))
}
