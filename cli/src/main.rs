mod render;

use anyhow::Context;
use clap::{Parser, Subcommand};
use todo_sync::{ClientConfig, ConfigError, SyncError, TodoId, TodoListController};
use tracing::Level;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Keep a todo list in sync with a remote collection", long_about = None)]
struct Cli {
    /// URL of the todo collection root [default: $TODO_API_BASE_URL, then
    /// http://localhost:8080/api/v1/todos]
    #[arg(long)]
    base_url: Option<String>,

    /// Log requests and state transitions to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show the list (default)
    List,
    /// Add a todo
    Add { title: String },
    /// Flip a todo between open and done
    Toggle { id: String },
    /// Give a todo a new title
    Rename { id: String, title: String },
    /// Delete a todo
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = resolve_config(cli.base_url).context("invalid base URL")?;
    let controller = TodoListController::connect(&config);

    let loaded = controller.activate().await;
    let outcome = match (loaded, cli.command.unwrap_or(Command::List)) {
        (Err(err), _) => Err(err),
        (Ok(()), command) => run(&controller, command).await,
    };

    print!("{}", render::render(&controller.view()));

    outcome?;
    Ok(())
}

/// `--base-url` wins over the environment.
fn resolve_config(base_url: Option<String>) -> Result<ClientConfig, ConfigError> {
    match base_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    }
}

async fn run<T: todo_sync::Transport>(controller: &TodoListController<T>, command: Command) -> Result<(), SyncError> {
    match command {
        Command::List => Ok(()),
        Command::Add { title } => {
            controller.set_draft(title);
            controller.submit_draft().await.map(drop)
        }
        Command::Toggle { id } => controller.toggle(&TodoId::from(id)).await.map(drop),
        Command::Rename { id, title } => {
            let id = TodoId::from(id);
            controller.start_edit(&id)?;
            controller.set_edit_draft(title);
            controller.save_edit(&id).await.map(drop)
        }
        Command::Delete { id } => controller.delete(&TodoId::from(id)).await,
    }
}
