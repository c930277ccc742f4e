use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::{protocol::CreateTodoRequest, validation::normalize_create};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "TODO_DATABASE_URL", default_value = "sqlite://./data/todos.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert todos with the given titles, appended in argument order.
    Seed {
        #[arg(required = true)]
        titles: Vec<String>,
    },
    /// Print the stored collection as JSON.
    Dump,
    /// Renumber every todo to 0..n in its current order.
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Seed { titles } => {
            for title in titles {
                let request = normalize_create(&CreateTodoRequest {
                    title,
                    ..CreateTodoRequest::default()
                })?;
                let id = storage.create_todo(&request).await?;
                println!("created todo_id={id}");
            }
        }
        Command::Dump => {
            let todos = storage.list_todos().await?;
            println!("{}", serde_json::to_string_pretty(&todos)?);
        }
        Command::Compact => {
            let count = storage.compact_order().await?;
            info!(count, "compacted todo order");
            println!("renumbered {count} todos");
        }
    }

    Ok(())
}
