use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use client_core::{HttpTodoStore, RemoteStore, ReorderScope, StoreEvent, TodoController};
use shared::{
    domain::{TodoFilter, TodoId, TodoRecord},
    protocol::{CreateTodoRequest, UpdateTodoRequest},
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Ordered todo list client")]
struct Cli {
    #[arg(long, env = "TODO_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct ViewArgs {
    /// all, active or completed
    #[arg(long, default_value_t = TodoFilter::All)]
    filter: TodoFilter,
    #[arg(long, default_value = "")]
    search: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    List {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long)]
        json: bool,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date as epoch milliseconds.
        #[arg(long)]
        due: Option<i64>,
    },
    Edit {
        id: TodoId,
        #[arg(long)]
        title: Option<String>,
        /// An empty value clears the description.
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<i64>,
        #[arg(long)]
        clear_due: bool,
    },
    Toggle {
        id: TodoId,
    },
    Delete {
        id: TodoId,
    },
    /// Drag `id` to `index` within the filtered view and commit.
    Move {
        id: TodoId,
        index: usize,
        #[command(flatten)]
        view: ViewArgs,
        /// Renumber the whole collection instead of only the visible todos.
        #[arg(long)]
        full_collection: bool,
    },
    /// Send an explicit order; listed todos get order = position.
    Reorder {
        #[arg(required = true)]
        ids: Vec<TodoId>,
    },
    /// Print the view every time the server pushes a snapshot.
    Watch {
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let store = HttpTodoStore::new(cli.server_url)?;

    match cli.command {
        Command::List { view, json } => {
            let mut controller = TodoController::new(store);
            apply_view(&mut controller, &view);
            controller.refresh().await?;
            let todos = controller.view();
            if json {
                println!("{}", serde_json::to_string_pretty(&todos)?);
            } else {
                print_todos(&todos);
            }
        }
        Command::Add {
            title,
            description,
            due,
        } => {
            let mut controller = TodoController::new(store);
            let id = controller
                .add(&CreateTodoRequest {
                    title,
                    description,
                    due_date: due,
                    order: None,
                })
                .await?;
            println!("created todo_id={id}");
        }
        Command::Edit {
            id,
            title,
            description,
            due,
            clear_due,
        } => {
            let mut controller = TodoController::new(store);
            let patch = UpdateTodoRequest {
                title,
                description,
                due_date: due,
                completed: None,
                clear_description: false,
                clear_due_date: clear_due,
            };
            if patch.is_empty() {
                let current = controller.get(id).await?;
                println!("nothing to change for todo {id}");
                println!("{}", render_line(&current));
                return Ok(());
            }
            controller.edit(id, &patch).await?;
            println!("updated todo_id={id}");
        }
        Command::Toggle { id } => {
            let mut controller = TodoController::new(store);
            controller.toggle(id).await?;
            println!("toggled todo_id={id}");
        }
        Command::Delete { id } => {
            let mut controller = TodoController::new(store);
            controller.delete(id).await?;
            println!("deleted todo_id={id}");
        }
        Command::Move {
            id,
            index,
            view,
            full_collection,
        } => {
            let scope = if full_collection {
                ReorderScope::FullCollection
            } else {
                ReorderScope::VisibleOnly
            };
            let mut controller = TodoController::new(store).with_scope(scope);
            apply_view(&mut controller, &view);
            controller.refresh().await?;
            controller.move_item(id, index).await?;
            print_todos(&controller.view());
        }
        Command::Reorder { ids } => {
            let sent = store.reorder(&ids).await?;
            println!("reordered {} todos", sent.len());
        }
        Command::Watch { view } => {
            let mut events = store.subscribe().await?;
            let mut controller = TodoController::new(store);
            apply_view(&mut controller, &view);
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Snapshot(todos)) => {
                        controller.apply_snapshot(todos);
                        println!("--");
                        print_todos(&controller.view());
                    }
                    Ok(StoreEvent::Error(message)) => warn!(%message, "server reported an error"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "watch fell behind"),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

fn apply_view(controller: &mut TodoController<HttpTodoStore>, view: &ViewArgs) {
    controller.set_filter(view.filter);
    controller.set_search_query(view.search.clone());
}

fn print_todos(todos: &[TodoRecord]) {
    if todos.is_empty() {
        println!("(no todos)");
        return;
    }
    for todo in todos {
        println!("{}", render_line(todo));
    }
}

fn render_line(todo: &TodoRecord) -> String {
    let mark = if todo.completed { 'x' } else { ' ' };
    let mut line = format!("[{mark}] #{} {}", todo.id, todo.title);
    if let Some(description) = &todo.description {
        line.push_str(&format!(" - {description}"));
    }
    if let Some(due) = todo.due_date {
        line.push_str(&format!(" (due {due})"));
    }
    line
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
