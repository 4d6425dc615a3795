use chrono::{DateTime, Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use jiffy::{
    BlobStore, Config, FileBlobStore, NewTask, Priority, StatusFilter, Store, Task, TaskFilter, TaskManager, TaskUpdate,
};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "jiffy")]
#[command(about = "Jiffy - a small personal task tracker")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/jiffy/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the task document (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task
    Add {
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// low, medium or high (default from config)
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Due date as YYYY-MM-DD
        #[arg(long, value_parser = parse_due_date)]
        due: Option<i64>,
    },

    /// List tasks, newest first
    List {
        /// all, active or completed
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,

        #[arg(short, long)]
        priority: Option<Priority>,
    },

    /// Show one task in full
    Show { id: String },

    /// Flip a task between active and completed
    Toggle { id: String },

    /// Edit fields of a task
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<Priority>,

        /// Due date as YYYY-MM-DD
        #[arg(long, value_parser = parse_due_date, conflicts_with = "clear_due")]
        due: Option<i64>,

        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a task
    Rm { id: String },

    /// Show task counters
    Stats,

    /// Delete every task
    Clear {
        /// Confirm deleting everything
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Setup tracing
    let level = match cli.verbose {
        0 => config.log_level.parse().unwrap_or(Level::WARN),
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let blob = FileBlobStore::open(&config.data_dir)
        .context(format!("Failed to open data directory {}", config.data_dir.display()))?;
    let mut manager = TaskManager::new(Store::new(blob));

    match cli.command {
        Commands::Add {
            title,
            description,
            priority,
            due,
        } => {
            let task = manager.create_task(
                NewTask::new(title)
                    .description(description)
                    .priority(priority.unwrap_or(config.default_priority))
                    .due_date(due),
            )?;
            println!("Created {}", task.id.dimmed());
            print_task_line(&task);
        }
        Commands::List { status, priority } => {
            let mut tasks = manager.list(status);
            if let Some(priority) = priority {
                tasks = TaskFilter::new().priority(priority).apply(tasks);
            }
            if tasks.is_empty() {
                match status {
                    StatusFilter::All => println!("No tasks"),
                    _ => println!("No {} tasks", status),
                }
            }
            for task in &tasks {
                print_task_line(task);
            }
        }
        Commands::Show { id } => {
            let id = resolve_id(&manager, &id)?;
            let task = manager.get_task(&id).ok_or_else(|| eyre!("No task with id {}", id))?;
            print_task_detail(&task);
        }
        Commands::Toggle { id } => {
            let id = resolve_id(&manager, &id)?;
            if let Some(task) = manager.toggle_task_completion(&id)? {
                print_task_line(&task);
            }
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
            due,
            clear_due,
        } => {
            let id = resolve_id(&manager, &id)?;
            let update = TaskUpdate {
                title,
                description,
                completed: None,
                priority,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
            };
            if update.is_empty() {
                return Err(eyre!("Nothing to change; pass at least one field to edit"));
            }
            if let Some(task) = manager.update_task(&id, update)? {
                print_task_line(&task);
            }
        }
        Commands::Rm { id } => {
            let id = resolve_id(&manager, &id)?;
            if manager.delete_task(&id)? {
                println!("Deleted {}", id.dimmed());
            }
        }
        Commands::Stats => {
            let stats = manager.stats();
            println!("Total:     {}", stats.total);
            println!("Active:    {}", stats.active.to_string().yellow());
            println!("Completed: {}", stats.completed.to_string().green());
            if let Some(last_sync) = manager.store().last_sync() {
                println!("Last saved: {}", format_timestamp(last_sync, "%Y-%m-%d %H:%M"));
            }
        }
        Commands::Clear { yes } => {
            if !yes {
                return Err(eyre!("Refusing to delete every task without --yes"));
            }
            manager.clear_all()?;
            println!("All tasks deleted");
        }
    }

    Ok(())
}

/// Accept a full id or a unique prefix of one
fn resolve_id<B: BlobStore>(manager: &TaskManager<B>, input: &str) -> Result<String> {
    let tasks = manager.get_all_tasks();
    if tasks.iter().any(|t| t.id == input) {
        return Ok(input.to_string());
    }

    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id.starts_with(input)).collect();
    match matches.as_slice() {
        [] => Err(eyre!("No task with id {}", input)),
        [task] => Ok(task.id.clone()),
        _ => Err(eyre!("Id prefix {} matches {} tasks", input, matches.len())),
    }
}

fn parse_due_date(s: &str) -> Result<i64, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{} (expected YYYY-MM-DD)", e))?;
    date.and_hms_opt(0, 0, 0)
        .and_then(|dt| dt.and_local_timezone(Local).earliest())
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| format!("{} is not a valid local date", s))
}

fn format_timestamp(ms: i64, fmt: &str) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format(fmt).to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn colored_priority(priority: Priority) -> colored::ColoredString {
    match priority {
        Priority::High => priority.as_str().red(),
        Priority::Medium => priority.as_str().yellow(),
        Priority::Low => priority.as_str().green(),
    }
}

fn print_task_line(task: &Task) {
    let check = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let title = if task.completed {
        task.title.strikethrough().dimmed()
    } else {
        task.title.bold()
    };
    let due = task
        .due_date
        .map(|d| format!("  due {}", format_timestamp(d, "%b %-d, %Y")))
        .unwrap_or_default();

    println!(
        "{} {}  {}{}  {}",
        check,
        title,
        colored_priority(task.priority),
        due,
        task.id.dimmed()
    );
}

fn print_task_detail(task: &Task) {
    println!("{}", task.title.bold());
    if !task.description.is_empty() {
        println!("{}", task.description);
    }
    println!();
    println!("Id:       {}", task.id);
    println!(
        "Status:   {}",
        if task.completed {
            "Completed".green()
        } else {
            "Active".yellow()
        }
    );
    println!("Priority: {}", colored_priority(task.priority));
    if let Some(due) = task.due_date {
        println!("Due:      {}", format_timestamp(due, "%b %-d, %Y"));
    }
    println!("Created:  {}", format_timestamp(task.created_at, "%b %-d, %Y %H:%M"));
    println!("Updated:  {}", format_timestamp(task.updated_at, "%b %-d, %Y %H:%M"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiffy::{MemoryBlobStore, STORAGE_KEY};

    fn manager_with_ids(ids: &[&str]) -> TaskManager<MemoryBlobStore> {
        let tasks: Vec<Task> = ids
            .iter()
            .map(|id| Task {
                id: id.to_string(),
                title: format!("Task {}", id),
                description: String::new(),
                completed: false,
                created_at: 1000,
                updated_at: 1000,
                due_date: None,
                priority: Priority::Medium,
            })
            .collect();

        let mut store = Store::new(MemoryBlobStore::new());
        store.save_tasks(&tasks).unwrap();
        assert!(store.blob().get(STORAGE_KEY).unwrap().is_some());
        TaskManager::new(store)
    }

    #[test]
    fn test_resolve_id_exact_and_prefix() {
        let manager = manager_with_ids(&["abc123", "abd456", "abc"]);

        // Exact match wins even when it is also a prefix of another id
        assert_eq!(resolve_id(&manager, "abc").unwrap(), "abc");
        assert_eq!(resolve_id(&manager, "abd").unwrap(), "abd456");
        assert_eq!(resolve_id(&manager, "abc1").unwrap(), "abc123");
    }

    #[test]
    fn test_resolve_id_ambiguous_prefix() {
        let manager = manager_with_ids(&["abc123", "abd456"]);

        let err = resolve_id(&manager, "ab").unwrap_err();
        assert!(err.to_string().contains("matches 2 tasks"));
    }

    #[test]
    fn test_resolve_id_unknown() {
        let manager = manager_with_ids(&["abc123"]);

        let err = resolve_id(&manager, "zzz").unwrap_err();
        assert!(err.to_string().contains("No task with id zzz"));
    }

    #[test]
    fn test_parse_due_date() {
        let ms = parse_due_date("2026-10-20").unwrap();
        let expected = NaiveDate::from_ymd_opt(2026, 10, 20)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|dt| dt.and_local_timezone(Local).earliest())
            .map(|dt| dt.timestamp_millis())
            .unwrap();
        assert_eq!(ms, expected);
        assert_eq!(format_timestamp(ms, "%Y-%m-%d"), "2026-10-20");
    }

    #[test]
    fn test_parse_due_date_rejects_bad_input() {
        assert!(parse_due_date("20-10-2026").unwrap_err().contains("expected YYYY-MM-DD"));
        assert!(parse_due_date("2026-02-30").is_err());
        assert!(parse_due_date("").is_err());
    }
}
