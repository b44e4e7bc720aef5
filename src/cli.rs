use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Theme;
use crate::logging::init_logging;
use crate::models::{Priority, Task, TaskId, TaskRecord};
use crate::storage::Storage;
use crate::store::TaskStore;

const APP_DIR: &str = "todo-desk";

#[derive(Parser, Debug)]
#[command(
    name = "todo-desk",
    about = "Prioritized, categorized todo list kept in a JSON file",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Directory holding tasks.json, config.json and the log files.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Defaults to `list` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show tasks, optionally filtered.
    List {
        #[arg(long, short)]
        priority: Option<Priority>,
        #[arg(long, short)]
        category: Option<String>,
    },
    /// Add a task. Priority defaults to the last one used.
    Add {
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long, short)]
        priority: Option<Priority>,
        #[arg(long, short)]
        category: Option<String>,
    },
    /// Mark the task at POSITION as done.
    Done { position: usize },
    /// Mark the task at POSITION as not done.
    Undo { position: usize },
    /// Change text, priority or category of the task at POSITION.
    Edit {
        position: usize,
        #[arg(long, short)]
        text: Option<String>,
        #[arg(long, short)]
        priority: Option<Priority>,
        #[arg(long, short)]
        category: Option<String>,
    },
    /// Delete the task at POSITION.
    #[command(alias = "remove")]
    Rm { position: usize },
    /// Delete every task.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Show counts by state, priority and category.
    Stats,
    /// Write all tasks to a JSON file.
    Export { path: PathBuf },
    /// Append the tasks from a JSON file.
    Import { path: PathBuf },
    /// Set the theme, or toggle it when no value is given.
    Theme { theme: Option<Theme> },
    /// Print the current configuration.
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    let _logger = match init_logging(&data_dir) {
        Ok(handle) => Some(handle),
        Err(error) => {
            eprintln!("warning: file logging disabled: {error}");
            None
        }
    };

    let command = cli.command.unwrap_or(Command::List {
        priority: None,
        category: None,
    });
    let mut stdout = io::stdout().lock();
    match execute(command, &data_dir, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| dirs::data_dir().map(|dir| dir.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Runs one command against the data in `data_dir`: one store or config
/// operation, then a render of the resulting state.
pub fn execute(command: Command, data_dir: &Path, out: &mut impl Write) -> Result<()> {
    let storage = Storage::new(data_dir);
    let mut config = storage.load_config();
    let mut store = TaskStore::new(storage.clone());
    store.add_listener(|payload| {
        log::debug!(
            "store changed event={:?} total={}",
            payload.event,
            payload.tasks.len()
        );
    });
    // Refuse to go on with a corrupt file: the next write would replace it.
    store.load().with_context(|| {
        format!(
            "could not read task list {}",
            storage.tasks_path().display()
        )
    })?;

    match command {
        Command::List { priority, category } => {
            let shown = store.filter(priority, category.as_deref());
            render_list(out, &store, &shown)?;
        }
        Command::Add {
            text,
            priority,
            category,
        } => {
            let priority = priority.unwrap_or(config.last_priority);
            let record = TaskRecord::new(&text.join(" "), priority, category.as_deref().unwrap_or(""));
            let id = store.add(record)?;
            config.remember_priority(priority);
            if let Err(error) = storage.save_config(&config) {
                log::warn!("could not remember priority error={error}");
            }
            if let Some(task) = store.get(id) {
                writeln!(out, "Added {}", render_task(store.len(), task))?;
            }
        }
        Command::Done { position } => {
            let id = resolve(&store, position)?;
            store.set_completed(id, true)?;
            writeln!(out, "Done {}", render_at(&store, position))?;
        }
        Command::Undo { position } => {
            let id = resolve(&store, position)?;
            store.set_completed(id, false)?;
            writeln!(out, "Reopened {}", render_at(&store, position))?;
        }
        Command::Edit {
            position,
            text,
            priority,
            category,
        } => {
            let id = resolve(&store, position)?;
            let current = store
                .get(id)
                .map(|task| task.record.clone())
                .context("task vanished")?;
            let text = text.unwrap_or_else(|| current.text().to_string());
            let priority = priority.unwrap_or(current.priority());
            let category = category.unwrap_or_else(|| current.category().to_string());
            store.update(id, &text, priority, &category)?;
            writeln!(out, "Updated {}", render_at(&store, position))?;
        }
        Command::Rm { position } => {
            let id = resolve(&store, position)?;
            let label = render_at(&store, position);
            store.remove(id)?;
            writeln!(out, "Removed {label}")?;
        }
        Command::Clear { yes } => {
            if store.is_empty() {
                writeln!(out, "No tasks to delete.")?;
                return Ok(());
            }
            if !yes {
                bail!("refusing to delete {} tasks without --yes", store.len());
            }
            let removed = store.clear()?;
            writeln!(out, "Removed {removed} tasks")?;
        }
        Command::Stats => render_stats(out, &store)?,
        Command::Export { path } => {
            let written = store.export(&path)?;
            writeln!(
                out,
                "Exported {} tasks to {}",
                store.len(),
                written.display()
            )?;
        }
        Command::Import { path } => {
            let ids = store
                .import(&path)
                .with_context(|| format!("failed to import {}", path.display()))?;
            writeln!(out, "Imported {} tasks from {}", ids.len(), path.display())?;
        }
        Command::Theme { theme } => {
            match theme {
                Some(theme) => config.theme = theme,
                None => {
                    config.toggle_theme();
                }
            }
            storage.save_config(&config)?;
            writeln!(out, "Theme: {}", config.theme)?;
        }
        Command::Config => {
            writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
        }
    }
    Ok(())
}

fn resolve(store: &TaskStore, position: usize) -> Result<TaskId> {
    match position.checked_sub(1).and_then(|index| store.tasks().get(index)) {
        Some(task) => Ok(task.id),
        None => bail!(
            "no task at position {position} (there are {})",
            store.len()
        ),
    }
}

fn position_of(store: &TaskStore, id: TaskId) -> usize {
    store
        .tasks()
        .iter()
        .position(|task| task.id == id)
        .map(|index| index + 1)
        .unwrap_or(0)
}

fn render_task(position: usize, task: &Task) -> String {
    let mark = if task.record.completed() { "x" } else { " " };
    format!(
        "{position}. [{mark}] {} [{}] - {}",
        task.record.text(),
        task.record.priority(),
        task.record.category()
    )
}

fn render_at(store: &TaskStore, position: usize) -> String {
    match store.tasks().get(position.saturating_sub(1)) {
        Some(task) => render_task(position, task),
        None => format!("{position}."),
    }
}

fn render_list(out: &mut impl Write, store: &TaskStore, shown: &[&Task]) -> io::Result<()> {
    if store.is_empty() {
        writeln!(out, "No tasks yet. Add one with `todo-desk add <text>`.")?;
        return Ok(());
    }
    for task in shown {
        writeln!(out, "{}", render_task(position_of(store, task.id), task))?;
    }
    let stats = store.statistics();
    writeln!(
        out,
        "Total Tasks: {} | Completed: {} | Incomplete: {}",
        stats.total, stats.completed, stats.incomplete
    )
}

fn render_stats(out: &mut impl Write, store: &TaskStore) -> io::Result<()> {
    let stats = store.statistics();
    writeln!(out, "Total Tasks: {}", stats.total)?;
    writeln!(out, "Completed Tasks: {}", stats.completed)?;
    writeln!(out, "Incomplete Tasks: {}", stats.incomplete)?;
    for (priority, count) in &stats.by_priority {
        writeln!(out, "{priority} Priority: {count}")?;
    }
    for (category, count) in &stats.by_category {
        writeln!(out, "{category}: {count}")?;
    }
    Ok(())
}
