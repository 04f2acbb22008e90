use chrono::{DateTime, Utc};
use clap::Parser;
use colored::*;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;
use wordsmaker::api::Workspace;
use wordsmaker::clock::SystemClock;
use wordsmaker::config::{StoragePaths, SETTING_KEYS};
use wordsmaker::error::{describe_failure, ErrorKind, Result, WordsError};
use wordsmaker::export::sanitize_filename;
use wordsmaker::model::{NodeKind, ProjectName, ProjectType, ROOT_ID};
use wordsmaker::store::FsBackend;

mod args;
use args::{Cli, Commands, KindArg};

type App = Workspace<FsBackend, SystemClock>;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (action, result) = run(cli);
    if let Err(e) = result {
        eprintln!("{}", describe_failure(action, &e).red());
        std::process::exit(exit_code(e.kind()));
    }
}

fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Storage => 1,
        ErrorKind::InvalidInput | ErrorKind::InvalidMove => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::Corrupt => 4,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "wordsmaker=debug"
    } else {
        "wordsmaker=warn"
    };
    let env_filter = EnvFilter::try_from_env("WORDSMAKER_LOG")
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn init_workspace(cli: &Cli) -> Result<App> {
    let paths = StoragePaths::discover(cli.data_dir.clone(), cli.backup_dir.clone())?;
    let backend = FsBackend::new(paths.app_root, paths.backup_root);
    Ok(Workspace::new(backend, SystemClock))
}

fn run(cli: Cli) -> (&'static str, Result<()>) {
    let ws = match init_workspace(&cli) {
        Ok(ws) => ws,
        Err(e) => return ("opening the data directory", Err(e)),
    };

    match cli.command {
        None | Some(Commands::Projects) => ("listing projects", handle_projects(&ws)),
        Some(Commands::New { name, project_type }) => (
            "creating a project",
            handle_new(&ws, &name, project_type.as_deref()),
        ),
        Some(Commands::Remove { project }) => {
            ("deleting a project", handle_remove(&ws, &project))
        }
        Some(Commands::Tree { project }) => ("loading the project", handle_tree(&ws, &project)),
        Some(Commands::Add {
            project,
            kind,
            name,
            parent,
        }) => (
            "creating a file/folder",
            handle_add(&ws, &project, kind, &name, parent),
        ),
        Some(Commands::Rename { project, id, name }) => (
            "renaming a file/folder",
            handle_rename(&ws, &project, id, &name),
        ),
        Some(Commands::Rm { project, id }) => {
            ("deleting a file/folder", handle_rm(&ws, &project, id))
        }
        Some(Commands::Mv {
            project,
            id,
            parent,
            index,
        }) => (
            "moving a file/folder",
            handle_mv(&ws, &project, id, parent, index),
        ),
        Some(Commands::Cat { project, id }) => {
            ("loading a document", handle_cat(&ws, &project, id))
        }
        Some(Commands::Write { project, id, text }) => {
            ("saving a document", handle_write(&ws, &project, id, text))
        }
        Some(Commands::Backup { project, if_due }) => {
            ("backing up the project", handle_backup(&ws, &project, if_due))
        }
        Some(Commands::Backups { project }) => {
            ("listing backups", handle_backups(&ws, &project))
        }
        Some(Commands::Restore { project, entry }) => (
            "restoring a backup",
            handle_restore(&ws, &project, &entry),
        ),
        Some(Commands::Export { project, output }) => (
            "exporting the project",
            handle_export(&ws, &project, output),
        ),
        Some(Commands::Settings { key, value }) => {
            ("updating settings", handle_settings(&ws, key, value))
        }
    }
}

fn handle_projects(ws: &App) -> Result<()> {
    let projects = ws.list_projects()?;
    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    for p in &projects {
        let kind = if p.project_type == ProjectType::Unset {
            String::new()
        } else {
            format!("[{}]", p.project_type.as_str())
        };
        let edited = p
            .last_modified
            .map(format_time_ago)
            .unwrap_or_else(|| "never edited".to_string());
        let left = format!("{} {}", p.project_name.bold(), kind.dimmed());
        let words = format!("{} words", p.word_count);
        let padding = NAME_WIDTH.saturating_sub(p.project_name.width() + kind.width() + 1);
        println!(
            "{}{}{:>10}  {}",
            left,
            " ".repeat(padding),
            words,
            edited.dimmed()
        );
    }
    Ok(())
}

fn handle_new(ws: &App, name: &str, project_type: Option<&str>) -> Result<()> {
    let project_type: ProjectType = project_type.unwrap_or("").parse()?;
    let name = ProjectName::decode(name)?;
    let summary = ws.create_project(name.as_str(), project_type)?;
    println!("{}", format!("Created project {}", summary.project_name).green());
    Ok(())
}

fn handle_remove(ws: &App, project: &str) -> Result<()> {
    ws.delete_project(project)?;
    println!("{}", format!("Deleted project {}", project).green());
    Ok(())
}

const NAME_WIDTH: usize = 48;

fn handle_tree(ws: &App, project: &str) -> Result<()> {
    let session = ws.open_project(project)?;
    let summary = session.summary();
    println!(
        "{} {}",
        summary.project_name.bold(),
        format!("({} words)", summary.word_count).dimmed()
    );

    let tree = session.tree();
    if tree.is_empty() {
        println!("{}", "  (empty)".dimmed());
        return Ok(());
    }

    for (depth, node) in tree.outline() {
        let indent = "  ".repeat(depth + 1);
        let id = format!("{:>3}. ", node.id);
        let (marker, words) = if node.is_folder() {
            ("▸ ", tree.subtree_word_count(node.id))
        } else {
            ("  ", node.word_count())
        };
        let fixed = indent.width() + id.width() + marker.width();
        let name = truncate_to_width(&node.name, NAME_WIDTH.saturating_sub(fixed));
        let padding = NAME_WIDTH.saturating_sub(fixed + name.width());
        let name = if node.is_folder() {
            name.bold()
        } else {
            name.normal()
        };
        println!(
            "{}{}{}{}{}{}",
            indent,
            id.yellow(),
            marker,
            name,
            " ".repeat(padding),
            format!("{:>8}", words).dimmed()
        );
    }
    Ok(())
}

fn handle_add(ws: &App, project: &str, kind: KindArg, name: &str, parent: u64) -> Result<()> {
    let mut session = ws.open_project(project)?;
    let kind = match kind {
        KindArg::File => NodeKind::File,
        KindArg::Folder => NodeKind::Folder,
    };
    let node = session.create_node(parent, kind, name)?;
    session.flush()?;
    println!(
        "{}",
        format!("Created {} {} ({})", kind, node.name, node.id).green()
    );
    Ok(())
}

fn handle_rename(ws: &App, project: &str, id: u64, name: &str) -> Result<()> {
    let mut session = ws.open_project(project)?;
    session.rename(id, name)?;
    session.flush()?;
    println!("{}", format!("Renamed {} to {}", id, name.trim()).green());
    Ok(())
}

fn handle_rm(ws: &App, project: &str, id: u64) -> Result<()> {
    let mut session = ws.open_project(project)?;
    let report = session.delete(id)?;
    session.flush()?;
    let removed = report.into_result()?;
    println!("{}", format!("Deleted {} item(s)", removed.len()).green());
    Ok(())
}

fn handle_mv(ws: &App, project: &str, id: u64, parent: u64, index: Option<usize>) -> Result<()> {
    let mut session = ws.open_project(project)?;
    session.move_node(id, parent, index.unwrap_or(usize::MAX))?;
    session.flush()?;
    let target = if parent == ROOT_ID {
        "top level".to_string()
    } else {
        format!("folder {}", parent)
    };
    println!("{}", format!("Moved {} to {}", id, target).green());
    Ok(())
}

fn handle_cat(ws: &App, project: &str, id: u64) -> Result<()> {
    let session = ws.open_project(project)?;
    let content = session.load_content(id)?;
    println!("{}", content);
    Ok(())
}

fn handle_write(ws: &App, project: &str, id: u64, text: Option<String>) -> Result<()> {
    let body = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(WordsError::Io)?;
            buf
        }
    };
    let words = body.split_whitespace().count() as u64;

    let mut session = ws.open_project(project)?;
    session.save_content(id, &body, words)?;
    session.flush()?;
    println!(
        "{}",
        format!("Saved {} ({} words, project total {})", id, words, session.word_count()).green()
    );
    Ok(())
}

fn handle_backup(ws: &App, project: &str, if_due: bool) -> Result<()> {
    let entry = if if_due {
        ws.backup_if_due(project)?
    } else {
        Some(ws.backup_project(project)?)
    };
    match entry {
        Some(entry) => println!("{}", format!("Backed up to {}", entry.name).green()),
        None => println!("{}", "No backup due.".dimmed()),
    }
    Ok(())
}

fn handle_backups(ws: &App, project: &str) -> Result<()> {
    let entries = ws.list_backups(project)?;
    if entries.is_empty() {
        println!("No backups found.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{}  {}  {}",
            entry.name,
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            format_time_ago(entry.created_at).dimmed()
        );
    }
    Ok(())
}

fn handle_restore(ws: &App, project: &str, entry: &str) -> Result<()> {
    ws.restore_backup(project, entry)?;
    println!("{}", format!("Restored {} from {}", project, entry).green());
    Ok(())
}

fn handle_export(ws: &App, project: &str, output: Option<PathBuf>) -> Result<()> {
    let session = ws.open_project(project)?;
    let path = output.unwrap_or_else(|| {
        let name = sanitize_filename(session.project().as_str());
        PathBuf::from(format!("{}.tar.gz", name))
    });
    let file = File::create(&path).map_err(WordsError::Io)?;
    session.export(file)?;
    println!("{}", format!("Exported to {}", path.display()).green());
    Ok(())
}

fn handle_settings(ws: &App, key: Option<String>, value: Option<String>) -> Result<()> {
    let mut settings = ws.settings()?;
    match (key.as_deref(), value) {
        (None, _) => {
            for key in SETTING_KEYS {
                if let Some(val) = settings.get(key) {
                    println!("{} = {}", key, val);
                }
            }
        }
        (Some(key), None) => match settings.get(key) {
            Some(val) => println!("{}", val),
            None => {
                return Err(WordsError::InvalidInput(format!(
                    "Unknown setting: {}",
                    key
                )))
            }
        },
        (Some(key), Some(value)) => {
            settings.set(key, &value)?;
            ws.save_settings(&settings)?;
            let shown = settings.get(key).unwrap_or(value);
            println!("{}", format!("{} set to {}", key, shown).green());
        }
    }
    Ok(())
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }

    result
}

fn format_time_ago(timestamp: DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    let formatter = timeago::Formatter::new();
    formatter.convert(duration.to_std().unwrap_or_default())
}
