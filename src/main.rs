mod cache;
mod config;
mod errors;
mod feedback;
mod launcher;
mod matcher;
mod model;
mod refresh;
mod registry;
mod service;
mod sources;

use crate::cache::CacheStore;
use crate::config::{Config, load_config};
use crate::launcher::ProcessLauncher;
use crate::matcher::FuzzyMatcher;
use crate::model::EntryKind;
use crate::refresh::{REFRESH_TASK, RefreshCoordinator};
use crate::registry::{PidFileRegistry, TaskRegistry};
use crate::service::{QueryService, TypeFilter};
use crate::sources::command::CommandSource;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use directories::BaseDirs;
use log::warn;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const WORKER_LOG: &str = "refresh.log";
/// The worker log is started afresh once it grows past this size.
const WORKER_LOG_MAX_BYTES: u64 = 1024 * 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Search Default Folder X favourites and recent items", long_about = None)]
struct Args {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search cached entries and print picker items as JSON
    Query {
        /// Show only items of this type (repeatable)
        #[arg(short = 't', long = "type", value_enum, default_value = "all")]
        types: Vec<TypeArg>,

        /// Fuzzy search text
        query: Vec<String>,
    },
    /// Fetch entries from the data source now and update the cache
    Refresh {
        /// Run as the detached background refresh
        #[arg(long, hide = true)]
        worker: bool,
    },
    /// Show cache and refresh state
    Status,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum TypeArg {
    All,
    Fav,
    Rfolder,
    Rfile,
}

fn type_filter(types: &[TypeArg]) -> TypeFilter {
    if types.is_empty() || types.contains(&TypeArg::All) {
        return TypeFilter::all();
    }
    let kinds = types
        .iter()
        .filter_map(|t| match t {
            TypeArg::All => None,
            TypeArg::Fav => Some(EntryKind::Favorite),
            TypeArg::Rfolder => Some(EntryKind::RecentFolder),
            TypeArg::Rfile => Some(EntryKind::RecentFile),
        })
        .collect();
    TypeFilter::only(kinds)
}

/// Open the worker log for appending, truncating it first if it has grown past
/// `max_bytes`.
fn open_worker_log(path: &Path, max_bytes: u64) -> io::Result<File> {
    let oversized = fs::metadata(path).is_ok_and(|m| m.len() > max_bytes);
    let mut options = OpenOptions::new();
    options.create(true);
    if oversized {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    options.open(path)
}

fn init_logging(log_file: Option<&Path>) {
    let default_level = if log_file.is_some() { "info" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = log_file {
        match open_worker_log(path, WORKER_LOG_MAX_BYTES) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("dfx: cannot open log file {:?}: {}", path, e),
        }
    }

    builder.init();
}

fn build_source(config: &Config) -> CommandSource {
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    CommandSource::new(config.source.program.clone(), config.source.args.clone())
        .with_timeout(config.source_timeout())
        .with_home(home)
}

/// Arguments that make the current binary run the background refresh with the
/// same configuration.
fn worker_args(config_path: Option<&Path>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args.push("refresh".to_string());
    args.push("--worker".to_string());
    args
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load Config
    let config = load_config(args.config.as_deref())?;
    let cache_dir = config.cache_dir();

    let is_worker = matches!(args.command, Command::Refresh { worker: true });
    if is_worker {
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache directory {:?}", cache_dir))?;
    }
    let log_file = is_worker.then(|| cache_dir.join(WORKER_LOG));
    init_logging(log_file.as_deref());

    // 2. Shared state: snapshot and running-task records
    let store = CacheStore::in_dir(&cache_dir);
    let registry = PidFileRegistry::new(&cache_dir);
    let source = build_source(&config);

    match args.command {
        Command::Query { types, query } => {
            let launcher = ProcessLauncher::current_exe(worker_args(args.config.as_deref()))?;
            let coordinator = RefreshCoordinator::new(registry, launcher, config.max_age());
            let mut service = QueryService::new(
                store,
                coordinator,
                Box::new(source),
                FuzzyMatcher::new(config.search.min_score),
                config.query_options(),
            );

            let result = service.query(&query.join(" "), &type_filter(&types));
            let stdout = io::stdout();
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &feedback::render(&result))?;
            writeln!(out)?;
        }
        Command::Refresh { worker } => {
            let result = refresh::run_refresh(&source, &store);
            if worker {
                if let Err(e) = registry.release(REFRESH_TASK, std::process::id()) {
                    warn!("Failed to release refresh record: {}", e);
                }
            }
            let snapshot = result?;
            if !worker {
                println!(
                    "Cached {} entries in {:?}",
                    snapshot.entries.len(),
                    store.path()
                );
            }
        }
        Command::Status => {
            println!("cache:   {}", store.path().display());
            match store.read() {
                Some(snapshot) => println!("entries: {}", snapshot.entries.len()),
                None => println!("entries: none yet"),
            }
            if let Some(age) = store.age() {
                println!(
                    "age:     {:.1}s (stale after {}s)",
                    age.as_secs_f64(),
                    config.max_age().as_secs()
                );
            }
            match registry.running(REFRESH_TASK) {
                Some(pid) => println!("refresh: running (pid {})", pid),
                None => println!("refresh: idle"),
            }
        }
    }

    Ok(())
}
