//! folio - operator command line for the content store
//!
//! Reads the same environment as the site (`FOLIO_*`, `GITHUB_*`); flags
//! override it.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use folio::content::generate_slug;
use folio::storage::BranchName;
use folio::store::{ContentStore, Entity, EntityKind, StoreConfig};

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Manage portfolio site content")]
struct Cli {
    /// Directory holding `content/` (default: FOLIO_CONTENT_ROOT or `.`)
    #[arg(long, global = true)]
    content_root: Option<PathBuf>,

    /// Behave as a hosted deployment: persist remotely or not at all
    #[arg(long, global = true)]
    hosted: bool,

    /// Commit to a Git repository on disk instead of GitHub (implies --hosted)
    #[arg(long, global = true)]
    git_repo: Option<PathBuf>,

    /// Branch remote commits land on
    #[arg(long, global = true, env = "GITHUB_BRANCH")]
    branch: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the active backend and check remote access
    Status,
    /// List a collection (blog, portfolio)
    List { kind: EntityKind },
    /// Print one entity as JSON
    Show { kind: EntityKind, slug: Option<String> },
    /// Validate and save a JSON payload read from FILE (`-` for stdin)
    Save {
        kind: EntityKind,
        file: PathBuf,
        #[arg(long)]
        slug: Option<String>,
    },
    /// Save a JSON array of `{ kind, slug?, payload }` entries together
    Batch { file: PathBuf },
    /// Delete one entity
    Delete { kind: EntityKind, slug: Option<String> },
    /// Rewrite legacy four-field case studies as rich content
    Migrate,
    /// Print the slug generated for a title
    Slug { title: String },
}

#[derive(Debug, Deserialize)]
struct BatchEntry {
    kind: String,
    #[serde(default)]
    slug: Option<String>,
    payload: Value,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Slug { title } = &cli.command {
        println!("{}", generate_slug(title));
        return Ok(());
    }

    let store = ContentStore::open(config_from(&cli)?).context("opening content store")?;

    match cli.command {
        Command::Status => {
            let status = store.status();
            print_json(&serde_json::to_value(&status)?)?;
            if let Some(problem) = status.problem {
                bail!(problem);
            }
        }
        Command::List { kind } => {
            if kind.is_singleton() {
                bail!("{} is a single document; use `show {}`", kind, kind);
            }
            let listed = store.read(kind, None)?.unwrap_or(Value::Array(Vec::new()));
            print_json(&listed)?;
        }
        Command::Show { kind, slug } => match store.read(kind, slug.as_deref())? {
            Some(value) => print_json(&value)?,
            None => bail!("{} {} not found", kind, slug.unwrap_or_default()),
        },
        Command::Save { kind, file, slug } => {
            let payload: Value = serde_json::from_str(&read_input(&file)?).context("parsing payload")?;
            let saved = store.save(kind, slug.as_deref(), payload)?;
            print_json(&saved.to_value()?)?;
        }
        Command::Batch { file } => {
            let entries: Vec<BatchEntry> = serde_json::from_str(&read_input(&file)?).context("parsing batch")?;
            let entities = entries
                .into_iter()
                .map(|entry| Entity::from_payload(entry.kind.parse()?, entry.slug.as_deref(), entry.payload))
                .collect::<Result<Vec<_>, _>>()?;
            let files = store.save_batch(entities)?;
            eprintln!("saved {} file(s)", files);
        }
        Command::Delete { kind, slug } => {
            store.delete(kind, slug.as_deref())?;
        }
        Command::Migrate => {
            let migrated = store.migrate_portfolio()?;
            eprintln!("migrated {} case stud{}", migrated, if migrated == 1 { "y" } else { "ies" });
        }
        Command::Slug { .. } => {}
    }

    Ok(())
}

fn config_from(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = StoreConfig::from_env()?;

    if let Some(root) = &cli.content_root {
        config.content_root = root.clone();
    }
    if cli.hosted {
        config = config.hosted();
    }
    if let Some(repo) = &cli.git_repo {
        config = config.hosted().git_repository(repo);
    }
    if let Some(branch) = &cli.branch {
        config = config.branch(BranchName::new(branch.as_str())?);
    }
    Ok(config)
}

fn read_input(file: &Path) -> anyhow::Result<String> {
    if file.as_os_str() == "-" {
        let mut input = String::new();
        io::stdin().read_to_string(&mut input)?;
        return Ok(input);
    }
    fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
