use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
mod auth;
use pwsafe3::{EntryRecord, EntryView, HeaderView, Safe, Storage, StretchParams};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "pwsafe3")]
#[command(version, about = "Reads and writes Password Safe V3 databases.")]
struct Cli {
    /// Path to the .psafe3 database
    #[arg(long, global = true, value_name = "PATH", env = "PWSAFE_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct EntryArgs {
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates a new empty database
    Init {
        /// Password stretching rounds (default: 2048)
        #[arg(long)]
        iterations: Option<u32>,
    },

    /// Adds an entry and prints its UUID
    #[command(arg_required_else_help = true)]
    Add {
        title: String,
        password: String,
        #[command(flatten)]
        fields: EntryArgs,
    },

    /// Lists entries as group/title and UUID
    List,

    /// Prints every populated field of the first entry with this title
    #[command(arg_required_else_help = true)]
    Show { title: String },

    /// Removes an entry by UUID
    #[command(arg_required_else_help = true)]
    Remove { uuid: Uuid },

    /// Shows the database header
    Info,

    /// Writes all entries as JSON to stdout
    Export,

    /// Re-encrypts the database under a new password
    Passwd,
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env("PWSAFE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

fn main() -> Result<()> {
    init_logging()?;
    let args = Cli::parse();
    let storage = args
        .db
        .map(Storage::new)
        .context("no database path given (use --db or PWSAFE_PATH)")?;
    let password = auth::read_password()?;

    match args.command {
        Commands::Init { iterations } => {
            let params = match iterations {
                Some(n) => StretchParams::new(n)?,
                None => StretchParams::default(),
            };
            Safe::init_with_storage(password, storage, params)?;
            println!("database initialized");
        }
        Commands::Add {
            title,
            password: secret,
            fields,
        } => {
            let mut safe = Safe::open_with_storage(password, storage)?;
            let mut entry = EntryRecord::create(&title, &secret)?;
            if let Some(v) = fields.username {
                entry.set_username(&v);
            }
            if let Some(v) = fields.group {
                entry.set_group(&v);
            }
            if let Some(v) = fields.url {
                entry.set_url(&v);
            }
            if let Some(v) = fields.email {
                entry.set_email(&v);
            }
            if let Some(v) = fields.notes {
                entry.set_notes(&v);
            }
            let uuid = safe.add(entry)?;
            safe.save()?;
            println!("{uuid}");
        }
        Commands::List => {
            let safe = Safe::open_with_storage(password, storage)?;
            if safe.entries().is_empty() {
                println!("No entries stored.");
                return Ok(());
            }
            for entry in safe.entries() {
                let title = entry.title().unwrap_or_default();
                let name = match entry.group() {
                    Some(group) if !group.is_empty() => format!("{group}/{title}"),
                    _ => title,
                };
                let uuid = entry.uuid()?.map(|u| u.to_string()).unwrap_or_default();
                println!("{name}  {uuid}");
            }
        }
        Commands::Show { title } => {
            let safe = Safe::open_with_storage(password, storage)?;
            let entry = safe
                .find_by_title(&title)
                .with_context(|| format!("entry '{title}' not found"))?;
            let view = serde_json::to_value(EntryView::try_from(entry)?)?;
            if let Some(fields) = view.as_object() {
                for (name, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
                    match value.as_str() {
                        Some(s) => println!("{name}: {s}"),
                        None => println!("{name}: {value}"),
                    }
                }
            }
        }
        Commands::Remove { uuid } => {
            let mut safe = Safe::open_with_storage(password, storage)?;
            safe.remove(&uuid)?;
            safe.save()?;
            println!("entry {uuid} removed");
        }
        Commands::Info => {
            let safe = Safe::open_with_storage(password, storage)?;
            let header = HeaderView::try_from(safe.header())?;
            let show = |v: Option<String>| v.unwrap_or_else(|| "-".into());

            println!("Path:        {}", safe.storage().path().display());
            println!("Version:     {}", show(header.version));
            println!("Name:        {}", show(header.database_name));
            println!("Saved by:    {}", show(header.last_save_app));
            println!("Saved at:    {}", show(header.last_save_time));
            println!("User:        {}", show(header.last_save_user));
            println!("Host:        {}", show(header.last_save_host));
            println!("Iterations:  {}", safe.params().iterations());
            println!("Entries:     {}", safe.entries().len());
            if !header.empty_groups.is_empty() {
                println!("Empty groups: {}", header.empty_groups.join(", "));
            }
        }
        Commands::Export => {
            let safe = Safe::open_with_storage(password, storage)?;
            let views = safe
                .entries()
                .iter()
                .map(EntryView::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
        Commands::Passwd => {
            let mut safe = Safe::open_with_storage(password, storage)?;
            let new_password = auth::read_new_password_with_confirmation()?;
            safe.change_password(new_password);
            safe.save()?;
            println!("password changed");
        }
    }

    Ok(())
}
