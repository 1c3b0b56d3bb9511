use anyhow::Context;
use colored::Colorize;
use objds_datastore::{Datastore, DatastoreConfig, Entry, Key, ObjectDatastore, Query};
use objds_store::LocalConnector;
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = DatastoreConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let ds = ObjectDatastore::open(config, &LocalConnector).context("opening datastore")?;

    let result = match cli.command {
        Command::Init => cmd_init(&ds),
        Command::Put(args) => cmd_put(&ds, args),
        Command::Get(args) => cmd_get(&ds, args),
        Command::Has(args) => cmd_has(&ds, args),
        Command::Size(args) => cmd_size(&ds, args),
        Command::Rm(args) => cmd_rm(&ds, args),
        Command::Ls(args) => cmd_ls(&ds, args, &cli.format),
        Command::Sync(args) => cmd_sync(&ds, args),
    };

    let closed = ds.close().context("closing datastore");
    result.and(closed)
}

fn cmd_init(ds: &ObjectDatastore) -> anyhow::Result<()> {
    ds.ensure_bucket()?;
    println!("{} Bucket {} ready", "✓".green().bold(), ds.bucket().bold());
    Ok(())
}

fn cmd_put(ds: &ObjectDatastore, args: PutArgs) -> anyhow::Result<()> {
    let value = match (&args.file, args.value) {
        (Some(path), _) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?
        }
        (None, Some(value)) => value.into_bytes(),
        (None, None) => anyhow::bail!("no value given"),
    };
    let key = Key::new(&args.key);
    ds.put(&key, &value)?;
    println!("{} {} ({} bytes)", "stored".green(), key.to_string().yellow(), value.len());
    Ok(())
}

fn cmd_get(ds: &ObjectDatastore, args: KeyArgs) -> anyhow::Result<()> {
    let value = ds.get(&Key::new(&args.key))?;
    println!("{}", render_value(&value));
    Ok(())
}

fn cmd_has(ds: &ObjectDatastore, args: KeyArgs) -> anyhow::Result<()> {
    let key = Key::new(&args.key);
    if ds.has(&key)? {
        println!("{} {}", "✓".green(), key);
    } else {
        println!("{} {}", "✗".red(), key);
    }
    Ok(())
}

fn cmd_size(ds: &ObjectDatastore, args: KeyArgs) -> anyhow::Result<()> {
    println!("{}", ds.get_size(&Key::new(&args.key))?);
    Ok(())
}

fn cmd_rm(ds: &ObjectDatastore, args: KeyArgs) -> anyhow::Result<()> {
    let key = Key::new(&args.key);
    ds.delete(&key)?;
    println!("{} {}", "deleted".green(), key.to_string().yellow());
    Ok(())
}

#[derive(Serialize)]
struct ListedEntry {
    key: String,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl From<Entry> for ListedEntry {
    fn from(entry: Entry) -> Self {
        Self {
            key: entry.key.to_string(),
            size: entry.size,
            value: entry.value.as_deref().map(render_value),
        }
    }
}

fn cmd_ls(ds: &ObjectDatastore, args: LsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let query = Query::with_prefix(args.prefix).keys_only(args.keys_only);
    let results = ds.query(query)?;
    let entries: Vec<ListedEntry> = results.rest()?.into_iter().map(Into::into).collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for entry in &entries {
                let size = entry.size.to_string();
                match &entry.value {
                    Some(value) => {
                        println!("{}  {}  {}", entry.key.yellow(), size.dimmed(), value)
                    }
                    None => println!("{}  {}", entry.key.yellow(), size.dimmed()),
                }
            }
            println!("{} entries", entries.len().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_sync(ds: &ObjectDatastore, args: SyncArgs) -> anyhow::Result<()> {
    ds.sync(&Key::new(&args.prefix))?;
    println!("{} synced {}", "✓".green(), args.prefix);
    Ok(())
}

/// UTF-8 values print as text, anything else as hex.
fn render_value(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(value),
    }
}
