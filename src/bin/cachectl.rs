//! CLI tool for inspecting and editing a remote HTTP cache.
//!
//! Talks to the servers configured for the remote HTTP cache backend, the
//! same way applications using `RemoteHttpCache` do.
//!
//! # Usage
//!
//! ```bash
//! # Read an entry
//! cargo run --bin cachectl -- get orders --key 42 --composite eu
//!
//! # Write an entry for ten minutes
//! cargo run --bin cachectl -- put orders '{"total":9.5}' --key 42 --ttl 600
//!
//! # Delete a whole namespace (asks for confirmation)
//! cargo run --bin cachectl -- delete orders
//!
//! # Show the hashed key for a key + fragments
//! cargo run --bin cachectl -- key --key 42 --composite eu
//! ```
//!
//! # Environment Variables
//!
//! - `HTTP_CACHE_SERVERS` etc., or the section given with `--section`

use cache_relay::config::{EnvSource, RemoteCacheSettings, DEFAULT_HTTP_SECTION};
use cache_relay::domain::EntryOptions;
use cache_relay::infrastructure::cache::RemoteHttpCache;
use cache_relay::utils::key_codec::CacheKey;
use cache_relay::CacheManager;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// CLI tool for remote HTTP caches.
#[derive(Parser)]
#[command(name = "cachectl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration section to read (`{SECTION}_SERVERS`, ...)
    #[arg(long, global = true, default_value = DEFAULT_HTTP_SECTION)]
    section: String,

    /// Use this server instead of the configured ones (e.g. `localhost:8080`)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Key of the entry to operate on.
#[derive(Args)]
struct KeyArgs {
    /// Logical key; omit for entity-level entries
    #[arg(short, long)]
    key: Option<String>,

    /// Composite fragments, comma-separated
    #[arg(short, long, value_delimiter = ',')]
    composite: Vec<String>,
}

/// Lifetime of the entry.
#[derive(Args)]
struct LifetimeArgs {
    /// Absolute lifetime in seconds
    #[arg(long)]
    ttl: Option<u64>,

    /// Idle lifetime in seconds
    #[arg(long)]
    idle: Option<u64>,
}

impl KeyArgs {
    fn options(&self) -> EntryOptions {
        EntryOptions::new().composite(self.composite.iter().cloned())
    }
}

impl LifetimeArgs {
    fn apply(&self, mut opts: EntryOptions) -> EntryOptions {
        if let Some(ttl) = self.ttl {
            opts = opts.expire_in(Duration::from_secs(ttl));
        }
        if let Some(idle) = self.idle {
            opts = opts.idle_for(Duration::from_secs(idle));
        }
        opts
    }
}

/// Cache commands.
#[derive(Subcommand)]
enum Commands {
    /// Read an entry
    Get {
        /// Namespace (cache id)
        id: String,
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Write an entry
    Put {
        /// Namespace (cache id)
        id: String,
        /// Value to store, verbatim
        value: String,
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        lifetime: LifetimeArgs,
        /// Let the server apply the write asynchronously
        #[arg(long = "async")]
        perform_async: bool,
    },

    /// Delete an entry, or the whole namespace when no key is given
    Delete {
        /// Namespace (cache id)
        id: String,
        #[command(flatten)]
        key: KeyArgs,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Refresh the lifetime of an entry
    Touch {
        /// Namespace (cache id)
        id: String,
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        lifetime: LifetimeArgs,
    },

    /// Print the lookup and delete keys without contacting a server
    Key {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Check that the configured servers answer
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Commands::Key { key } = &cli.command {
        print_key(key);
        return Ok(());
    }

    let cache = connect(&cli)?;

    match cli.command {
        Commands::Get { id, key } => get(&cache, &id, &key).await,
        Commands::Put {
            id,
            value,
            key,
            lifetime,
            perform_async,
        } => put(&cache, &id, value, &key, &lifetime, perform_async).await,
        Commands::Delete { id, key, yes } => delete(&cache, &id, &key, yes).await,
        Commands::Touch { id, key, lifetime } => touch(&cache, &id, &key, &lifetime).await,
        Commands::Health => health(&cache).await,
        Commands::Key { .. } => Ok(()),
    }
}

/// Builds the cache client from configuration and `--server`.
fn connect(cli: &Cli) -> Result<CacheManager> {
    let mut settings = RemoteCacheSettings::load(&EnvSource, &cli.section)
        .with_context(|| format!("Invalid {} configuration", cli.section))?;

    if let Some(server) = &cli.server {
        let endpoint = if server.contains("://") {
            server.clone()
        } else {
            format!("http://{}", server)
        };
        settings.servers = vec![Url::parse(&endpoint).context("Invalid --server")?];
    }

    anyhow::ensure!(
        !settings.servers.is_empty(),
        "No cache servers configured: set {}_SERVERS or pass --server",
        cli.section
    );

    let backend = RemoteHttpCache::from_settings(settings)?;
    Ok(CacheManager::new(Arc::new(backend)))
}

fn print_key(args: &KeyArgs) {
    let key = CacheKey::new(args.key.as_deref(), args.composite.as_slice());

    println!("{}", "🔑 Cache key".bright_blue().bold());
    println!();
    println!("  Lookup: {}", key.lookup().bright_yellow());
    println!(
        "  Delete: {}",
        if key.is_keyless() {
            "(whole namespace)".bright_black()
        } else {
            key.delete().bright_yellow()
        }
    );
    println!();
}

async fn get(cache: &CacheManager, id: &str, key: &KeyArgs) -> Result<()> {
    match cache.get_text(id, key.key.as_deref(), &key.options()).await {
        Some(value) => println!("{}", value),
        None => println!("{}", "∅ Miss".yellow()),
    }
    Ok(())
}

async fn put(
    cache: &CacheManager,
    id: &str,
    value: String,
    key: &KeyArgs,
    lifetime: &LifetimeArgs,
    perform_async: bool,
) -> Result<()> {
    let mut opts = lifetime.apply(key.options());
    if perform_async {
        opts = opts.perform_async(true);
    }

    let stored = cache
        .put(id, key.key.as_deref(), &value, &opts)
        .await
        .context("Failed to write entry")?;

    if stored {
        println!("{}", "✅ Stored".green().bold());
    } else {
        println!("{}", "⚠️  Server did not accept the entry".yellow());
    }
    Ok(())
}

/// Deletes an entry; namespace-wide deletes require confirmation.
async fn delete(cache: &CacheManager, id: &str, key: &KeyArgs, skip_confirm: bool) -> Result<()> {
    let keyless = key.key.is_none() && key.composite.is_empty();

    if keyless && !skip_confirm {
        println!("  Namespace: {}", id.cyan());
        println!();

        let confirmed = Confirm::new()
            .with_prompt("Delete every entry in this namespace?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let removed = cache
        .delete(id, key.key.as_deref(), &key.options())
        .await
        .context("Failed to delete")?;

    if removed {
        println!("{}", "✅ Deleted".green().bold());
    } else {
        println!("{}", "⚠️  Nothing to delete".yellow());
    }
    Ok(())
}

async fn touch(cache: &CacheManager, id: &str, key: &KeyArgs, lifetime: &LifetimeArgs) -> Result<()> {
    let opts = lifetime.apply(key.options());

    if cache.touch(id, key.key.as_deref(), &opts).await {
        println!("{}", "✅ Touched".green().bold());
    } else {
        println!("{}", "∅ Miss".yellow());
    }
    Ok(())
}

async fn health(cache: &CacheManager) -> Result<()> {
    if cache.health_check().await {
        println!("{}", "✅ Cache server reachable".green().bold());
        Ok(())
    } else {
        anyhow::bail!("Cache server unreachable")
    }
}
