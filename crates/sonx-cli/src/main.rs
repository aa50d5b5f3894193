//! 🚀 sonx-cli: the front door, the bouncer, the maitre d' of sonx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that loads config, sets up logging,
//! reads records off disk, and then lets the library do the heavy lifting.
//! Like a manager. 🦆

mod records;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sonx::progress::failure_report;
use sonx::{AppConfig, Ingester, RecordError};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// 🔊 Talk to the ingest channel of a search index.
#[derive(Debug, Parser)]
#[command(name = "sonx", version, about)]
struct Cli {
    /// 🔧 TOML config file. Missing file means env vars (SONX_*) only.
    #[arg(short, long, env = "SONX_CONFIG", default_value = "sonx.toml", global = true)]
    config: PathBuf,

    /// 🧵 Override `runtime.parallelism` for bulk commands.
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    parallelism: Option<i64>,

    /// 🙈 No progress bars.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 📥 Index one object's text.
    Push(ObjectText),
    /// 🗑️ Remove text from one object.
    Pop(ObjectText),
    /// 🧵 Index every record in an NDJSON file (`.gz` is fine too).
    BulkPush(BulkArgs),
    /// 🧵 Remove every record in an NDJSON file from the index.
    BulkPop(BulkArgs),
    /// 🔢 Count indexed terms.
    Count {
        collection: String,
        bucket: Option<String>,
        object: Option<String>,
    },
    /// 🧹 Flush a whole collection.
    Flushc { collection: String },
    /// 🧹 Flush one bucket.
    Flushb { collection: String, bucket: String },
    /// 🧹 Flush one object.
    Flusho {
        collection: String,
        bucket: String,
        object: String,
    },
    /// 🏓 Is anybody home?
    Ping,
}

#[derive(Debug, Args)]
struct ObjectText {
    collection: String,
    bucket: String,
    object: String,
    text: String,
}

#[derive(Debug, Args)]
struct BulkArgs {
    collection: String,
    bucket: String,
    /// 📁 One `{"object": "...", "text": "..."}` per line.
    #[arg(short, long)]
    file: PathBuf,
}

/// 🚀 main(), where it all begins. The genesis. The big bang.
///
/// 🔧 Steps:
/// 1. Init tracing (so we can see what goes wrong, and when)
/// 2. Parse args (clap does the judging)
/// 3. Load config (the moment of truth)
/// 4. Run the command (send it and pray 🙏)
/// 5. Handle errors (cry), exit 1 on anything that failed
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing, because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 🔒 A missing config file is not an error; env vars may carry everything
    let config_file = cli.config.as_path();
    let config_file_path_which_is_validated_to_exist = match config_file.try_exists()
        .with_context(|| format!("💀 Couldn't check whether the configuration file exists. Maybe a permissions thing, maybe a relative-path-vs-cwd thing. Was checking here: '{}'", config_file.display()))
    /* ? */ ?
    {
        true => Some(config_file),  // ✅ Found it! Better than finding my car keys
        false => None,              // 💤 Not there. Env vars, you're up.
    };

    let mut app_config = sonx::app_config::load_config(config_file_path_which_is_validated_to_exist)
        .context("💀 In sonx-cli, main, we couldn't load the config. Check the file and the SONX_* env vars, make sure you didn't forget something obvious")
    /* ? */ ?;
    if let Some(parallelism) = cli.parallelism {
        app_config.runtime.parallelism = parallelism;
    }
    if cli.quiet {
        app_config.runtime.show_progress = false;
    }

    match run(&app_config, cli.command).await {
        Ok(failures) if failures.is_empty() => Ok(()),
        Ok(failures) => {
            // 🍽️ partial failure: print the receipt, then exit non-zero
            eprintln!("{}", failure_report(&failures));
            error!("💀 {} records failed", failures.len());
            std::process::exit(1);
        }
        Err(err) => {
            report_error(&err);
            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}

/// 🎯 Run one command. Bulk commands report per-record failures instead of erroring.
async fn run(app_config: &AppConfig, command: Command) -> Result<Vec<RecordError>> {
    let mut ingester = sonx::connect(app_config).await?;
    let parallelism = app_config.runtime.parallelism;

    let failures = match command {
        Command::Push(args) => {
            ingester
                .push(&args.collection, &args.bucket, &args.object, &args.text)
                .await
                .with_context(|| format!("💀 PUSH of '{}' failed", args.object))?;
            Vec::new()
        }
        Command::Pop(args) => {
            ingester
                .pop(&args.collection, &args.bucket, &args.object, &args.text)
                .await
                .with_context(|| format!("💀 POP of '{}' failed", args.object))?;
            Vec::new()
        }
        Command::BulkPush(args) => {
            let batch = load(&args.file)?;
            ingester
                .bulk_push(&args.collection, &args.bucket, parallelism, batch)
                .await
        }
        Command::BulkPop(args) => {
            let batch = load(&args.file)?;
            ingester
                .bulk_pop(&args.collection, &args.bucket, parallelism, batch)
                .await
        }
        Command::Count {
            collection,
            bucket,
            object,
        } => {
            let count = ingester
                .count(&collection, bucket.as_deref(), object.as_deref())
                .await
                .context("💀 COUNT failed")?;
            println!("{count}");
            Vec::new()
        }
        Command::Flushc { collection } => {
            let flushed = ingester
                .flush_collection(&collection)
                .await
                .context("💀 FLUSHC failed")?;
            println!("{flushed}");
            Vec::new()
        }
        Command::Flushb { collection, bucket } => {
            let flushed = ingester
                .flush_bucket(&collection, &bucket)
                .await
                .context("💀 FLUSHB failed")?;
            println!("{flushed}");
            Vec::new()
        }
        Command::Flusho {
            collection,
            bucket,
            object,
        } => {
            let flushed = ingester
                .flush_object(&collection, &bucket, &object)
                .await
                .context("💀 FLUSHO failed")?;
            println!("{flushed}");
            Vec::new()
        }
        Command::Ping => {
            ingester.ping().await.context("💀 PING failed")?;
            println!("PONG");
            Vec::new()
        }
    };

    ingester
        .quit()
        .await
        .context("💀 the service didn't say goodbye properly")?;
    Ok(failures)
}

fn load(path: &Path) -> Result<Vec<sonx::Record>> {
    let batch = records::read_records(path)?;
    info!("📁 loaded {} records from {}", batch.len(), path.display());
    Ok(batch)
}

/// 🧅 Peel the onion of sadness, one tear-jerking layer at a time.
fn report_error(err: &anyhow::Error) {
    error!("💀 error: {}", err);
    let mut the_vibes_are_giving_connection_issues = false;
    for cause in err.chain().skip(1) {
        error!("⚠️  cause: {}", cause);
        // -- 🕵️ sniff the cause like a truffle pig hunting for connection problems
        let cause_str = cause.to_string();
        if cause_str.contains("connection refused")
            || cause_str.contains("Connection refused")
            || cause_str.contains("failed to connect")
            || cause_str.contains("no handshake within")
        {
            the_vibes_are_giving_connection_issues = true;
        }
    }

    // -- 📡 if it smells like a connection problem, it's probably a connection problem
    if the_vibes_are_giving_connection_issues {
        error!(
            "🔧 hint: looks like the search service isn't reachable. \
            Double-check `connection.host` / `connection.port` and that the service is \
            actually running. If you're using Docker, try `docker ps` to see what's up. \
            Even servers need a nudge sometimes. ☕"
        );
    }
}
