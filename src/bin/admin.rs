//! AtlasTable Admin Binary
//!
//! Inspects tables and triggers maintenance passes on a data directory.

use std::io::BufRead;
use std::time::Duration;

use atlastable::txlog::LogRecovery;
use atlastable::{Config, Engine, TableId};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasTable admin tool
#[derive(Parser, Debug)]
#[command(name = "atlastable-admin")]
#[command(about = "Maintenance and inspection for AtlasTable data directories")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./atlastable_data")]
    data_dir: String,

    /// Files below this size (in MB) are compaction candidates
    #[arg(long, default_value = "64")]
    min_file_mb: u64,

    /// Target size (in MB) of rewritten files
    #[arg(long, default_value = "1024")]
    target_file_mb: u64,

    /// Maximum files merged per compaction pass
    #[arg(long, default_value = "32")]
    max_files: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every table in the log
    Tables,

    /// Show the live files of a table
    Snapshot {
        /// Table as `database.table`
        table: String,

        /// Log version (latest if omitted)
        #[arg(long)]
        version: Option<u64>,
    },

    /// Merge a table's small files once
    Compact {
        table: String,
    },

    /// Z-order a table's files on the given columns
    Optimize {
        table: String,

        /// Clustering columns, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,
    },

    /// Check the transaction log without modifying it
    VerifyLog,

    /// Run the auto-compactor until Enter is pressed
    Watch {
        /// Seconds between sweeps
        #[arg(long, default_value = "300")]
        interval_secs: u64,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlastable=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasTable Admin v{}", atlastable::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    if let Err(e) = run(args) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> atlastable::Result<()> {
    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .min_file_size(args.min_file_mb * 1024 * 1024)
        .target_file_size(args.target_file_mb * 1024 * 1024)
        .max_files_to_compact(args.max_files);

    if let Commands::Watch { interval_secs } = &args.command {
        builder = builder.check_interval(Duration::from_secs(*interval_secs));
    }
    let config = builder.build();

    // Verification must not go through Engine::open, which truncates
    if let Commands::VerifyLog = args.command {
        let path = Engine::log_file_path(&config.data_dir);
        let result = LogRecovery::verify(&path)?;
        println!("log:        {}", path.display());
        println!("entries:    {}", result.entries_recovered);
        println!("corrupted:  {}", result.entries_corrupted);
        println!("last lsn:   {}", result.last_lsn);
        println!("torn tail:  {}", result.was_truncated);
        return Ok(());
    }

    let engine = Engine::open(config)?;

    match args.command {
        Commands::Tables => {
            for table in engine.list_tables()? {
                let snapshot = engine.snapshot(&table, None)?;
                println!(
                    "{}\tversion={}\tfiles={}\trows={}\tbytes={}",
                    table,
                    snapshot.version,
                    snapshot.files.len(),
                    snapshot.total_rows(),
                    snapshot.total_size()
                );
            }
        }
        Commands::Snapshot { table, version } => {
            let table = TableId::parse(&table)?;
            let snapshot = engine.snapshot(&table, version)?;
            println!("{} @ version {}", snapshot.table, snapshot.version);
            for column in &snapshot.schema.columns {
                println!("  column {}: {:?}", column.name, column.column_type);
            }
            for file in &snapshot.files {
                println!("  {}\t{} rows\t{} bytes", file.path, file.row_count, file.size);
            }
        }
        Commands::Compact { table } => {
            let table = TableId::parse(&table)?;
            let report = engine.compact_table(&table)?;
            match &report.output {
                Some(output) => println!(
                    "merged {} of {} files into {} ({} unreadable, {} left live, {} log failures)",
                    report.merged,
                    report.selected,
                    output.path,
                    report.unreadable,
                    report.rejected,
                    report.log_failures
                ),
                None => println!("nothing to compact"),
            }
        }
        Commands::Optimize { table, columns } => {
            let table = TableId::parse(&table)?;
            let report = engine.optimize_table(&table, &columns)?;
            println!(
                "rewrote {} rows from {} files into {} files ({} unreadable, {} left live)",
                report.rows,
                report.files_removed,
                report.files_written.len(),
                report.unreadable,
                report.rejected
            );
        }
        Commands::Watch { .. } => {
            let handle = engine.start_auto_compaction()?;
            println!("auto-compactor running, press Enter to stop");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let sweeps = handle.stop()?;
            println!("stopped after {} sweeps", sweeps);
        }
        Commands::VerifyLog => {}
    }

    Ok(())
}
