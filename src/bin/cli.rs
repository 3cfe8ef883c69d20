//! bagkit CLI
//!
//! Inspect bags and copy subsets of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use bagkit::{Bag, BagWriter, Compression, Config, Query, Time};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// bagkit CLI
#[derive(Parser, Debug)]
#[command(name = "bagkit")]
#[command(about = "Inspect and filter ROS bag (V2.0) files")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a summary of a bag
    Info {
        /// Bag to summarize
        bag: PathBuf,
    },

    /// Print one line per message
    List {
        /// Bag to read
        bag: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Copy matching messages into a new bag
    Filter {
        /// Bag to read
        input: PathBuf,

        /// Bag to create
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// Chunk compression for the new bag (none, bz2, lz4)
        #[arg(short, long, default_value = "none")]
        compression: String,
    },
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
    /// Only messages on this topic (repeatable)
    #[arg(short, long = "topic")]
    topics: Vec<String>,

    /// Skip messages before this time (seconds)
    #[arg(short, long)]
    start: Option<f64>,

    /// Stop after this time (seconds)
    #[arg(short, long)]
    end: Option<f64>,
}

impl FilterArgs {
    fn query(&self) -> Query {
        let mut query = Query::all();
        if !self.topics.is_empty() {
            query = query.topics(self.topics.iter().cloned());
        }
        if let Some(start) = self.start {
            query = query.start(Time::from_secs_f64(start));
        }
        if let Some(end) = self.end {
            query = query.end(Time::from_secs_f64(end));
        }
        query
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bagkit=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Info { bag } => info(&bag),
        Commands::List { bag, filter } => list(&bag, &filter.query()),
        Commands::Filter {
            input,
            output,
            filter,
            compression,
        } => copy(&input, &output, &filter.query(), &compression),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn info(path: &Path) -> bagkit::Result<()> {
    let bag = Bag::open(path)?;
    print!("{}", bag.summary());
    Ok(())
}

fn list(path: &Path, query: &Query) -> bagkit::Result<()> {
    let bag = Bag::open(path)?;
    for message in bag.query(query)? {
        let message = message?;
        println!(
            "{} {} {} ({} bytes)",
            message.time,
            message.topic(),
            message.type_name(),
            message.data.len()
        );
    }
    Ok(())
}

fn copy(input: &Path, output: &Path, query: &Query, compression: &str) -> bagkit::Result<()> {
    let compression: Compression = compression.parse()?;
    let bag = Bag::open(input)?;
    let config = Config::builder().compression(compression).build();
    let mut writer = BagWriter::create_with_config(output, config)?;

    let mut ids = HashMap::new();
    for connection in bag.connections_for(query.topics.as_ref()) {
        let id = writer.add_connection(connection.clone())?;
        ids.insert(connection.id, id);
    }

    for message in bag.query(query)? {
        let message = message?;
        let Some(&id) = ids.get(&message.connection.id) else {
            continue;
        };
        writer.write(id, message.time, &message.data)?;
    }

    let header = writer.finalize()?;
    tracing::info!(
        "wrote {} messages to {} ({} chunks)",
        writer.message_count(),
        output.display(),
        header.chunk_count
    );
    Ok(())
}
