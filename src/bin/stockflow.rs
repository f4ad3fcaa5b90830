use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use stockflow::clock::{Clock, SystemClock};
use stockflow::config::EnvSource;
use stockflow::events::{ObjectEvent, QueueEvent};
use stockflow::handlers::{BatchGenerator, BatchProcessor, StreamProcessor, TickPublisher};
use stockflow::logging;
use stockflow::store::{LocalObjectStore, ObjectStore, ObjectUri};
use stockflow::transport::FileStreamTransport;
use stockflow::warehouse::{
    ParquetWarehouse, TableCatalog, LATEST_PRICES, PRICE_BY_DATE, STREAM_PRICES_HISTORY,
};

#[derive(Parser)]
#[command(name = "stockflow")]
#[command(about = "Stock price ingestion handlers over partitioned Parquet")]
struct Cli {
    /// Directory backing the object store (one sub-directory per bucket)
    #[arg(long, env = "STOCKFLOW_STORE_ROOT", default_value = "./data/objects", global = true)]
    store_root: PathBuf,

    /// Directory backing the streams
    #[arg(long, env = "STOCKFLOW_STREAM_ROOT", default_value = "./data/streams", global = true)]
    stream_root: PathBuf,

    /// Table catalog written by `init-tables`
    #[arg(long, env = "STOCKFLOW_CATALOG", default_value = "./data/catalog.json", global = true)]
    catalog: PathBuf,

    /// Minimum log level (error, warn, info, debug, trace)
    #[arg(long, env = "STOCKFLOW_LOG", default_value = "info", global = true)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a CSV of random daily closes under `dest_bucket_path`
    GenerateBatch {
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Append the new closes of a staged CSV
    ProcessBatch {
        /// Object notification JSON file, or `-` for stdin
        #[arg(long)]
        event: PathBuf,
    },
    /// Append delivered ticks from a queue event and rebuild the latest view
    ProcessStream {
        /// Queue event JSON file, or `-` for stdin
        #[arg(long)]
        event: PathBuf,
    },
    /// Same as `process-stream`, driven by a single object notification
    ProcessStreamObject {
        /// Object notification JSON file, or `-` for stdin
        #[arg(long)]
        event: PathBuf,
    },
    /// Publish a random batch of ticks onto `stream_name`
    PublishTicks {
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Create a stream
    CreateStream {
        #[arg(long)]
        name: String,

        #[arg(long, default_value_t = 1)]
        shards: u32,
    },
    /// Drain a stream into one staged object and print its notification
    DeliverStream {
        #[arg(long)]
        name: String,

        /// Staging prefix, e.g. s3://stock-staging/stream/
        #[arg(long)]
        prefix: String,

        /// Wrap the notification in a queue event
        #[arg(long)]
        queue: bool,
    },
    /// Register table locations and create their buckets
    InitTables {
        #[arg(long, default_value = "s3://stock-lake/price_by_date/")]
        price_by_date: String,

        #[arg(long, default_value = "s3://stock-lake/stream_prices_history/")]
        stream_prices_history: String,

        #[arg(long, default_value = "s3://stock-lake/latest_prices/")]
        latest_prices: String,

        /// Extra buckets to create, e.g. the staging bucket
        #[arg(long = "bucket")]
        buckets: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let local_store = Arc::new(LocalObjectStore::new(&cli.store_root));
    let store: Arc<dyn ObjectStore> = local_store.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let config = EnvSource;

    match cli.command {
        Commands::GenerateBatch { seed } => {
            let generator = BatchGenerator::new(store, clock);
            let batch = generator.run(&config, &mut rng(seed))?;
            print_json(&batch)?;
        }
        Commands::ProcessBatch { event } => {
            let event = ObjectEvent::from_json(&read_event(&event)?)?;
            let warehouse = Arc::new(ParquetWarehouse::new(
                Arc::clone(&store),
                load_catalog(&cli.catalog)?,
            ));
            let processor = BatchProcessor::new(store, warehouse, clock);
            print_json(&processor.run(&config, &event)?)?;
        }
        Commands::ProcessStream { event } => {
            let event = QueueEvent::from_json(&read_event(&event)?)?;
            let warehouse = Arc::new(ParquetWarehouse::new(
                Arc::clone(&store),
                load_catalog(&cli.catalog)?,
            ));
            let processor = StreamProcessor::new(store, warehouse, clock);
            print_json(&processor.run_queue(&config, &event)?)?;
        }
        Commands::ProcessStreamObject { event } => {
            let event = ObjectEvent::from_json(&read_event(&event)?)?;
            let warehouse = Arc::new(ParquetWarehouse::new(
                Arc::clone(&store),
                load_catalog(&cli.catalog)?,
            ));
            let processor = StreamProcessor::new(store, warehouse, clock);
            print_json(&processor.run_object(&config, &event)?)?;
        }
        Commands::PublishTicks { seed } => {
            let transport = Arc::new(FileStreamTransport::new(&cli.stream_root));
            let publisher = TickPublisher::new(transport, clock);
            print_json(&publisher.run(&config, &mut rng(seed))?)?;
        }
        Commands::CreateStream { name, shards } => {
            let transport = FileStreamTransport::new(&cli.stream_root);
            print_json(&transport.create_stream(&name, shards)?)?;
        }
        Commands::DeliverStream {
            name,
            prefix,
            queue,
        } => {
            let transport = FileStreamTransport::new(&cli.stream_root);
            let prefix = ObjectUri::parse_prefix(&prefix)
                .with_context(|| format!("invalid staging prefix {prefix}"))?;
            let Some(object) =
                transport.deliver(&name, store.as_ref(), &prefix, clock.now_naive())?
            else {
                log::warn!("stream {name} has no records to deliver");
                return Ok(());
            };
            let notification = ObjectEvent::for_object(&object);
            if queue {
                print_json(&QueueEvent::wrap(&[notification])?)?;
            } else {
                print_json(&notification)?;
            }
        }
        Commands::InitTables {
            price_by_date,
            stream_prices_history,
            latest_prices,
            buckets,
        } => {
            let mut catalog = TableCatalog::new();
            for (table, location) in [
                (PRICE_BY_DATE, price_by_date),
                (STREAM_PRICES_HISTORY, stream_prices_history),
                (LATEST_PRICES, latest_prices),
            ] {
                let uri = ObjectUri::parse_prefix(&location)
                    .with_context(|| format!("invalid location for {table}: {location}"))?;
                local_store.create_bucket(uri.bucket())?;
                catalog.register(table, &uri);
            }
            for bucket in &buckets {
                local_store
                    .create_bucket(bucket)
                    .with_context(|| format!("create bucket {bucket}"))?;
            }
            catalog
                .save(&cli.catalog)
                .with_context(|| format!("write catalog {}", cli.catalog.display()))?;
            print_json(&catalog)?;
        }
    }

    Ok(())
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn read_event(path: &Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("read event from stdin")?;
        return Ok(bytes);
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("read event {}", path.display()))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        bail!("event file {} is empty", path.display());
    }
    Ok(bytes)
}

fn load_catalog(path: &Path) -> Result<TableCatalog> {
    if !path.exists() {
        log::warn!(
            "catalog {} not found, no table is queryable",
            path.display()
        );
        return Ok(TableCatalog::new());
    }
    TableCatalog::load(path).with_context(|| format!("load catalog {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
