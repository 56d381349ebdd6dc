use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use moto_catalog::{
    catalog::EvictionStrategy,
    config::Config,
    models::{BikeCategory, CatalogQuery, Condition, ItemDraft},
    CatalogRepository,
};

#[derive(Parser)]
#[command(name = "moto-catalog")]
#[command(version = "0.1.0")]
#[command(about = "Admin console for the dealership catalog store")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Data directory (overrides config file)
    #[arg(short = 'D', long, value_name = "DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog items
    List {
        /// Filter by brand
        #[arg(long)]
        brand: Option<String>,
        /// Only featured items
        #[arg(long)]
        featured: bool,
    },
    /// Show one item in full
    Show { id: Uuid },
    /// Add an item with optional image files
    Add {
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "0")]
        mileage: u32,
        #[arg(long, default_value = "")]
        description: String,
        /// Image files to compress and embed
        #[arg(long = "image", value_name = "FILE")]
        images: Vec<std::path::PathBuf>,
    },
    /// Delete an item (no-op when absent)
    Delete { id: Uuid },
    /// Run an eviction strategy
    Evict {
        /// "cap" trims every item's image list; "purge" drops broken payloads
        #[arg(long, default_value = "cap")]
        strategy: String,
    },
    /// Print quota usage
    Storage,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("moto_catalog={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting moto-catalog v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    info!("Using data directory: {}", config.storage.data_dir.display());

    let repository = CatalogRepository::open(&config).await?;

    match cli.command {
        Command::List { brand, featured } => {
            let mut query = CatalogQuery::new();
            if let Some(brand) = brand {
                query = query.brand(brand);
            }
            if featured {
                query = query.featured(true);
            }
            for item in repository.list_items(&query).await {
                println!(
                    "{}  {} {} ({}) — ${:.0}, {} image(s){}",
                    item.id,
                    item.brand,
                    item.model,
                    item.year,
                    item.price,
                    item.images.len(),
                    if item.featured { ", featured" } else { "" }
                );
            }
        }
        Command::Show { id } => {
            let item = repository.get_item(id).await?;
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Command::Add {
            brand,
            model,
            year,
            price,
            mileage,
            description,
            images,
        } => {
            let mut raw_images = Vec::new();
            for path in &images {
                raw_images.push(std::fs::read(path)?);
            }
            let draft = ItemDraft {
                brand,
                model,
                year,
                price,
                category: BikeCategory::Sport,
                condition: if mileage == 0 {
                    Condition::New
                } else {
                    Condition::Used
                },
                mileage,
                description,
                features: Vec::new(),
                featured: false,
            };
            let receipt = repository.add_item(draft, &raw_images).await?;
            println!(
                "Added {} — outcome {:?}, {} image(s) accepted, {} dropped",
                receipt.item.id, receipt.outcome, receipt.images_accepted, receipt.images_dropped
            );
        }
        Command::Delete { id } => {
            repository.delete_item(id).await?;
            println!("Deleted {}", id);
        }
        Command::Evict { strategy } => {
            let strategy = match strategy.as_str() {
                "purge" => EvictionStrategy::PurgeInvalid,
                _ => EvictionStrategy::CapImages {
                    max_per_item: config.quota.eviction_image_cap,
                },
            };
            let report = repository.evict(strategy).await?;
            println!(
                "Evicted {} image(s) across {} item(s), {} bytes reclaimed",
                report.images_removed, report.items_trimmed, report.bytes_reclaimed
            );
        }
        Command::Storage => {
            let info = repository.storage_info().await?;
            println!(
                "{} / {} bytes used ({:.1}%)",
                info.used_bytes,
                info.capacity_bytes,
                info.usage_fraction() * 100.0
            );
            if repository.eviction_recommended().await? {
                println!("Usage is past the high-water mark; eviction is recommended.");
            }
        }
    }

    Ok(())
}
