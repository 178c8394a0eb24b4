use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use layers::{AttributeSpec, ParcelLayer, Selection, Symbology, VALUE_PER_ACRE};
use parcel_server::ParcelStore;
use streaming::{AggregatorConfig, DEFAULT_PAGE_SIZE, HttpPageSource, LoadStatus, load_all};
use tools::import::prepare_parcels;
use tools::parse_bbox;
use tools::summary::summarize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Parcel map loader and bulk import")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a parcel GeoJSON export into the store, replacing its contents
    Import {
        /// GeoJSON FeatureCollection with a `parcelid` attribute
        file: PathBuf,

        /// SQLite database file
        #[arg(long, default_value = "data/parcels.db")]
        db: PathBuf,

        /// Add to the stored parcels instead of replacing them
        #[arg(long)]
        append: bool,
    },

    /// Aggregate every page from a running server and summarise the coloring
    Load {
        /// Query endpoint
        #[arg(long, default_value = "http://127.0.0.1:3000/api/parcels")]
        url: String,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Bounding box: minLng,minLat,maxLng,maxLat
        #[arg(long)]
        bbox: Option<String>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,

        /// Attribute to color by
        #[arg(long, default_value = VALUE_PER_ACRE)]
        attribute: String,

        /// Selected parcel ids (repeatable)
        #[arg(long)]
        select: Vec<String>,

        /// Report extrusion heights
        #[arg(long)]
        extruded: bool,

        /// Legend rows to print
        #[arg(long, default_value_t = 20)]
        legend_rows: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<(), String> {
    match Args::parse().command {
        Command::Import { file, db, append } => cmd_import(file, db, append),
        Command::Load {
            url,
            page_size,
            bbox,
            max_pages,
            attribute,
            select,
            extruded,
            legend_rows,
        } => {
            let bbox = bbox.as_deref().map(parse_bbox).transpose()?;
            if page_size == 0 {
                return Err("--page-size must be positive".to_string());
            }
            let config = AggregatorConfig {
                page_size,
                max_pages,
            };
            let source = HttpPageSource::new(url);
            info!("loading parcels from {}", source.endpoint());
            let outcome = load_all(&source, &config, bbox).await;

            match &outcome.status {
                LoadStatus::Complete => {}
                LoadStatus::Partial { failed_page, error } => {
                    warn!("load incomplete: page {failed_page} failed: {error}");
                }
                LoadStatus::PageLimitReached { max_pages } => {
                    warn!("load stopped at the {max_pages}-page limit");
                }
            }
            println!(
                "{} parcels in {} pages{}",
                outcome.features.len(),
                outcome.pages_merged,
                if outcome.is_complete() { "" } else { " (incomplete)" }
            );

            let symbology = Symbology::new(AttributeSpec::catalog(), Arc::new(outcome.features));
            let mut layer = ParcelLayer::new(1, symbology);
            layer.set_attribute(attribute);
            layer.set_extruded(extruded);
            layer.set_selection(match select.len() {
                0 => Selection::None,
                1 => Selection::One(select[0].clone()),
                _ => Selection::Many(select.into_iter().collect()),
            });

            print!("{}", summarize(&mut layer).display(legend_rows));
            Ok(())
        }
    }
}

fn cmd_import(file: PathBuf, db: PathBuf, append: bool) -> Result<(), String> {
    let raw = fs::read_to_string(&file).map_err(|e| format!("read {file:?}: {e}"))?;
    let collection: geojson::FeatureCollection =
        serde_json::from_str(&raw).map_err(|e| format!("parse {file:?}: {e}"))?;

    let prepared = prepare_parcels(collection);
    if prepared.skipped > 0 {
        warn!("{} features skipped", prepared.skipped);
    }

    let store = ParcelStore::open(&db, 1).map_err(|e| format!("open {db:?}: {e}"))?;
    let written = if append {
        store.insert_parcels(&prepared.parcels)
    } else {
        store.replace_parcels(&prepared.parcels)
    };
    let inserted = written.map_err(|e| format!("import: {e}"))?;
    let total = store.count().map_err(|e| format!("count: {e}"))?;

    println!("imported {inserted} parcels into {} ({total} total)", db.display());
    Ok(())
}
