use clap::{Parser, Subcommand};
use cli::{DatasetManifest, parse_geotransform};
use color_eyre::eyre::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use roadnet::assembly::{PredictedGraph, georeference};
use roadnet::dataset::ExampleSummary;
use roadnet::io::geojson::to_geojson_string;
use roadnet::{RoadGraphConfig, TilePlanner, TrainingDataset};
use roadnet_common::{GeoReference, adjacency};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the JSON schema of the engine configuration
    Schema {
        /// Write the schema here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the inference windows for an image size
    Plan {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Path to a TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Draw training samples from a tile manifest
    Sample {
        /// Path to the TOML or JSON dataset manifest
        #[arg(short, long)]
        manifest: PathBuf,
        /// Path to a TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of random samples to draw
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Emit every evaluation window instead of random draws
        #[arg(long)]
        evaluation: bool,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Convert a pixel-space adjacency graph to GeoJSON road segments
    Georeference {
        /// Adjacency JSON keyed by (row, col)
        #[arg(short, long)]
        graph: PathBuf,
        /// GDAL geotransform "x0,a,b,y0,d,e"
        #[arg(long, allow_hyphen_values = true)]
        geotransform: String,
        /// EPSG id (4326, 3857, 326NN/327NN UTM) or a "+proj=..." definition
        #[arg(long, default_value = "EPSG:4326", allow_hyphen_values = true)]
        crs: String,
        /// Write GeoJSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Schema { output } => {
            let schema = serde_json::to_string_pretty(&RoadGraphConfig::schema())?;
            emit(&schema, output.as_deref())?;
        }
        Commands::Plan { width, height, config } => {
            plan(*width, *height, config.as_deref())?;
        }
        Commands::Sample {
            manifest,
            config,
            count,
            seed,
            evaluation,
            output,
        } => {
            sample(manifest, config.as_deref(), *count, *seed, *evaluation, output.as_deref())?;
        }
        Commands::Georeference {
            graph,
            geotransform,
            crs,
            output,
        } => {
            georeference_graph(graph, geotransform, crs, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RoadGraphConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(RoadGraphConfig::from_file(path)?)
        }
        None => Ok(RoadGraphConfig::default()),
    }
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn plan(width: u32, height: u32, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let windows = TilePlanner::plan(&config, (width, height))?;
    info!("{} windows for a {width}x{height} image", windows.len());
    emit(&serde_json::to_string_pretty(&windows)?, None)
}

fn sample(
    manifest_path: &Path,
    config_path: Option<&Path>,
    count: usize,
    seed: u64,
    evaluation: bool,
    output: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let manifest = DatasetManifest::from_file(manifest_path)?;
    let dataset = TrainingDataset::new(config, manifest.load_tiles()?)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let examples = if evaluation {
        dataset.evaluation_examples(&mut rng)?
    } else {
        (0..count)
            .map(|_| dataset.draw(&mut rng))
            .collect::<roadnet::Result<Vec<_>>>()?
    };

    let degenerate = examples.iter().filter(|e| e.sample.is_degenerate()).count();
    if degenerate > 0 {
        warn!("{degenerate} of {} samples have no usable points", examples.len());
    }
    info!("Drew {} samples from {} tiles", examples.len(), dataset.len());

    let summaries: Vec<ExampleSummary> = examples.iter().map(ExampleSummary::from).collect();
    emit(&serde_json::to_string_pretty(&summaries)?, output)
}

fn georeference_graph(graph_path: &Path, geotransform: &str, crs: &str, output: Option<&Path>) -> Result<()> {
    let map = adjacency::from_json_file(graph_path)?;
    let graph = PredictedGraph::from_adjacency(&map);
    let geo = GeoReference::from_gdal(parse_geotransform(geotransform)?, crs);

    let segments = georeference(&graph, &geo);
    if segments.is_empty() && !graph.is_empty() {
        warn!("No segments produced for {} edges", graph.edge_count());
    }
    info!("{} vertices, {} segments", graph.points.len(), segments.len());
    emit(&to_geojson_string(&segments)?, output)
}
