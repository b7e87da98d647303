use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use pcd_exporter::OccupancyFileWriter;
use pcd_parser::NuScenes;
use pcd_transformer::{AggregatorConfig, SequenceRunner};

const DATASET_VERSION: &str = "v1.0-trainval";

#[derive(Parser, Debug)]
#[command(
    name = "Occupancy Converter",
    about = "Aggregates labeled nuScenes LiDAR sweeps into occupancy point clouds",
    author = "MIERUNE Inc.",
    version = "0.0.1"
)]
struct Cli {
    /// Root directory of the nuScenes dataset
    #[arg(long, default_value = "./data/nuscenes", value_name = "DIR")]
    dataroot: PathBuf,

    /// Output directory, created if missing
    #[arg(long, alias = "save_path", default_value = "./data/nuscenes/occupancy", value_name = "DIR")]
    save_path: PathBuf,

    /// Keyframes gathered before and after each sample
    #[arg(long, alias = "num_sweeps", default_value_t = 10)]
    num_sweeps: usize,
}

fn main() -> ExitCode {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .init();

    let args = Cli::parse();

    log::info!("dataroot: {:?}", args.dataroot);
    log::info!("output folder: {:?}", args.save_path);
    log::info!("num sweeps: {}", args.num_sweeps);

    let start = std::time::Instant::now();

    if let Err(err) = std::fs::create_dir_all(&args.save_path) {
        log::error!("failed to create {:?}: {}", args.save_path, err);
        return ExitCode::FAILURE;
    }

    log::info!("start loading {}...", DATASET_VERSION);
    let dataset = match NuScenes::load(&args.dataroot, DATASET_VERSION) {
        Ok(dataset) => dataset,
        Err(err) => {
            log::error!("failed to load dataset: {}", err);
            return ExitCode::FAILURE;
        }
    };

    log::info!("start converting...");
    let start_local = std::time::Instant::now();
    let config = AggregatorConfig {
        num_sweeps: args.num_sweeps,
        ..Default::default()
    };
    let mut writer = OccupancyFileWriter::new(&args.save_path);
    let mut runner = SequenceRunner::new(config);
    let summary = runner.run(&dataset, &mut writer);
    log::info!(
        "Finish converting {} samples of {} scenes ({} points) in {:?}",
        summary.samples,
        summary.scenes,
        summary.points,
        start_local.elapsed()
    );

    log::info!("Elapsed: {:?}", start.elapsed());
    if summary.is_success() {
        log::info!("Finish processing");
        ExitCode::SUCCESS
    } else {
        log::error!("failed scenes: {:?}", summary.failed_scenes);
        ExitCode::FAILURE
    }
}
