use std::path::PathBuf;

use clap::{Parser, Subcommand};
use framewise::config::JobConfig;
use framewise::pipeline::{FfmpegBackend, NoOutputs, StreamingPipeline};
use framewise::primitives::FrameAlgorithm;
use framewise::Result;

#[derive(Parser)]
#[command(version, about = "Frame-by-frame video analysis")]
struct Cli {
    /// Encoder for output videos, e.g. libx264; defaults to the container's
    #[arg(long, global = true)]
    codec: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the job described by a JSON file
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Decode every frame of a video without writing anything
    Check {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print container and stream information
    Probe {
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Passes frames through untouched.
struct Decode;

impl FrameAlgorithm for Decode {
    type Output = ();

    fn process_frame(&mut self, _frame: &framewise::pipeline::Frame) -> Result<()> {
        Ok(())
    }
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .filter_module("ffmpeg_io", log::LevelFilter::Warn)
        .parse_default_env()
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut backend = FfmpegBackend::new()?;
    if let Some(codec) = cli.codec {
        backend = backend.with_codec(codec);
    }

    match cli.command {
        Command::Run { config } => {
            let job = JobConfig::load(&config)?;
            log::info!("vision provider: {}", framewise::vision::PROVIDER);
            let summary = job.run(&backend)?;
            println!(
                "{} frames, {} arrays, {} video frames",
                summary.frames, summary.arrays_written, summary.video_frames_written
            );
        }
        Command::Check { input } => {
            let summary =
                StreamingPipeline::new(&backend).process(&mut Decode, &input, &NoOutputs)?;
            println!("{}: {} frames decoded", input.display(), summary.frames);
        }
        Command::Probe { input } => {
            let info = ffmpeg_io::probe(&input)?;
            print!("{}", info);
        }
    }
    Ok(())
}
