use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use delogo::region::Zone;
use delogo::video::FfmpegPipe;
use delogo::{
    default_output_path, is_supported_video, DetectorConfig, Downscale, RestoreConfig,
    RestoreEngine, VideoReport,
};

#[derive(Parser)]
#[command(
    name = "delogo",
    about = "Detect and remove recurring watermark overlays from video",
    version,
    after_help = "Simple usage: delogo <video> -t mark.png  (restore to {name}_restored.{ext})\n\n\
                  The template's alpha channel, when present, becomes the match mask:\n\
                  transparent pixels are ignored during correlation."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input video file or directory
    input: String,

    /// Template image of the mark
    #[arg(short, long)]
    template: String,

    /// Output file or directory (default: {name}_restored.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Acceptance threshold on the combined score (0.0-1.0)
    #[arg(long, default_value = "0.75")]
    threshold: f32,

    /// Frame sampling budget for --detect-only scans (restoration always
    /// scans every frame)
    #[arg(long, default_value = "24")]
    frames: usize,

    /// Downscale before matching: 0 disables, below 1 is a ratio, 1 and
    /// above is a pixel cap for the longer frame side
    #[arg(long, default_value = "0")]
    downscale: f32,

    /// Alpha level at or below which template pixels are masked out
    #[arg(long, default_value = "10")]
    mask_threshold: u8,

    /// Print the detection series as JSON lines instead of restoring
    #[arg(long)]
    detect_only: bool,

    /// JSON file with manually drawn zones, applied instead of detection
    #[arg(long)]
    zones: Option<String>,

    /// Print the final report as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.detect_only && cli.zones.is_some() {
        eprintln!("Error: Cannot combine --detect-only with --zones");
        process::exit(1);
    }

    let detector_cfg = DetectorConfig {
        threshold: cli.threshold,
        frames_to_scan: cli.frames,
        downscale: Downscale::from_factor(cli.downscale),
        ..DetectorConfig::default()
    };

    // Template and configuration problems surface before any video is touched.
    let engine = match RestoreEngine::from_template_path(
        Path::new(&cli.template),
        cli.mask_threshold,
        detector_cfg,
        RestoreConfig::default(),
    ) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: {e}");
            process::exit(1);
        }
    };

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    let zones = cli.zones.as_deref().map(|p| match load_zones(Path::new(p)) {
        Ok(z) => z,
        Err(e) => {
            eprintln!("Error: Cannot read zones: {e}");
            process::exit(1);
        }
    });

    let io = FfmpegPipe;

    if cli.detect_only {
        if input_path.is_dir() {
            eprintln!("Error: --detect-only expects a single video");
            process::exit(1);
        }
        detect_only(&engine, &io, input_path, cli.quiet);
        return;
    }

    if input_path.is_dir() {
        run_batch(&cli, &engine, &io, input_path);
    } else {
        run_single(&cli, &engine, &io, input_path, zones.as_deref());
    }
}

fn detect_only(engine: &RestoreEngine, io: &FfmpegPipe, input: &Path, quiet: bool) {
    let series = match engine.detect_video(io, input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[FAIL] {}: {e}", input.display());
            process::exit(1);
        }
    };
    for record in series.records() {
        match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                eprintln!("Error: Cannot serialize record: {e}");
                process::exit(1);
            }
        }
    }
    if !quiet {
        eprintln!(
            "[Summary] {} records, {} accepted",
            series.len(),
            series.accepted().count()
        );
    }
}

fn run_single(cli: &Cli, engine: &RestoreEngine, io: &FfmpegPipe, input: &Path, zones: Option<&[Zone]>) {
    let output = cli
        .output
        .as_ref()
        .map_or_else(|| default_output_path(input), PathBuf::from);

    let report = match zones {
        Some(z) => engine.process_video_zones(io, input, &output, z),
        None => engine.process_video(io, input, &output),
    };
    print_report(&report, cli.quiet, cli.verbose);
    if cli.json {
        if let Ok(line) = serde_json::to_string(&report) {
            println!("{line}");
        }
    }
    if !report.success {
        process::exit(1);
    }
}

fn run_batch(cli: &Cli, engine: &RestoreEngine, io: &FfmpegPipe, input_dir: &Path) {
    if cli.zones.is_some() {
        eprintln!("Error: --zones applies to a single video, not a directory");
        process::exit(1);
    }
    let Some(output_dir) = cli.output.as_ref().map(PathBuf::from) else {
        eprintln!("Error: Output directory is required for batch processing");
        eprintln!("Usage: delogo <input_dir> -t mark.png -o <output_dir>");
        process::exit(1);
    };
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        eprintln!("Error: Cannot create output directory: {e}");
        process::exit(1);
    }

    let entries = match std::fs::read_dir(input_dir) {
        Ok(rd) => rd,
        Err(e) => {
            eprintln!("Error: Cannot read directory {}: {e}", input_dir.display());
            process::exit(1);
        }
    };
    let mut inputs: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_video(p))
        .collect();
    inputs.sort();
    if inputs.is_empty() {
        eprintln!("Error: No supported videos in {}", input_dir.display());
        process::exit(1);
    }

    let (summary, reports) = engine.process_batch(io, &inputs, input_dir, &output_dir);
    for report in &reports {
        print_report(report, cli.quiet, cli.verbose);
    }

    if !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {}", summary.processed);
        if summary.errors > 0 {
            eprint!(", Failed: {}", summary.errors);
        }
        eprintln!(" (Total: {}, {} ms)", reports.len(), summary.elapsed_ms);
    }
    if cli.json {
        if let Ok(line) = serde_json::to_string(&summary) {
            println!("{line}");
        }
    }
    if summary.errors > 0 {
        process::exit(1);
    }
}

fn print_report(report: &VideoReport, quiet: bool, verbose: bool) {
    if quiet && report.success {
        return;
    }

    let filename = report.input.file_name().map_or_else(
        || report.input.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if report.success {
        if !quiet {
            if report.passthrough {
                eprintln!("[SKIP] {filename}: {}", report.message);
            } else {
                eprintln!(
                    "[OK] {filename}: {} detections, {} regions restored",
                    report.detections, report.regions_restored
                );
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", report.message);
    }

    if verbose {
        eprintln!(
            "  -> {} frames in {} ms -> {}",
            report.frames,
            report.elapsed_ms,
            report.output.display()
        );
    }
}

fn load_zones(path: &Path) -> Result<Vec<Zone>, String> {
    let data =
        std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("{}: {e}", path.display()))
}
