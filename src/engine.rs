//! Core restoration engine.
//!
//! Ties the pipeline together per video: decode, detect with a forced full
//! scan, restore, encode. The per-video surface is infallible; failures are
//! folded into the report so a batch never stops early, and a video that
//! fails at any stage is skipped rather than partially written.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::config::{DetectorConfig, RestoreConfig};
use crate::detector::{detect_series, DetectionSeries};
use crate::error::Result;
use crate::region::Zone;
use crate::restore::{restore_frames, restore_zones};
use crate::template::TemplateAsset;
use crate::video::VideoIo;

/// Result of processing a single video.
#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    /// Source path.
    pub input: PathBuf,
    /// Destination path.
    pub output: PathBuf,
    /// Whether the video was written.
    pub success: bool,
    /// Whether the video was copied through without any restoration.
    pub passthrough: bool,
    /// Decoded frame count.
    pub frames: usize,
    /// Accepted detection records.
    pub detections: usize,
    /// Regions actually rewritten.
    pub regions_restored: usize,
    /// Wall-clock processing time.
    pub elapsed_ms: u64,
    /// Human-readable status.
    pub message: String,
}

impl VideoReport {
    fn new(input: &Path, output: &Path) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            success: false,
            passthrough: false,
            frames: 0,
            detections: 0,
            regions_restored: 0,
            elapsed_ms: 0,
            message: String::new(),
        }
    }
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Videos written successfully, pass-throughs included.
    pub processed: usize,
    /// Videos that failed at any stage.
    pub errors: usize,
    /// Wall-clock batch time.
    pub elapsed_ms: u64,
    /// Source directory or file the batch was built from.
    pub source: PathBuf,
    /// Output directory.
    pub output: PathBuf,
    /// Template path, when the engine was built from a file.
    pub template: Option<PathBuf>,
    /// One `path: message` line per failed video.
    pub failures: Vec<String>,
}

/// The detection-and-restoration engine.
///
/// Create once and reuse across videos; the template and both configurations
/// are validated up front so configuration errors surface before any video
/// work starts.
pub struct RestoreEngine {
    template: TemplateAsset,
    detector_cfg: DetectorConfig,
    restore_cfg: RestoreConfig,
    template_path: Option<PathBuf>,
}

impl RestoreEngine {
    /// Build an engine from an already loaded template.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] when either configuration fails
    /// validation.
    pub fn new(
        template: TemplateAsset,
        detector_cfg: DetectorConfig,
        restore_cfg: RestoreConfig,
    ) -> Result<Self> {
        detector_cfg.validate()?;
        restore_cfg.validate()?;
        Ok(Self {
            template,
            detector_cfg,
            restore_cfg,
            template_path: None,
        })
    }

    /// Build an engine from a template image on disk.
    ///
    /// The path is remembered for batch summaries.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTemplate`] when the image is unusable
    /// and [`crate::Error::Config`] when a configuration fails validation.
    pub fn from_template_path(
        path: &Path,
        mask_threshold: u8,
        detector_cfg: DetectorConfig,
        restore_cfg: RestoreConfig,
    ) -> Result<Self> {
        let template = TemplateAsset::from_path(path, mask_threshold)?;
        let mut engine = Self::new(template, detector_cfg, restore_cfg)?;
        engine.template_path = Some(path.to_path_buf());
        Ok(engine)
    }

    /// Detect without restoring, honoring the configured sampling mode.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Video`] when decoding fails.
    pub fn detect_video(&self, io: &dyn VideoIo, path: &Path) -> Result<DetectionSeries> {
        let video = io.decode(path)?;
        detect_series(&video.frames, video.fps, &self.template, &self.detector_cfg)
    }

    /// Process one video end to end. Never fails; inspect
    /// [`VideoReport::success`].
    ///
    /// Detection always runs as a full scan here: a sampled series would
    /// leave marked frames between samples untouched. A video with zero
    /// accepted detections is still encoded as a pass-through copy.
    #[must_use]
    pub fn process_video(&self, io: &dyn VideoIo, input: &Path, output: &Path) -> VideoReport {
        let started = Instant::now();
        let mut report = VideoReport::new(input, output);
        self.run_video(io, input, output, &mut report);
        report.elapsed_ms = elapsed_ms(&started);
        report
    }

    fn run_video(&self, io: &dyn VideoIo, input: &Path, output: &Path, report: &mut VideoReport) {
        let video = match io.decode(input) {
            Ok(v) => v,
            Err(e) => {
                report.message = format!("Decode failed: {e}");
                return;
            }
        };
        report.frames = video.frames.len();

        let mut cfg = self.detector_cfg.clone();
        cfg.full_scan = true;
        let series = match detect_series(&video.frames, video.fps, &self.template, &cfg) {
            Ok(s) => s,
            Err(e) => {
                report.message = format!("Detection failed: {e}");
                return;
            }
        };
        report.detections = series.accepted().count();

        if report.detections == 0 {
            match io.encode(output, &video.frames, video.fps) {
                Ok(()) => {
                    report.success = true;
                    report.passthrough = true;
                    report.message = "No detections, copied through".into();
                }
                Err(e) => report.message = format!("Encode failed: {e}"),
            }
            return;
        }

        let (restored, stats) = match restore_frames(&video.frames, &series, &self.restore_cfg) {
            Ok(r) => r,
            Err(e) => {
                report.message = format!("Restore failed: {e}");
                return;
            }
        };
        report.regions_restored = stats.restored();
        match io.encode(output, &restored, video.fps) {
            Ok(()) => {
                report.success = true;
                report.message = format!("Restored {} of {} regions", stats.restored(), stats.regions);
            }
            Err(e) => report.message = format!("Encode failed: {e}"),
        }
    }

    /// Process one video against manually drawn zones instead of detections.
    /// Never fails; inspect [`VideoReport::success`].
    #[must_use]
    pub fn process_video_zones(
        &self,
        io: &dyn VideoIo,
        input: &Path,
        output: &Path,
        zones: &[Zone],
    ) -> VideoReport {
        let started = Instant::now();
        let mut report = VideoReport::new(input, output);
        self.run_video_zones(io, input, output, zones, &mut report);
        report.elapsed_ms = elapsed_ms(&started);
        report
    }

    fn run_video_zones(
        &self,
        io: &dyn VideoIo,
        input: &Path,
        output: &Path,
        zones: &[Zone],
        report: &mut VideoReport,
    ) {
        let video = match io.decode(input) {
            Ok(v) => v,
            Err(e) => {
                report.message = format!("Decode failed: {e}");
                return;
            }
        };
        report.frames = video.frames.len();

        let (restored, stats) = match restore_zones(&video.frames, zones, &self.restore_cfg) {
            Ok(r) => r,
            Err(e) => {
                report.message = format!("Restore failed: {e}");
                return;
            }
        };
        report.regions_restored = stats.restored();
        report.passthrough = zones.is_empty();
        match io.encode(output, &restored, video.fps) {
            Ok(()) => {
                report.success = true;
                report.message = format!(
                    "Applied {} zones, rewrote {} regions",
                    zones.len(),
                    stats.restored()
                );
            }
            Err(e) => report.message = format!("Encode failed: {e}"),
        }
    }

    /// Process a list of videos, continuing past failures.
    ///
    /// Output files land in `output_dir` under their default restored names.
    #[must_use]
    pub fn process_batch(
        &self,
        io: &dyn VideoIo,
        inputs: &[PathBuf],
        source: &Path,
        output_dir: &Path,
    ) -> (BatchSummary, Vec<VideoReport>) {
        let started = Instant::now();
        let mut reports = Vec::with_capacity(inputs.len());
        let mut summary = BatchSummary {
            processed: 0,
            errors: 0,
            elapsed_ms: 0,
            source: source.to_path_buf(),
            output: output_dir.to_path_buf(),
            template: self.template_path.clone(),
            failures: Vec::new(),
        };

        for input in inputs {
            let output = batch_output_path(output_dir, input);
            let report = self.process_video(io, input, &output);
            if report.success {
                summary.processed += 1;
            } else {
                summary.errors += 1;
                summary
                    .failures
                    .push(format!("{}: {}", report.input.display(), report.message));
            }
            reports.push(report);
        }

        summary.elapsed_ms = elapsed_ms(&started);
        (summary, reports)
    }
}

/// Check if a file has a supported video extension.
#[must_use]
pub fn is_supported_video(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "mp4" | "mov" | "mkv" | "avi" | "webm" | "m4v"
        ),
        None => false,
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"clip.mp4"` becomes `"clip_restored.mp4"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_restored.{ext}"))
}

/// Where a batch run writes the output for one input.
#[must_use]
pub fn batch_output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let name = default_output_path(input);
    output_dir.join(name.file_name().unwrap_or_default())
}

fn elapsed_ms(started: &Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
