//! Detect and remove recurring watermark overlays from video.
//!
//! A reference image of the mark is matched against frames with masked
//! zero-mean normalized cross-correlation across a range of scales. Flagged
//! regions are then rebuilt from nearby clean frames: donor patches are
//! median-aggregated and composited with a seamless gradient-domain blend,
//! falling back to single-frame inpainting when no clean donor exists.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use delogo::video::FfmpegPipe;
//! use delogo::{DetectorConfig, RestoreConfig, RestoreEngine};
//!
//! let engine = RestoreEngine::from_template_path(
//!     Path::new("mark.png"),
//!     10,
//!     DetectorConfig::default(),
//!     RestoreConfig::default(),
//! )
//! .expect("failed to init engine");
//! let report = engine.process_video(&FfmpegPipe, Path::new("in.mp4"), Path::new("out.mp4"));
//! println!("{}: {}", report.input.display(), report.message);
//! ```
//!
//! # Detection only
//!
//! Detection can run on its own under a frame-sampling budget, which is much
//! cheaper than the exhaustive scan restoration needs.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use delogo::video::FfmpegPipe;
//! use delogo::{DetectorConfig, RestoreConfig, RestoreEngine};
//!
//! let engine = RestoreEngine::from_template_path(
//!     Path::new("mark.png"),
//!     10,
//!     DetectorConfig::default(),
//!     RestoreConfig::default(),
//! )
//! .expect("failed to init engine");
//! let series = engine
//!     .detect_video(&FfmpegPipe, Path::new("in.mp4"))
//!     .expect("detection failed");
//! for record in series.accepted() {
//!     println!("frame {} score {:.2}", record.frame_index, record.score);
//! }
//! ```

#![deny(missing_docs)]

pub mod blend;
pub mod config;
pub mod detector;
mod engine;
pub mod error;
mod filter;
pub mod matcher;
pub mod region;
pub mod restore;
pub mod scanner;
pub mod template;
pub mod video;

pub use config::{DetectorConfig, Downscale, RestoreConfig, ScannerConfig};
pub use engine::{
    batch_output_path, default_output_path, is_supported_video, BatchSummary, RestoreEngine,
    VideoReport,
};
pub use error::{Error, Result};
pub use template::TemplateAsset;
