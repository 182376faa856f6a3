//! Video decode and encode adapters.
//!
//! The rest of the crate is frame-oriented; this module is the only place
//! that talks to video containers. [`FfmpegPipe`] shells out to `ffmpeg` and
//! `ffprobe` and moves raw RGB frames over pipes. [`MemoryVideoIo`] keeps
//! clips in memory for engine-level tests. Neither adapter carries any
//! detection or restoration logic.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use image::{imageops, RgbImage};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Frame rate used when the container reports none.
const FALLBACK_FPS: f64 = 30.0;
/// Scaler flags keeping rawvideo round-trips color-stable.
const SWS_FLAGS: &str = "accurate_rnd+full_chroma_inp+full_chroma_int";

/// A fully decoded clip.
#[derive(Debug, Clone, Default)]
pub struct DecodedVideo {
    /// RGB frames in presentation order.
    pub frames: Vec<RgbImage>,
    /// Frames per second as reported by the container.
    pub fps: f64,
}

/// Frame transport between the engine and a video container.
pub trait VideoIo {
    /// Decode a video into RGB frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Video`] when the source cannot be opened, has no
    /// video stream, or produces a malformed frame stream.
    fn decode(&self, path: &Path) -> Result<DecodedVideo>;

    /// Encode RGB frames to a video file.
    ///
    /// Every frame is conformed to the first frame's dimensions before it is
    /// written; stray sizes are resized rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Video`] when there is nothing to encode or the
    /// encoder rejects the stream.
    fn encode(&self, path: &Path, frames: &[RgbImage], fps: f64) -> Result<()>;
}

/// Adapter shelling out to `ffmpeg` and `ffprobe`.
///
/// Decode probes the container for geometry and frame rate, then streams
/// `rgb24` rawvideo over stdout. Encode streams rawvideo into `ffmpeg`'s
/// stdin and lets the output extension pick the container.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegPipe;

/// The slice of `ffprobe -print_format json` output that decode needs.
#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    /// Fraction such as `30/1` or `24000/1001`.
    r_frame_rate: Option<String>,
}

impl FfmpegPipe {
    fn probe(path: &Path) -> Result<(u32, u32, f64)> {
        let output = Command::new("ffprobe")
            .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| Error::Video(format!("cannot run ffprobe: {e}")))?;
        if !output.status.success() {
            return Err(Error::Video(format!(
                "ffprobe failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_probe(&output.stdout, path)
    }
}

/// Extract geometry and frame rate from raw ffprobe JSON.
fn parse_probe(raw: &[u8], path: &Path) -> Result<(u32, u32, f64)> {
    let probe: ProbeOutput = serde_json::from_slice(raw)
        .map_err(|e| Error::Video(format!("unreadable ffprobe output: {e}")))?;
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| Error::Video(format!("no video stream in {}", path.display())))?;
    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(Error::Video(format!(
                "video stream in {} reports no geometry",
                path.display()
            )))
        }
    };
    let fps = stream
        .r_frame_rate
        .as_deref()
        .map_or(0.0, parse_fraction);
    let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };
    Ok((width, height, fps))
}

/// Parse an ffprobe fraction such as `30/1` or `24000/1001`.
fn parse_fraction(s: &str) -> f64 {
    match s.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f64>().unwrap_or(0.0);
            let den = den.parse::<f64>().unwrap_or(0.0);
            if den > 0.0 {
                num / den
            } else {
                0.0
            }
        }
        None => s.parse::<f64>().unwrap_or(0.0),
    }
}

/// Fill `buf` from the pipe. `Ok(true)` on a full frame, `Ok(false)` on
/// clean end of stream; EOF inside a frame is an error.
fn read_frame(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(Error::Video(format!(
                "truncated frame: {filled} of {} bytes",
                buf.len()
            )));
        }
        filled += n;
    }
    Ok(true)
}

/// Read the whole rawvideo stream into owned frames.
fn stream_frames(reader: &mut impl Read, width: u32, height: u32) -> Result<Vec<RgbImage>> {
    let frame_len = width as usize * height as usize * 3;
    let mut buf = vec![0_u8; frame_len];
    let mut frames = Vec::new();
    while read_frame(reader, &mut buf)? {
        let frame = RgbImage::from_raw(width, height, buf.clone())
            .ok_or_else(|| Error::Video("frame buffer size mismatch".into()))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Write frames as rgb24 rawvideo, conforming stray sizes to the stream
/// geometry.
fn write_frames(
    writer: &mut impl Write,
    frames: &[RgbImage],
    width: u32,
    height: u32,
) -> Result<()> {
    for frame in frames {
        let resized;
        let raw: &[u8] = if frame.dimensions() == (width, height) {
            frame.as_raw()
        } else {
            resized = imageops::resize(frame, width, height, imageops::FilterType::Triangle);
            resized.as_raw()
        };
        writer.write_all(raw)?;
    }
    Ok(())
}

/// Kill and reap a child whose frame stream broke, folding whatever it left
/// on stderr into the error. Every early exit from the streaming sections
/// must come through here; a dropped `Child` lingers as a zombie until the
/// parent exits.
fn reap_failed(mut child: Child, err: Error) -> Error {
    let _ = child.kill();
    let Ok(output) = child.wait_with_output() else {
        return err;
    };
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        return err;
    }
    let detail = match err {
        Error::Video(msg) => msg,
        other => other.to_string(),
    };
    Error::Video(format!("{detail} (ffmpeg: {stderr})"))
}

impl VideoIo for FfmpegPipe {
    fn decode(&self, path: &Path) -> Result<DecodedVideo> {
        let (width, height, fps) = Self::probe(path)?;
        let mut child = Command::new("ffmpeg")
            .arg("-i")
            .arg(path)
            .args(["-sws_flags", SWS_FLAGS])
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-loglevel", "error", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Video(format!("cannot run ffmpeg: {e}")))?;

        let Some(mut stdout) = child.stdout.take() else {
            return Err(reap_failed(
                child,
                Error::Video("ffmpeg stdout unavailable".into()),
            ));
        };
        let streamed = stream_frames(&mut stdout, width, height);
        drop(stdout);
        let frames = match streamed {
            Ok(frames) => frames,
            Err(e) => return Err(reap_failed(child, e)),
        };

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::Video(format!(
                "ffmpeg decode failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if frames.is_empty() {
            return Err(Error::Video(format!(
                "{} produced no frames",
                path.display()
            )));
        }
        Ok(DecodedVideo { frames, fps })
    }

    fn encode(&self, path: &Path, frames: &[RgbImage], fps: f64) -> Result<()> {
        let Some(first) = frames.first() else {
            return Err(Error::Video("nothing to encode: no frames".into()));
        };
        let (width, height) = first.dimensions();
        let fps = if fps > 0.0 { fps } else { FALLBACK_FPS };

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{width}x{height}")])
            .args(["-r", &format!("{fps}")])
            .args(["-i", "-"])
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            // keep x264 happy with odd source dimensions
            .args(["-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2"])
            .args(["-loglevel", "error"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Video(format!("cannot run ffmpeg: {e}")))?;

        let Some(mut stdin) = child.stdin.take() else {
            return Err(reap_failed(
                child,
                Error::Video("ffmpeg stdin unavailable".into()),
            ));
        };
        let streamed = write_frames(&mut stdin, frames, width, height);
        drop(stdin);
        if let Err(e) = streamed {
            return Err(reap_failed(child, e));
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::Video(format!(
                "ffmpeg encode failed on {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// In-memory adapter for tests: clips are registered up front and encode
/// captures its input instead of writing files.
#[derive(Debug, Default)]
pub struct MemoryVideoIo {
    sources: RefCell<HashMap<PathBuf, DecodedVideo>>,
    encoded: RefCell<HashMap<PathBuf, DecodedVideo>>,
}

impl MemoryVideoIo {
    /// Empty adapter with no registered clips.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clip that `decode` will return for `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, video: DecodedVideo) {
        self.sources.borrow_mut().insert(path.into(), video);
    }

    /// Output captured by `encode` for `path`, if any.
    #[must_use]
    pub fn encoded(&self, path: impl AsRef<Path>) -> Option<DecodedVideo> {
        self.encoded.borrow().get(path.as_ref()).cloned()
    }
}

impl VideoIo for MemoryVideoIo {
    fn decode(&self, path: &Path) -> Result<DecodedVideo> {
        self.sources
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Video(format!("no registered video at {}", path.display())))
    }

    fn encode(&self, path: &Path, frames: &[RgbImage], fps: f64) -> Result<()> {
        let Some(first) = frames.first() else {
            return Err(Error::Video("nothing to encode: no frames".into()));
        };
        let (width, height) = first.dimensions();
        let frames = frames
            .iter()
            .map(|f| {
                if f.dimensions() == (width, height) {
                    f.clone()
                } else {
                    imageops::resize(f, width, height, imageops::FilterType::Triangle)
                }
            })
            .collect();
        self.encoded
            .borrow_mut()
            .insert(path.to_path_buf(), DecodedVideo { frames, fps });
        Ok(())
    }
}
