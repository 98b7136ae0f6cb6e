//! 帧来源：图片目录 / 已解码帧

use super::frame::{Frame, RawFrame};
use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source not found: {0}")]
    NotFound(PathBuf),

    #[error("No image files in {0}")]
    NoImages(PathBuf),

    #[error("Failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("Frame index {index} out of range (source has {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Unsupported source: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 有限、有序、可随机访问的帧序列
pub trait FrameSource: Send {
    /// 用于日志和报告的名字
    fn name(&self) -> String;

    /// 源内总帧数
    fn total_frames(&self) -> usize;

    /// 解码第 index 帧
    fn read_frame(&mut self, index: usize) -> Result<Frame, SourceError>;
}

/// 排序后的图片目录，优先使用 `<dir>/images/`
#[derive(Debug, Clone)]
pub struct ImageDirectorySource {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl ImageDirectorySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let root = path.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(SourceError::NotFound(root));
        }

        let nested = root.join("images");
        let image_dir = if nested.is_dir() { nested } else { root.clone() };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&image_dir)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, &IMAGE_EXTENSIONS) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(SourceError::NoImages(image_dir));
        }

        info!("📂 Image directory {:?}: {} images", image_dir, files.len());
        Ok(Self { root, files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl FrameSource for ImageDirectorySource {
    fn name(&self) -> String {
        self.root.display().to_string()
    }

    fn total_frames(&self) -> usize {
        self.files.len()
    }

    fn read_frame(&mut self, index: usize) -> Result<Frame, SourceError> {
        let path = self.files.get(index).ok_or(SourceError::OutOfRange {
            index,
            len: self.files.len(),
        })?;
        let image = image::open(path).map_err(|e| SourceError::Decode {
            index,
            reason: format!("{}: {}", path.display(), e),
        })?;
        Ok(Frame::from_image(image.to_rgba8(), index as u64))
    }
}

/// 已解码的帧（外部视频解码器的接入点）
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    frames: Vec<Frame>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            frames,
        }
    }

    /// 平面不完整的 YUV 帧直接丢弃
    pub fn from_raw_frames(name: impl Into<String>, raw_frames: &[RawFrame]) -> Self {
        let frames = raw_frames
            .iter()
            .filter_map(|raw| {
                let frame = raw.to_frame();
                if frame.is_none() {
                    warn!("⚠️ Dropping raw frame {}: incomplete planes", raw.frame_number);
                }
                frame
            })
            .collect();
        Self::new(name, frames)
    }
}

impl FrameSource for MemorySource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn total_frames(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(&mut self, index: usize) -> Result<Frame, SourceError> {
        self.frames
            .get(index)
            .cloned()
            .ok_or(SourceError::OutOfRange {
                index,
                len: self.frames.len(),
            })
    }
}

/// 按路径打开来源；视频文件需要外部解码后通过 MemorySource 传入
pub fn open_source(path: impl AsRef<Path>) -> Result<ImageDirectorySource, SourceError> {
    let path = path.as_ref();
    if path.is_dir() {
        return ImageDirectorySource::open(path);
    }
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    if has_extension(path, &VIDEO_EXTENSIONS) {
        return Err(SourceError::Unsupported(format!(
            "{}: video decoding is external, feed decoded frames through MemorySource",
            path.display()
        )));
    }
    Err(SourceError::Unsupported(path.display().to_string()))
}

/// 均匀采样下标：round(i * (L-1) / (K-1))，K >= L 时返回全部
pub fn sample_indices(total: usize, count: usize) -> Vec<usize> {
    if total == 0 || count == 0 {
        return Vec::new();
    }
    if count >= total {
        return (0..total).collect();
    }
    if count == 1 {
        return vec![0];
    }

    let span = (total - 1) as f64;
    let steps = (count - 1) as f64;
    (0..count)
        .map(|i| (i as f64 * span / steps).round() as usize)
        .collect()
}

/// 均匀抽取最多 count 帧，解码失败的帧跳过
pub fn extract_uniform<S: FrameSource + ?Sized>(
    source: &mut S,
    count: usize,
    max_edge: Option<u32>,
) -> Vec<Frame> {
    let total = source.total_frames();
    let indices = sample_indices(total, count);

    let mut frames = Vec::with_capacity(indices.len());
    for index in indices {
        match source.read_frame(index) {
            Ok(frame) => {
                let frame = match max_edge {
                    Some(edge) => frame.fit_within(edge),
                    None => frame,
                };
                frames.push(frame);
            }
            Err(e) => warn!("⚠️ Skipping frame {} of {}: {}", index, source.name(), e),
        }
    }

    info!(
        "🎬 Extracted {} frames from {} (source has {})",
        frames.len(),
        source.name(),
        total
    );
    frames
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}
