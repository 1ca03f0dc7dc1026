//! Media classification and summarization.
//!
//! Summaries become the searchable text of ingested media. Every path here
//! degrades to a placeholder instead of failing, so ingestion never depends on
//! the vision provider being up.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use viking_model::VisionProvider;

/// Image extensions (lowercase, with dot).
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp", ".svg", ".tif", ".tiff", ".ico", ".heic",
];

/// Audio extensions (lowercase, with dot).
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".flac", ".ogg", ".m4a", ".aac", ".opus"];

/// Video extensions (lowercase, with dot).
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mkv", ".webm", ".m4v"];

/// Summary used when an image is SVG.
pub const SVG_SUMMARY: &str = "SVG image (format not supported by VLM)";

/// Summary used when the vision call fails.
pub const IMAGE_FAILED_SUMMARY: &str = "Image summary generation failed";

/// Summary used when no vision provider is configured.
pub const NO_VISION_SUMMARY: &str = "Image summary unavailable (no vision provider configured)";

/// Placeholder summary for audio.
pub const AUDIO_SUMMARY: &str = "Audio summary generation not yet implemented";

/// Placeholder summary for video.
pub const VIDEO_SUMMARY: &str = "Video summary generation not yet implemented";

const IMAGE_PROMPT: &str = "Describe this image in two or three sentences for a search index. \
Mention visible text, objects, and the overall subject.";

// ============================================================================
// MediaKind
// ============================================================================

/// Kind of media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Singular name (`image`, `audio`, `video`).
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// Directory name under `viking://resources`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a file by explicit format, falling back to its extension.
pub fn media_type(path: Option<&str>, format: Option<&str>) -> Option<MediaKind> {
    match format {
        Some("image") => return Some(MediaKind::Image),
        Some("audio") => return Some(MediaKind::Audio),
        Some("video") => return Some(MediaKind::Video),
        _ => {}
    }

    let ext = Path::new(path?)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Directory for media ingested on `date`:
/// `viking://resources/{images|audio|video}/{YYYYMMDD}`.
pub fn media_base_uri(kind: MediaKind, date: NaiveDate) -> String {
    format!(
        "viking://resources/{}/{}",
        kind.dir_name(),
        date.format("%Y%m%d")
    )
}

fn is_svg(data: &[u8]) -> bool {
    data.starts_with(b"<svg")
        || (data.starts_with(b"<?xml")
            && data[..data.len().min(100)]
                .windows(4)
                .any(|w| w == b"<svg"))
}

// ============================================================================
// MediaSummarizer
// ============================================================================

/// A generated summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    /// Original file name.
    pub name: String,
    /// Summary text.
    pub summary: String,
}

/// Summarizes media with a bounded number of concurrent vision calls.
#[derive(Debug, Clone)]
pub struct MediaSummarizer {
    vision: Option<Arc<dyn VisionProvider>>,
    llm_sem: Arc<Semaphore>,
}

impl MediaSummarizer {
    /// Create a summarizer allowing `max_concurrent_llm` simultaneous calls.
    pub fn new(vision: Option<Arc<dyn VisionProvider>>, max_concurrent_llm: usize) -> Self {
        Self {
            vision,
            llm_sem: Arc::new(Semaphore::new(max_concurrent_llm.max(1))),
        }
    }

    /// Summarize a media file of the given kind.
    pub async fn summarize(&self, kind: MediaKind, name: &str, data: &[u8]) -> MediaSummary {
        match kind {
            MediaKind::Image => self.summarize_image(name, data).await,
            MediaKind::Audio => MediaSummary {
                name: name.to_string(),
                summary: AUDIO_SUMMARY.to_string(),
            },
            MediaKind::Video => MediaSummary {
                name: name.to_string(),
                summary: VIDEO_SUMMARY.to_string(),
            },
        }
    }

    /// Summarize an image with the vision provider.
    pub async fn summarize_image(&self, name: &str, data: &[u8]) -> MediaSummary {
        let summary = |text: &str| MediaSummary {
            name: name.to_string(),
            summary: text.to_string(),
        };

        if is_svg(data) {
            info!(name, "SVG image detected, skipping vision analysis");
            return summary(SVG_SUMMARY);
        }
        let Some(vision) = &self.vision else {
            return summary(NO_VISION_SUMMARY);
        };

        let result = match self.llm_sem.acquire().await {
            Ok(_permit) => {
                vision
                    .vision_completion(IMAGE_PROMPT, &[data.to_vec()])
                    .await
            }
            Err(_) => return summary(IMAGE_FAILED_SUMMARY),
        };

        match result {
            Ok(text) => summary(text.trim()),
            Err(e) => {
                warn!(name, model = vision.model_id(), "image summary failed: {}", e);
                summary(IMAGE_FAILED_SUMMARY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use viking_model::{ModelError, ModelResult};

    #[derive(Debug, Default)]
    struct CountingVision {
        active: AtomicUsize,
        peak: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl VisionProvider for CountingVision {
        async fn vision_completion(&self, _prompt: &str, images: &[Vec<u8>]) -> ModelResult<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                return Err(ModelError::completion_failed("vlm", "overloaded"));
            }
            Ok(format!("  an image of {} bytes \n", images[0].len()))
        }

        fn model_id(&self) -> &str {
            "vlm"
        }
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type(Some("a/photo.PNG"), None), Some(MediaKind::Image));
        assert_eq!(media_type(Some("talk.mp3"), None), Some(MediaKind::Audio));
        assert_eq!(media_type(Some("clip.mkv"), None), Some(MediaKind::Video));
        assert_eq!(media_type(Some("notes.md"), None), None);
        assert_eq!(media_type(Some("notes.md"), Some("video")), Some(MediaKind::Video));
        assert_eq!(media_type(None, Some("pdf")), None);
    }

    #[test]
    fn test_media_base_uri() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 19).unwrap();
        assert_eq!(
            media_base_uri(MediaKind::Image, date),
            "viking://resources/images/20250219"
        );
        assert_eq!(
            media_base_uri(MediaKind::Audio, date),
            "viking://resources/audio/20250219"
        );
    }

    #[tokio::test]
    async fn test_svg_and_missing_provider_placeholders() {
        let summarizer = MediaSummarizer::new(None, 2);
        let svg = summarizer.summarize_image("logo.svg", b"<svg xmlns=''/>").await;
        assert_eq!(svg.summary, SVG_SUMMARY);

        let xml_svg = summarizer
            .summarize_image("logo.svg", b"<?xml version='1.0'?><svg/>")
            .await;
        assert_eq!(xml_svg.summary, SVG_SUMMARY);

        let png = summarizer.summarize_image("a.png", &[0x89, b'P', b'N', b'G']).await;
        assert_eq!(png.summary, NO_VISION_SUMMARY);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades() {
        let vision = Arc::new(CountingVision {
            fail: true,
            ..Default::default()
        });
        let summarizer = MediaSummarizer::new(Some(vision), 1);
        let out = summarizer.summarize_image("a.png", b"data").await;
        assert_eq!(out.summary, IMAGE_FAILED_SUMMARY);
        assert_eq!(out.name, "a.png");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let vision = Arc::new(CountingVision::default());
        let summarizer = MediaSummarizer::new(Some(vision.clone()), 2);

        let calls = (0..6).map(|i| {
            let summarizer = summarizer.clone();
            tokio::spawn(async move { summarizer.summarize_image(&format!("{}.png", i), b"abc").await })
        });
        for call in calls.collect::<Vec<_>>() {
            let out = call.await.unwrap();
            assert_eq!(out.summary, "an image of 3 bytes");
        }
        assert!(vision.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_audio_video_placeholders() {
        let summarizer = MediaSummarizer::new(None, 1);
        assert_eq!(
            summarizer.summarize(MediaKind::Audio, "a.mp3", b"").await.summary,
            AUDIO_SUMMARY
        );
        assert_eq!(
            summarizer.summarize(MediaKind::Video, "v.mp4", b"").await.summary,
            VIDEO_SUMMARY
        );
    }
}
