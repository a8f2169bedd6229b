//! Stock footage search and download (Pexels).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    artifacts::{clip_file_name, find_clips_in_order},
    error::{ReelError, Result},
    provider::{Service, check_response},
    script::Segment,
};

const RESULTS_PER_QUERY: u32 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFile {
    pub link: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoFile {
    fn is_1080p(&self) -> bool {
        self.width.unwrap_or(0) >= 1920 || self.height.unwrap_or(0) >= 1080
    }

    fn pixels(&self) -> u64 {
        u64::from(self.width.unwrap_or(0)) * u64::from(self.height.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub video_files: Vec<VideoFile>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

/// Highest-resolution file that meets the 1080p preference, else the best available.
pub fn pick_best_file(files: &[VideoFile]) -> Option<&str> {
    files
        .iter()
        .max_by_key(|f| (f.is_1080p(), f.pixels()))
        .and_then(|f| f.link.as_deref())
        .filter(|link| !link.is_empty())
}

/// First result long enough to cover `min_duration`, else the longest one.
pub fn pick_long_video(videos: &[Video], min_duration: u32) -> Option<&Video> {
    if let Some(video) = videos.iter().find(|v| v.duration >= min_duration) {
        return Some(video);
    }
    let longest = videos.iter().max_by_key(|v| v.duration)?;
    warn!(
        "No result covers {}s; using the longest ({}s), it will be tiled",
        min_duration, longest.duration
    );
    Some(longest)
}

pub struct Scout {
    http: reqwest::Client,
    api_key: String,
    base_url: &'static str,
}

impl Scout {
    pub fn new(http: reqwest::Client) -> Result<Self> {
        let api_key = Service::Pexels.validate_api_key()?;
        Ok(Self {
            http,
            api_key,
            base_url: Service::Pexels.config().base_url,
        })
    }

    pub async fn search(&self, query: &str, min_duration: Option<u32>) -> Result<Vec<Video>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("per_page", RESULTS_PER_QUERY.to_string()),
        ];
        if let Some(min) = min_duration {
            params.push(("min_duration", min.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/videos/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&params)
            .send()
            .await?;
        let response = check_response(Service::Pexels, response)
            .await?
            .json::<SearchResponse>()
            .await?;

        Ok(response.videos)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.http.get(url).send().await?;
        let bytes = check_response(Service::Pexels, response)
            .await?
            .bytes()
            .await?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn fetch_one(&self, video: Option<&Video>, query: &str, dest: &Path) -> Result<()> {
        let url = video
            .and_then(|v| pick_best_file(&v.video_files))
            .ok_or_else(|| ReelError::NoFootage {
                query: query.to_string(),
            })?;
        self.download(url, dest).await
    }

    /// Download one clip per segment, in segment order.
    pub async fn fetch_per_segment(&self, segments: &[Segment], clips_dir: &Path) -> Result<Vec<PathBuf>> {
        prepare_clips_dir(clips_dir).await?;

        let mut clips = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            let query = segment.visual_query();
            let videos = self.search(query, None).await?;
            let dest = clips_dir.join(clip_file_name(i, query));
            self.fetch_one(videos.first(), query, &dest).await?;
            info!("Fetched {:?} -> {}", query, dest.display());
            clips.push(dest);
        }
        Ok(clips)
    }

    /// Download one clip long enough to cover `min_duration` seconds, searching
    /// with the first segment's query.
    pub async fn fetch_single(&self, segments: &[Segment], clips_dir: &Path, min_duration: u32) -> Result<PathBuf> {
        let first = segments.first().ok_or(ReelError::NoSegments)?;
        prepare_clips_dir(clips_dir).await?;

        let query = first.visual_query();
        let videos = self.search(query, Some(min_duration)).await?;
        let dest = clips_dir.join(clip_file_name(0, query));
        self.fetch_one(pick_long_video(&videos, min_duration), query, &dest)
            .await?;
        info!("Fetched {:?} -> {}", query, dest.display());
        Ok(dest)
    }
}

/// Create the clips directory and clear clips left by an earlier fetch.
async fn prepare_clips_dir(clips_dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(clips_dir).await?;
    for stale in find_clips_in_order(clips_dir) {
        tokio::fs::remove_file(&stale).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(link: &str, width: u32, height: u32) -> VideoFile {
        VideoFile {
            link: Some(link.to_string()),
            width: Some(width),
            height: Some(height),
        }
    }

    fn video(duration: u32) -> Video {
        Video {
            duration,
            video_files: vec![file(&format!("https://cdn/{duration}.mp4"), 1920, 1080)],
        }
    }

    #[test]
    fn prefers_1080p_then_resolution() {
        let files = vec![
            file("sd", 960, 540),
            file("hd", 1920, 1080),
            file("uhd", 3840, 2160),
            file("odd", 1800, 1000),
        ];
        assert_eq!(pick_best_file(&files), Some("uhd"));
    }

    #[test]
    fn portrait_1080_counts_as_1080p() {
        let files = vec![file("wide", 1600, 900), file("portrait", 1080, 1920)];
        assert_eq!(pick_best_file(&files), Some("portrait"));
    }

    #[test]
    fn falls_back_to_best_available() {
        let files = vec![file("small", 640, 360), file("medium", 1280, 720)];
        assert_eq!(pick_best_file(&files), Some("medium"));
    }

    #[test]
    fn no_link_means_no_pick() {
        let files = vec![VideoFile {
            link: None,
            width: Some(1920),
            height: Some(1080),
        }];
        assert_eq!(pick_best_file(&files), None);
        assert_eq!(pick_best_file(&[]), None);
    }

    #[test]
    fn long_video_prefers_first_that_covers() {
        let videos = vec![video(12), video(40), video(60)];
        assert_eq!(pick_long_video(&videos, 30).map(|v| v.duration), Some(40));
        assert_eq!(pick_long_video(&videos, 90).map(|v| v.duration), Some(60));
        assert!(pick_long_video(&[], 30).is_none());
    }

    #[test]
    fn search_payload_parses() {
        let parsed: SearchResponse = serde_json::from_str(
            r#"{"page": 1, "videos": [{"id": 7, "duration": 14,
                "video_files": [{"link": "https://x/1.mp4", "width": 1920, "height": 1080, "quality": "hd"},
                                {"link": "https://x/2.mp4", "width": null, "height": null}]}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.videos[0].duration, 14);
        assert_eq!(pick_best_file(&parsed.videos[0].video_files), Some("https://x/1.mp4"));
    }

    #[tokio::test]
    async fn stale_clips_are_cleared() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("segment_00_old.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"").unwrap();

        prepare_clips_dir(dir.path()).await.unwrap();
        assert!(!dir.path().join("segment_00_old.mp4").exists());
        assert!(dir.path().join("keep.txt").exists());
    }
}
