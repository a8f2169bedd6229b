use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use tracing::{info, warn};

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "m4a", "ogg", "wav"];

/// Mood name to the preferred track stem.
pub fn preferred_stem(mood: &str) -> &'static str {
    match mood.to_ascii_lowercase().as_str() {
        "uplifting" | "energetic" => "uplifting",
        "calm" => "calm",
        "motivational" => "motivational",
        "meditation" => "meditation",
        _ => "neutral",
    }
}

fn list_tracks(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut tracks: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                AUDIO_EXTENSIONS.contains(&ext.as_str())
            })
        })
        .collect();
    tracks.sort();
    tracks
}

/// Pick a track from `dir`: the mood-named one if present, else any track at random.
pub fn pick_from(dir: &Path, mood: &str) -> Option<PathBuf> {
    let tracks = list_tracks(dir);
    let preferred = preferred_stem(mood);

    if let Some(track) = tracks.iter().find(|t| {
        t.file_stem()
            .is_some_and(|s| s.to_string_lossy().eq_ignore_ascii_case(preferred))
    }) {
        return Some(track.clone());
    }
    tracks.choose(&mut rand::thread_rng()).cloned()
}

/// Pick background music from the project library, falling back to the
/// user's audio directory.
pub fn pick_local_music(music_dir: &Path, mood: &str) -> Option<PathBuf> {
    let candidates = std::iter::once(music_dir.to_path_buf()).chain(dirs::audio_dir());
    for dir in candidates {
        if let Some(track) = pick_from(&dir, mood) {
            info!("Picked music {}", track.display());
            return Some(track);
        }
    }
    warn!(
        "No music tracks in {} (add calm.mp3, uplifting.mp3, ...)",
        music_dir.display()
    );
    None
}
