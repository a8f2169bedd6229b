use std::path::{Path, PathBuf};

use crate::script::slugify;

/// Base name every artifact of a script is derived from.
pub fn script_stem(script_path: &Path) -> String {
    script_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "script".to_string())
}

/// Get the clips directory for a script
pub fn get_clips_dir(clips_root: &Path, stem: &str) -> PathBuf {
    clips_root.join(stem)
}

pub fn get_draft_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}_draft.mp4", stem))
}

pub fn get_final_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}_final.mp4", stem))
}

/// Reports are named after the video they describe.
pub fn get_rating_path(video_path: &Path) -> PathBuf {
    sibling_with_suffix(video_path, "_rating.json")
}

pub fn get_safety_path(video_path: &Path) -> PathBuf {
    sibling_with_suffix(video_path, "_safety.json")
}

pub fn get_song_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}_song.mp3", stem))
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}{}", stem, suffix))
}

/// File name for the clip fetched for segment `index`.
pub fn clip_file_name(index: usize, query: &str) -> String {
    format!("segment_{:02}_{}.mp4", index, slugify(query))
}

/// Segment index encoded in a clip file name; unnumbered files sort last.
fn segment_sort_key(path: &Path) -> (usize, String) {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let index = name
        .strip_prefix("segment_")
        .and_then(|rest| rest.split('_').next())
        .and_then(|digits| digits.parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    (index, name)
}

/// Find fetched clips in segment order
pub fn find_clips_in_order(clips_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(clips_dir) else {
        return Vec::new();
    };

    let mut clips: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let is_mp4 = path
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("mp4"));
            let is_segment = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with("segment_"));
            is_mp4 && is_segment
        })
        .collect();

    clips.sort_by_key(|p| segment_sort_key(p));
    clips
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_suffix_convention() {
        let out = Path::new("/out");
        assert_eq!(get_draft_path(out, "yoga"), PathBuf::from("/out/yoga_draft.mp4"));
        let final_path = get_final_path(out, "yoga");
        assert_eq!(final_path, PathBuf::from("/out/yoga_final.mp4"));
        assert_eq!(
            get_rating_path(&final_path),
            PathBuf::from("/out/yoga_final_rating.json")
        );
        assert_eq!(
            get_safety_path(&final_path),
            PathBuf::from("/out/yoga_final_safety.json")
        );
        assert_eq!(script_stem(Path::new("scripts/yoga.txt")), "yoga");
    }

    #[test]
    fn clips_are_ordered_by_segment_number() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "segment_10_sunset.mp4",
            "segment_02_desk.mp4",
            "notes.txt",
            "segment_x_misc.mp4",
            "segment_00_runner.mp4",
        ] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let names: Vec<String> = find_clips_in_order(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "segment_00_runner.mp4",
                "segment_02_desk.mp4",
                "segment_10_sunset.mp4",
                "segment_x_misc.mp4"
            ]
        );
    }

    #[test]
    fn missing_clips_dir_is_empty() {
        assert!(find_clips_in_order(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn clip_names_are_slugged() {
        assert_eq!(clip_file_name(3, "Person at desk"), "segment_03_person_at_desk.mp4");
    }
}
