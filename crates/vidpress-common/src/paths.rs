//! Path utilities: output naming and video file detection.
//!
//! Output names are derived purely from the input name and the profile, so
//! running the same job twice targets the same file and overwrites it.

use std::path::{Path, PathBuf};

use crate::types::ProfileId;

/// List of supported video file extensions.
const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "ts", "webm", "mov", "wmv", "flv",
];

/// Derive the output path for a compression job.
///
/// The input's extension is kept and `_{profile}_compressed` is inserted
/// before it. The file lands in `output_dir` when one is given (and is not
/// empty), otherwise next to the input.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use vidpress_common::paths::output_path;
/// use vidpress_common::ProfileId;
///
/// assert_eq!(
///     output_path(Path::new("clip.mp4"), ProfileId::High, None),
///     PathBuf::from("clip_high_compressed.mp4"),
/// );
/// assert_eq!(
///     output_path(Path::new("clip.mp4"), ProfileId::High, Some(Path::new("/out"))),
///     PathBuf::from("/out/clip_high_compressed.mp4"),
/// );
/// ```
pub fn output_path(input: &Path, profile: ProfileId, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(ext) => format!("{}_{}_compressed.{}", stem, profile, ext.to_string_lossy()),
        None => format!("{}_{}_compressed", stem, profile),
    };

    match output_dir.filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => dir.join(file_name),
        None => input
            .parent()
            .map(|parent| parent.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

/// Reduce a client-supplied file name to its final component.
///
/// Returns `None` when nothing usable remains (empty, `.`, `..`).
///
/// # Examples
///
/// ```
/// use vidpress_common::paths::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("../../etc/clip.mp4").as_deref(), Some("clip.mp4"));
/// assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.mov").as_deref(), Some("clip.mov"));
/// assert_eq!(sanitize_file_name(".."), None);
/// ```
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .unwrap_or_default();

    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Check if a path has a video file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use vidpress_common::paths::is_video_file;
///
/// assert!(is_video_file(Path::new("movie.mkv")));
/// assert!(is_video_file(Path::new("/path/to/video.MP4")));
/// assert!(!is_video_file(Path::new("notes.txt")));
/// ```
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
