//! Artifact discovery
//!
//! The engine nests its output under a directory named after the scratch
//! file and, for videos, a quality-coded subdirectory:
//!
//! ```text
//! <media>/videos/<scene file stem>/<quality dir>/<scene>.<format>
//! <media>/images/<scene file stem>/<scene>[version suffix].png
//! ```
//!
//! The exact layout varies between engine versions, so the locator runs an
//! ordered search and stops at the first hit:
//! 1. the exact expected path
//! 2. a file in the expected directory whose name starts with the scene name
//! 3. any file in the expected directory with the expected extension
//! 4. a recursive search of the whole `videos/` or `images/` tree
//!
//! Videos are searched before still images.

use scenery_core::domain::config::Quality;
use scenery_core::domain::result::{Artifact, ArtifactKind};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::execution::JobIdentity;

/// Extensions accepted by the recursive search
pub const MEDIA_EXTENSIONS: [&str; 5] = ["mp4", "mov", "webm", "gif", "png"];

const IMAGE_EXTENSION: &str = "png";

/// Finds the output file a render produced
///
/// Read-only: never creates, moves or deletes anything under the media root.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactLocator;

impl ArtifactLocator {
    pub fn new() -> Self {
        Self
    }

    /// Locates the artifact for a finished job
    ///
    /// # Arguments
    /// * `identity` - Scratch file, scene name and media root of the job
    /// * `quality` - Quality tier the job was rendered at
    /// * `format` - Requested video container/extension
    ///
    /// # Returns
    /// The artifact, or `None` if nothing matching exists. A missing media
    /// root is not an error.
    pub fn find(&self, identity: &JobIdentity, quality: Quality, format: &str) -> Option<Artifact> {
        let stem = identity.scene_file_stem();

        let videos = identity.media_dir.join("videos");
        let video_dir = videos.join(&stem).join(quality.dir_name());
        if let Some(path) = search(&video_dir, &videos, &identity.scene_name, format) {
            return Some(Artifact {
                path,
                kind: ArtifactKind::Video,
            });
        }

        let images = identity.media_dir.join("images");
        let image_dir = images.join(&stem);
        search(&image_dir, &images, &identity.scene_name, IMAGE_EXTENSION).map(|path| Artifact {
            path,
            kind: ArtifactKind::Image,
        })
    }

    /// Same as [`find`](Self::find) for a quality given as free text, such as
    /// a value read from settings. Unknown values use the low-quality
    /// directory.
    pub fn find_lossy(&self, identity: &JobIdentity, quality: &str, format: &str) -> Option<Artifact> {
        self.find(identity, Quality::from_str_lossy(quality), format)
    }
}

/// Runs the four search tiers for one media kind
fn search(dir: &Path, tree: &Path, scene_name: &str, extension: &str) -> Option<PathBuf> {
    let exact = dir.join(format!("{}.{}", scene_name, extension));
    if exact.is_file() {
        debug!("Artifact found at expected path {}", exact.display());
        return Some(exact);
    }

    let files = list_files(dir);

    if let Some(path) = files.iter().find(|p| file_name(p).starts_with(scene_name)) {
        debug!("Artifact found by name prefix: {}", path.display());
        return Some(path.clone());
    }

    if let Some(path) = files.iter().find(|p| has_extension(p, extension)) {
        debug!("Artifact found by extension: {}", path.display());
        return Some(path.clone());
    }

    let found = find_recursive(tree, scene_name);
    if let Some(path) = &found {
        debug!("Artifact found by recursive search: {}", path.display());
    }
    found
}

/// Regular files directly inside `dir`, sorted by name
fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    files
}

/// First `<scene_name>.<media ext>` anywhere under `tree`
fn find_recursive(tree: &Path, scene_name: &str) -> Option<PathBuf> {
    if !tree.is_dir() {
        return None;
    }

    WalkDir::new(tree)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .find(|path| {
            let stem_matches = path
                .file_stem()
                .map(|s| s.to_string_lossy() == scene_name)
                .unwrap_or(false);
            stem_matches && MEDIA_EXTENSIONS.iter().any(|ext| has_extension(path, ext))
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Copies an artifact into `dest_dir`, creating it if needed
///
/// # Returns
/// Path of the copy
pub fn export_artifact(artifact: &Artifact, dest_dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dest_dir)?;
    let name = artifact.path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("artifact path {} has no file name", artifact.path.display()),
        )
    })?;
    let dest = dest_dir.join(name);
    std::fs::copy(&artifact.path, &dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity(media: &Path, scene: &str) -> JobIdentity {
        JobIdentity {
            scene_file: PathBuf::from(format!("/scratch/job/{}.py", scene)),
            scene_name: scene.to_string(),
            media_dir: media.to_path_buf(),
        }
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_exact_path_wins() {
        let media = TempDir::new().unwrap();
        let quality_dir = media.path().join("videos/Demo/480p15");
        touch(&quality_dir.join("Demo.mp4"));
        touch(&quality_dir.join("Demo_v2.mp4"));
        touch(&quality_dir.join("Another.mp4"));
        touch(&media.path().join("videos/Other/720p30/Demo.mp4"));

        let artifact = ArtifactLocator::new()
            .find(&identity(media.path(), "Demo"), Quality::Low, "mp4")
            .unwrap();
        assert_eq!(artifact.path, quality_dir.join("Demo.mp4"));
        assert_eq!(artifact.kind, ArtifactKind::Video);
    }

    #[test]
    fn test_prefix_match_for_versioned_names() {
        let media = TempDir::new().unwrap();
        let quality_dir = media.path().join("videos/Demo/1080p60");
        touch(&quality_dir.join("Aaa.mp4"));
        touch(&quality_dir.join("Demo_ManimCE_v0.18.1.mp4"));

        let artifact = ArtifactLocator::new()
            .find(&identity(media.path(), "Demo"), Quality::High, "mp4")
            .unwrap();
        assert_eq!(artifact.path, quality_dir.join("Demo_ManimCE_v0.18.1.mp4"));
    }

    #[test]
    fn test_any_file_with_extension() {
        let media = TempDir::new().unwrap();
        let quality_dir = media.path().join("videos/Demo/720p30");
        std::fs::create_dir_all(quality_dir.join("partial_movie_files")).unwrap();
        touch(&quality_dir.join("notes.txt"));
        touch(&quality_dir.join("render.mov"));

        let artifact = ArtifactLocator::new()
            .find(&identity(media.path(), "Demo"), Quality::Medium, "mov")
            .unwrap();
        assert_eq!(artifact.path, quality_dir.join("render.mov"));
    }

    #[test]
    fn test_recursive_search() {
        let media = TempDir::new().unwrap();
        let elsewhere = media.path().join("videos/renamed/custom/Demo.webm");
        touch(&elsewhere);
        touch(&media.path().join("videos/renamed/custom/Demo.log"));

        let artifact = ArtifactLocator::new()
            .find(&identity(media.path(), "Demo"), Quality::Low, "mp4")
            .unwrap();
        assert_eq!(artifact.path, elsewhere);
    }

    #[test]
    fn test_still_image() {
        let media = TempDir::new().unwrap();
        let image = media.path().join("images/Still/Still_ManimCE_v0.18.1.png");
        touch(&image);

        let artifact = ArtifactLocator::new()
            .find(&identity(media.path(), "Still"), Quality::Low, "mp4")
            .unwrap();
        assert_eq!(artifact.path, image);
        assert_eq!(artifact.kind, ArtifactKind::Image);
    }

    #[test]
    fn test_unknown_quality_uses_low_directory() {
        let media = TempDir::new().unwrap();
        let low = media.path().join("videos/Demo/480p15/Demo.mp4");
        touch(&low);

        let artifact = ArtifactLocator::new()
            .find_lossy(&identity(media.path(), "Demo"), "cinematic", "mp4")
            .unwrap();
        assert_eq!(artifact.path, low);
    }

    #[test]
    fn test_not_found() {
        let media = TempDir::new().unwrap();
        let locator = ArtifactLocator::new();
        assert!(locator
            .find(&identity(media.path(), "Demo"), Quality::Low, "mp4")
            .is_none());

        touch(&media.path().join("videos/Demo/480p15/unrelated.txt"));
        assert!(locator
            .find(&identity(media.path(), "Demo"), Quality::Low, "mp4")
            .is_none());

        let missing = media.path().join("does-not-exist");
        assert!(locator.find(&identity(&missing, "Demo"), Quality::Low, "mp4").is_none());
    }

    #[test]
    fn test_export_artifact() {
        let media = TempDir::new().unwrap();
        let source = media.path().join("videos/Demo/480p15/Demo.mp4");
        touch(&source);
        let artifact = Artifact {
            path: source,
            kind: ArtifactKind::Video,
        };

        let dest = media.path().join("project/output");
        let copied = export_artifact(&artifact, &dest).unwrap();
        assert_eq!(copied, dest.join("Demo.mp4"));
        assert_eq!(std::fs::read(&copied).unwrap(), b"data");
    }
}
