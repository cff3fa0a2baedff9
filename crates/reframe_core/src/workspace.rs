//! Per-target temporary working areas.
//!
//! Each target media path gets its own directory under the temp root,
//! named after the file stem plus a short hash of the full path so two
//! targets with the same file name never share an area. The directory
//! holds the intermediate file `temp.<ext>` and extracted frames
//! `%08d.<format>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Temp area manager rooted at a configured folder.
#[derive(Debug, Clone)]
pub struct TempWorkspace {
    root: PathBuf,
}

impl TempWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory for a target.
    pub fn directory(&self, target: &Path) -> PathBuf {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "target".to_string());
        let digest = format!("{:x}", md5::compute(target.to_string_lossy().as_bytes()));
        self.root.join(format!("{}-{}", stem, &digest[..8]))
    }

    /// Intermediate file inside the working directory, keeping the
    /// target's extension.
    pub fn temp_file_path(&self, target: &Path) -> PathBuf {
        let extension = target
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tmp".to_string());
        self.directory(target).join(format!("temp.{}", extension))
    }

    /// Printf-style frame pattern handed to the frame extractor.
    pub fn frame_pattern(&self, target: &Path, format: &str) -> PathBuf {
        self.directory(target).join(format!("%08d.{}", format))
    }

    /// Extracted frames in frame order. An absent directory has no frames.
    pub fn frame_paths(&self, target: &Path, format: &str) -> io::Result<Vec<PathBuf>> {
        let directory = self.directory(target);
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(format)
                    && path.file_stem().and_then(|s| s.to_str()) != Some("temp")
            })
            .collect();
        frames.sort();
        Ok(frames)
    }

    /// Fresh, empty working directory for a target.
    pub fn create(&self, target: &Path) -> io::Result<PathBuf> {
        self.clear(target)?;
        let directory = self.directory(target);
        fs::create_dir_all(&directory)?;
        tracing::debug!("Created workspace {}", directory.display());
        Ok(directory)
    }

    /// Remove a target's working directory. Clearing twice is fine.
    pub fn clear(&self, target: &Path) -> io::Result<()> {
        let directory = self.directory(target);
        match fs::remove_dir_all(&directory) {
            Ok(()) => {
                tracing::debug!("Cleared workspace {}", directory.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Move the intermediate file to `output`, replacing any existing file.
    pub fn move_out(&self, target: &Path, output: &Path) -> io::Result<()> {
        let temp_file = self.temp_file_path(target);
        if !temp_file.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no intermediate file at {}", temp_file.display()),
            ));
        }

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        if output.is_file() {
            fs::remove_file(output)?;
        }

        // Rename fails across filesystems; fall back to copy.
        if fs::rename(&temp_file, output).is_err() {
            fs::copy(&temp_file, output)?;
            fs::remove_file(&temp_file)?;
        }
        Ok(())
    }

    /// Guard that clears the target's working directory on drop.
    pub fn guard<'a>(&'a self, target: &'a Path) -> WorkspaceGuard<'a> {
        WorkspaceGuard {
            workspace: self,
            target,
        }
    }
}

/// Clears a working directory when dropped.
#[derive(Debug)]
pub struct WorkspaceGuard<'a> {
    workspace: &'a TempWorkspace,
    target: &'a Path,
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.workspace.clear(self.target) {
            tracing::warn!(
                "Failed to clear workspace for {}: {}",
                self.target.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directories_do_not_alias_same_file_names() {
        let workspace = TempWorkspace::new("/tmp/reframe");
        let a = workspace.directory(Path::new("/a/clip.mp4"));
        let b = workspace.directory(Path::new("/b/clip.mp4"));
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("clip-"));
    }

    #[test]
    fn temp_file_keeps_target_extension() {
        let workspace = TempWorkspace::new("/tmp/reframe");
        let target = Path::new("/media/photo.jpg");
        assert_eq!(
            workspace.temp_file_path(target),
            workspace.directory(target).join("temp.jpg")
        );
        assert_eq!(
            workspace.frame_pattern(target, "png"),
            workspace.directory(target).join("%08d.png")
        );
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        let target = Path::new("/media/clip.mp4");

        let created = workspace.create(target).unwrap();
        fs::write(created.join("00000001.png"), b"x").unwrap();

        workspace.clear(target).unwrap();
        assert!(!created.exists());
        workspace.clear(target).unwrap();
    }

    #[test]
    fn create_starts_empty() {
        let dir = tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        let target = Path::new("/media/clip.mp4");

        let created = workspace.create(target).unwrap();
        fs::write(created.join("stale.png"), b"x").unwrap();

        let recreated = workspace.create(target).unwrap();
        assert_eq!(fs::read_dir(recreated).unwrap().count(), 0);
    }

    #[test]
    fn frames_are_sorted_and_exclude_temp_file() {
        let dir = tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        let target = Path::new("/media/clip.png");

        let created = workspace.create(target).unwrap();
        for name in ["00000002.png", "00000001.png", "temp.png", "notes.txt"] {
            fs::write(created.join(name), b"x").unwrap();
        }

        let frames = workspace.frame_paths(target, "png").unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["00000001.png", "00000002.png"]);

        workspace.clear(target).unwrap();
        assert!(workspace.frame_paths(target, "png").unwrap().is_empty());
    }

    #[test]
    fn move_out_relocates_intermediate_file() {
        let dir = tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path().join("temp"));
        let target = Path::new("/media/clip.mp4");
        workspace.create(target).unwrap();
        fs::write(workspace.temp_file_path(target), b"video").unwrap();

        let output = dir.path().join("out").join("result.mp4");
        workspace.move_out(target, &output).unwrap();

        assert_eq!(fs::read(&output).unwrap(), b"video");
        assert!(!workspace.temp_file_path(target).exists());
        assert!(workspace.move_out(target, &output).is_err());
    }

    #[test]
    fn guard_clears_on_drop() {
        let dir = tempdir().unwrap();
        let workspace = TempWorkspace::new(dir.path());
        let target = Path::new("/media/clip.mp4");
        let created = workspace.create(target).unwrap();
        {
            let _guard = workspace.guard(target);
        }
        assert!(!created.exists());
    }
}
