use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Where uploaded song files end up.
pub trait UploadBackend: Send + Sync {
    /// Reserves a fresh path for a file originally named `file_name`.
    fn allocate(&self, file_name: &str) -> io::Result<PathBuf>;

    fn discard(&self, path: &Path);
}

#[derive(Debug, Clone)]
pub struct LocalUploads {
    base_dir: PathBuf,
}

impl LocalUploads {
    pub fn new(base_dir: &Path) -> LocalUploads {
        LocalUploads {
            base_dir: base_dir.to_owned(),
        }
    }
}

impl UploadBackend for LocalUploads {
    fn allocate(&self, file_name: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.base_dir)?;
        let prefix = Uuid::new_v4().simple();
        let path = self.base_dir.join(format!("{}_{}", prefix, sanitize(file_name)));
        debug!(path = %path.display(), "allocated upload path");
        Ok(path)
    }

    fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove upload");
        }
    }
}

/// Keeps the last path component and replaces anything outside
/// `[A-Za-z0-9._-]`.
fn sanitize(file_name: &str) -> String {
    let base = file_name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "upload".to_owned();
    }
    cleaned.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_file_names() {
        assert_eq!(sanitize("song.mp3"), "song.mp3");
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("C:\\music\\my song!.ogg"), "my_song_.ogg");
        assert_eq!(sanitize(".."), "upload");
        assert_eq!(sanitize(""), "upload");
    }

    #[test]
    fn allocates_inside_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = LocalUploads::new(&dir.path().join("songs"));
        let path = uploads.allocate("track.mp3").unwrap();
        assert!(path.starts_with(dir.path().join("songs")));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_track.mp3"));

        fs::write(&path, b"data").unwrap();
        uploads.discard(&path);
        assert!(!path.exists());
    }

    #[test]
    fn same_name_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = LocalUploads::new(dir.path());
        let first = uploads.allocate("track.mp3").unwrap();
        let second = uploads.allocate("track.mp3").unwrap();
        assert_ne!(first, second);
    }
}
