use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff", "tif"];

pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Ordered, de-duplicated list of files waiting to be converted.
#[derive(Debug, Clone, Default)]
pub struct InputList {
    files: Vec<PathBuf>,
}

impl InputList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files in order. Returns the paths that were refused because of
    /// their extension; duplicates are dropped silently.
    pub fn add_files<I, P>(&mut self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut rejected = Vec::new();
        for path in paths {
            let path = path.into();
            if !is_supported_image(&path) {
                log::warn!("Unsupported file format: {}", path.display());
                rejected.push(path);
                continue;
            }
            if !self.files.contains(&path) {
                self.files.push(path);
            }
        }
        rejected
    }

    /// Add every supported image under `folder`, recursively. Returns how many
    /// new files were added.
    pub fn add_folder(&mut self, folder: &Path) -> usize {
        let before = self.files.len();
        let found: Vec<PathBuf> = WalkDir::new(folder)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Skipping unreadable entry under {}: {}", folder.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| is_supported_image(path))
            .collect();
        self.add_files(found);
        let added = self.files.len() - before;
        log::info!("Added {} images from {}", added, folder.display());
        added
    }

    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        (index < self.files.len()).then(|| self.files.remove(index))
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn into_vec(self) -> Vec<PathBuf> {
        self.files
    }
}
