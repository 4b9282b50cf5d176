use crate::dataset::{InMemorySource, SampleSource};
use crate::error::PipelineError;
use crate::sample::SampleHandle;
use crate::transforms::vision::ImageFile;
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Image extensions picked up when none are given explicitly.
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

/// A labelled image dataset laid out as one subdirectory per class.
///
/// ```text
/// root/
/// ├── benign/      → label 0
/// │   ├── 0001.png
/// │   └── ...
/// └── malignant/   → label 1
///     └── ...
/// ```
///
/// Class names are sorted, so label ids are stable across machines. Files are held as
/// lazy [`ImageFile`] handles; nothing is decoded until a batch references the sample.
///
/// # Example
/// ```ignore
/// let source = ImageFolderSource::open("./data/patches", DEFAULT_EXTENSIONS)?;
/// let config = GeneratorConfig::builder()
///     .nclasses(source.nclasses())
///     .target_size(224, 224)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageFolderSource {
    root: PathBuf,
    class_names: Vec<String>,
    paths: Vec<PathBuf>,
    inner: InMemorySource,
}

impl ImageFolderSource {
    /// Scans `root` recursively below each class directory.
    ///
    /// # Arguments
    /// - `root`: Directory whose immediate subdirectories are the classes.
    /// - `extensions`: File extensions to include (e.g., `["jpg", "png"]`). Case-insensitive.
    pub fn open(root: impl Into<PathBuf>, extensions: &[&str]) -> Result<Self> {
        let root = root.into();
        let metadata = fs::metadata(&root)
            .with_context(|| format!("Failed to access directory: {}", root.display()))?;
        if !metadata.is_dir() {
            bail!("Path is not a directory: {}", root.display());
        }
        let extensions: Vec<String> = extensions.iter().map(|s| s.to_lowercase()).collect();

        let mut class_dirs = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry
                .with_context(|| format!("Failed to read directory entry in {}", root.display()))?;
            if entry.file_type()?.is_dir() {
                class_dirs.push(entry.path());
            }
        }
        class_dirs.sort();
        ensure!(
            !class_dirs.is_empty(),
            PipelineError::config(format!("no class directories under {}", root.display()))
        );

        let mut class_names = Vec::with_capacity(class_dirs.len());
        let mut paths = Vec::new();
        let mut labels = Vec::new();
        for (label, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("Invalid class directory: {}", dir.display()))?;
            let mut files = collect_images(dir, &extensions)?;
            files.sort();
            tracing::debug!(class = %name, label, files = files.len(), "indexed class directory");
            labels.extend(std::iter::repeat(label).take(files.len()));
            paths.extend(files);
            class_names.push(name);
        }
        ensure!(
            !paths.is_empty(),
            PipelineError::config(format!("no image files found under {}", root.display()))
        );

        let samples = paths
            .iter()
            .map(|path| SampleHandle::lazy(ImageFile::new(path)))
            .collect();
        let inner = InMemorySource::new(samples, labels)?
            .with_metadata("root", root.display().to_string())
            .with_metadata("classes", class_names.join(","));

        Ok(Self {
            root,
            class_names,
            paths,
            inner,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class directory names, in label order.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn nclasses(&self) -> usize {
        self.class_names.len()
    }

    /// Path of the file behind sample `index`.
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.paths.get(index).map(|p| p.as_path())
    }
}

impl SampleSource for ImageFolderSource {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&self, index: usize) -> Result<(&SampleHandle, usize)> {
        self.inner.get(index)
    }

    fn labels(&self) -> &[usize] {
        self.inner.labels()
    }

    fn raw_data(&self) -> (Vec<SampleHandle>, Vec<usize>) {
        self.inner.raw_data()
    }
}

/// Regular files below `dir` with a matching extension. Symlinks are skipped.
fn collect_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| anyhow!("Failed to read directory entry: {}", e))?;
        if entry.path_is_symlink() || !entry.file_type().is_file() {
            continue;
        }
        let extension_matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_lowercase()));
        if extension_matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
