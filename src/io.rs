use std::path::{Path, PathBuf};

use tokio::fs::{canonicalize, create_dir, create_dir_all, remove_dir_all, remove_file, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;

/// Creates the photo directory and returns its absolute form, so stored image paths
/// keep pointing at the same files whatever the working directory.
pub async fn prepare_io<P: AsRef<Path>>(dir: P) -> anyhow::Result<PathBuf> {
    create_dir_all(dir.as_ref()).await?;
    let dir = canonicalize(dir.as_ref()).await?;
    log::info!("Storing reference photos in {}", dir.display());
    Ok(dir)
}

/// Durable home for reference photos.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub async fn store(&self, bytes: &[u8], original_filename: &str) -> std::io::Result<PathBuf> {
        store_image(bytes, original_filename, &self.root).await
    }

    /// Best effort: a photo that cannot be removed is logged and left behind.
    pub async fn discard(&self, path: &Path) {
        match remove_file(path).await {
            Ok(()) => log::debug!("Removed image {}", path.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Image {} was already gone", path.display())
            }
            Err(err) => log::warn!("Error deleting image file {}: {}", path.display(), err),
        }
    }
}

/// A submitted photo kept in its own scratch directory under the system temp dir.
/// Call [`TransientImage::discard`] when done; dropping it schedules the removal instead.
#[derive(Debug)]
pub struct TransientImage {
    path: PathBuf,
    dir: Option<PathBuf>,
}

impl TransientImage {
    pub async fn store(bytes: &[u8], original_filename: &str) -> std::io::Result<Self> {
        let dir = std::env::temp_dir().join(format!("attendance-{}", Uuid::new_v4()));
        create_dir(&dir).await?;
        let mut image = Self {
            path: PathBuf::new(),
            dir: Some(dir.clone()),
        };
        image.path = store_image(bytes, original_filename, &dir).await?;
        Ok(image)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn discard(mut self) {
        if let Some(dir) = self.dir.take() {
            remove_scratch_dir(dir).await;
        }
    }
}

impl Drop for TransientImage {
    fn drop(&mut self) {
        let dir = match self.dir.take() {
            Some(dir) => dir,
            None => return,
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(remove_scratch_dir(dir));
            }
            Err(_) => {
                if let Err(err) = std::fs::remove_dir_all(&dir) {
                    log::warn!("Error deleting scratch directory {}: {}", dir.display(), err);
                }
            }
        }
    }
}

async fn remove_scratch_dir(dir: PathBuf) {
    match remove_dir_all(&dir).await {
        Ok(()) => log::debug!("Removed scratch directory {}", dir.display()),
        Err(err) => log::warn!("Error deleting scratch directory {}: {}", dir.display(), err),
    }
}

pub fn unique_filename(original_filename: &str) -> String {
    let ext = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4(), ext)
}

pub async fn store_image(
    bytes: &[u8],
    original_filename: &str,
    directory: &Path,
) -> std::io::Result<PathBuf> {
    let path = directory.join(unique_filename(original_filename));
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(path)
}
