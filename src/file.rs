use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt};

/// Backing store for media bytes, addressed by storage locators.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Readable handle returned by [`Storage::open_at`].
    type Handle: AsyncRead + Send + Unpin + 'static;

    /// Whether `locator` names an object that exists and can be read.
    async fn is_accessible(&self, locator: &str) -> bool;

    /// Current size of the object in bytes, read from the store itself.
    async fn size(&self, locator: &str) -> io::Result<u64>;

    /// Opens the object positioned `offset` bytes from its start.
    async fn open_at(&self, locator: &str, offset: u64) -> io::Result<Self::Handle>;
}

/// [`Storage`] over regular files below a root directory.
///
/// Locators are paths relative to the root. Absolute locators and locators
/// that climb out of the root with `..` are never accessible.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, locator: &str) -> io::Result<PathBuf> {
        let relative = Path::new(locator);
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

        if locator.is_empty() || !contained {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("locator escapes the storage root: {locator}"),
            ));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for FsStorage {
    type Handle = File;

    async fn is_accessible(&self, locator: &str) -> bool {
        let Ok(path) = self.path(locator) else {
            return false;
        };

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => File::open(&path).await.is_ok(),
            _ => false,
        }
    }

    async fn size(&self, locator: &str) -> io::Result<u64> {
        let path = self.path(locator)?;
        Ok(tokio::fs::metadata(path).await?.len())
    }

    async fn open_at(&self, locator: &str, offset: u64) -> io::Result<File> {
        let path = self.path(locator)?;
        let mut file = File::open(path).await?;
        file.seek(io::SeekFrom::Start(offset)).await?;
        Ok(file)
    }
}
