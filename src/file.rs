//! Opening the tailed path.

use std::fs::Metadata;
use std::future::Future;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncRead;

/// Identity of an underlying file, stable across renames of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Device and inode on Unix. Other platforms have no cheap equivalent.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Some(Self::new(metadata.dev(), metadata.ino()))
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
            None
        }
    }
}

/// A freshly opened file, positioned at its start.
#[derive(Debug)]
pub struct Opened<R> {
    pub reader: R,
    /// Size of the file when it was opened.
    pub size: u64,
    pub id: Option<FileId>,
}

/// Opens the tailed path, initially and again after every rotation.
pub trait Opener: Send + 'static {
    type Reader: AsyncRead + Unpin + Send + 'static;

    fn open(&mut self, path: &Path) -> impl Future<Output = io::Result<Opened<Self::Reader>>> + Send;

    /// Identity of whatever currently sits at `path`, if it can be determined.
    fn identity(&mut self, path: &Path) -> impl Future<Output = Option<FileId>> + Send {
        let _ = path;
        async { None }
    }
}

/// [`Opener`] for the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOpener;

impl Opener for FsOpener {
    type Reader = File;

    async fn open(&mut self, path: &Path) -> io::Result<Opened<File>> {
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path is a directory",
            ));
        }

        Ok(Opened {
            size: metadata.len(),
            id: FileId::from_metadata(&metadata),
            reader: file,
        })
    }

    async fn identity(&mut self, path: &Path) -> Option<FileId> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        FileId::from_metadata(&metadata)
    }
}
