use crate::errors::MailboxError;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Fixed-size byte buffer mapped from a named shared memory object.
///
/// Every process that opens the same path maps the same pages. Dropping a
/// region unmaps it and closes the handle; the named object stays until
/// `SharedRegion::unlink` is called.
pub struct SharedRegion {
    path: PathBuf,
    mmap: MmapMut,
}

impl SharedRegion {
    /// Create the object if it does not exist, or open the existing one.
    ///
    /// A missing or undersized object is grown to `capacity` (new bytes read
    /// as zero). Exactly `capacity` bytes are mapped, even if the object is
    /// larger.
    pub fn create_or_open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, MailboxError> {
        let path = path.as_ref();
        let resource = path.display().to_string();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o666)
            .open(path)
            .map_err(|e| MailboxError::init(&resource, e))?;

        let current_len = file
            .metadata()
            .map_err(|e| MailboxError::init(&resource, e))?
            .len();

        // Only resize if the object is smaller than needed
        if current_len < capacity as u64 {
            file.set_len(capacity as u64)
                .map_err(|e| MailboxError::init(&resource, e))?;
            tracing::info!(path = %resource, capacity, "Shared region created");
        } else {
            tracing::info!(path = %resource, capacity, "Shared region opened");
        }

        let mmap = unsafe { MmapOptions::new().len(capacity).map_mut(&file) }
            .map_err(|e| MailboxError::init(&resource, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    /// Remove the named object. Existing mappings stay valid until dropped.
    /// A missing object is not an error.
    pub fn unlink(path: impl AsRef<Path>) -> Result<(), MailboxError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mmap.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}
