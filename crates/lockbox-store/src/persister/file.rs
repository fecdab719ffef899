use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lockbox_core::paths;
use tracing::{debug, warn};

use super::Persister;
use crate::credential::CredentialFactory;
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::serialize::Codec;

/// Persister backed by a single file.
///
/// Writes go to a sibling `.tmp` file that is synced and then renamed over
/// the store, so a crash leaves either the old or the new store on disk.
#[derive(Debug)]
pub struct FilePersister {
    path: PathBuf,
    codec: Codec,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>, codec: Codec) -> Self {
        Self {
            path: path.into(),
            codec,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        paths::temp_sibling(&self.path)
    }
}

impl Persister for FilePersister {
    fn load(
        &mut self,
        repository: &mut dyn Repository,
        factory: &CredentialFactory,
    ) -> Result<usize> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::LoadMissing(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let count = self.codec.decode_into(&bytes, repository, factory)?;
        debug!(path = %self.path.display(), records = count, "loaded store");
        Ok(count)
    }

    fn persist(&mut self, repository: &dyn Repository) -> Result<()> {
        let bytes = self.codec.encode(repository)?;
        ensure_parent(&self.path)?;

        let temp = TempFile::create(self.temp_path())?;
        temp.write_all(&bytes)?;
        temp.commit(&self.path)?;

        debug!(
            path = %self.path.display(),
            records = repository.count(),
            bytes = bytes.len(),
            "persisted store"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        let temp = self.temp_path();
        match fs::remove_file(&temp) {
            Ok(()) => debug!(path = %temp.display(), "removed stale temp file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %temp.display(), "failed to remove temp file: {e}"),
        }
    }
}

/// Create the store's parent directory with owner-only permissions.
fn ensure_parent(path: &Path) -> Result<()> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if parent.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(parent)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(parent, fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

/// A temp file that is removed on drop unless committed.
struct TempFile {
    path: PathBuf,
    file: File,
    committed: bool,
}

impl TempFile {
    fn create(path: PathBuf) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let file = options.open(&path)?;
        Ok(Self {
            path,
            file,
            committed: false,
        })
    }

    fn write_all(&self, bytes: &[u8]) -> Result<()> {
        (&self.file).write_all(bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    fn commit(mut self, target: &Path) -> Result<()> {
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
