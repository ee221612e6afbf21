//! The disk cache's filesystem boundary (`spec.md` §4.6's `writeAtomic`
//! contract). Every blocking std call is offloaded to a blocking-pool thread
//! via `tokio::task::spawn_blocking`, the same asyncify idiom the teacher
//! uses around its own device I/O (`foyer-storage`'s device layer wraps raw
//! file operations the same way, just over `io_uring`/`psync` rather than
//! plain `std::fs`).

use std::io::Write as _;
use std::path::{Path, PathBuf};

use groupcache_common::error::{Error, Result};
use rand::Rng;

/// A directory-scoped filesystem. Every entry the disk cache writes lives
/// under `root`, addressed by a randomly generated file name — the random
/// name *is* the entry's permanent content address (`spec.md` §4.6).
#[derive(Debug, Clone)]
pub struct Filesystem {
    root: PathBuf,
}

impl Filesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Empties and recreates `root`. Called once at disk cache construction
    /// so a prior run's temp files never leak into a fresh cache.
    pub async fn recreate_dir(&self) -> Result<()> {
        let root = self.root.clone();
        asyncify(move || {
            if root.exists() {
                std::fs::remove_dir_all(&root)?;
            }
            std::fs::create_dir_all(&root)?;
            Ok(())
        })
        .await
    }

    pub async fn create_dir(&self) -> Result<()> {
        let root = self.root.clone();
        asyncify(move || {
            std::fs::create_dir_all(&root)?;
            Ok(())
        })
        .await
    }

    /// Lists the file names currently under `root`. Used at startup to
    /// reconcile an on-disk directory with whatever index the cache keeps
    /// in memory (groupcache does not persist its index, so in practice
    /// this just powers diagnostics and tests).
    pub async fn read_dir(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        asyncify(move || {
            let mut names = Vec::new();
            for entry in std::fs::read_dir(&root)? {
                let entry = entry?;
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })
        .await
    }

    /// Reads an entry's full contents back off disk.
    pub async fn open_read(&self, name: &str) -> Result<bytes::Bytes> {
        let path = self.path_for(name);
        asyncify(move || Ok(bytes::Bytes::from(std::fs::read(&path)?))).await
    }

    /// Deletes an entry. Missing files are not an error: `release` and
    /// `finishErase` can race on a file already gone and both must succeed.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        asyncify(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        })
        .await
    }

    /// Creates a fresh, uniquely-named file under `root`, writes `contents`
    /// to it, and durably closes it. Returns the generated name. Loops on a
    /// (practically impossible) random-name collision, per the
    /// `writeAtomic` contract.
    pub async fn write_atomic(&self, contents: bytes::Bytes) -> Result<String> {
        let root = self.root.clone();
        asyncify(move || {
            loop {
                let name = random_name();
                let path = root.join(&name);
                match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(mut file) => {
                        file.write_all(&contents)?;
                        file.sync_all()?;
                        return Ok(name);
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                    Err(err) => return Err(err.into()),
                }
            }
        })
        .await
    }
}

fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn asyncify<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(_) => Err(Error::Io("blocking filesystem task panicked".to_string())),
    }
}
