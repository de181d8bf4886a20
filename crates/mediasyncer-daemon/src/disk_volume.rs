//! Concrete, directory-backed `Volume` built on `sysinfo::Disks` for free-space
//! lookups and `walkdir` for enumeration.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use mediasyncer_core::errors::Result;
use mediasyncer_core::volume::{Volume, VolumeEntry, VolumeReader, VolumeWriter};
use mediasyncer_core::ByteSize;
use sysinfo::Disks;
use tokio::io::AsyncWriteExt;

const SENTINEL_FILE: &str = ".mediasyncer-volume-id";

pub struct DiskVolume {
    root: PathBuf,
    id: String,
}

impl DiskVolume {
    /// Opens `root` as a volume, creating and persisting the sentinel id file on first use.
    pub async fn open(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        let sentinel_path = root.join(SENTINEL_FILE);

        let id = match tokio::fs::read_to_string(&sentinel_path).await {
            Ok(contents) => contents.trim().to_string(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let id = uuid::Uuid::new_v4().to_string();
                let mut file = tokio::fs::File::create(&sentinel_path).await?;
                file.write_all(id.as_bytes()).await?;
                file.sync_all().await?;
                id
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self { root, id })
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn entry_mod_time(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

#[async_trait]
impl Volume for DiskVolume {
    fn id(&self) -> &str {
        &self.id
    }

    async fn available_bytes(&self) -> ByteSize {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            let mut disks = Disks::new_with_refreshed_list();
            disks.refresh();
            let canonical = std::fs::canonicalize(&root).unwrap_or(root);

            let mut best: Option<(usize, ByteSize)> = None;
            for disk in disks.iter() {
                let mount = disk.mount_point();
                if canonical.starts_with(mount) {
                    let depth = mount.components().count();
                    if best.map(|(d, _)| depth >= d).unwrap_or(true) {
                        best = Some((depth, disk.available_space()));
                    }
                }
            }
            best.map(|(_, free)| free).unwrap_or(0)
        })
        .await
        .unwrap_or(0)
    }

    async fn walk(&self) -> Result<Vec<(String, VolumeEntry)>> {
        let root = self.root.clone();
        let entries = tokio::task::spawn_blocking(move || -> io::Result<Vec<(String, VolumeEntry)>> {
            let mut out = Vec::new();
            for entry in walkdir::WalkDir::new(&root).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("skipping unreadable entry while walking volume: {err}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name() == SENTINEL_FILE {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace(std::path::MAIN_SEPARATOR, "/");
                let metadata = entry.metadata()?;
                out.push((
                    format!("/{relative}"),
                    VolumeEntry {
                        size: metadata.len(),
                        mod_time: entry_mod_time(&metadata),
                    },
                ));
            }
            Ok(out)
        })
        .await
        .map_err(|err| mediasyncer_core::errors::MediaSyncerError::fatal(format!("walk task panicked: {err}")))??;

        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<Option<VolumeEntry>> {
        match tokio::fs::metadata(self.absolute(path)).await {
            Ok(metadata) => Ok(Some(VolumeEntry {
                size: metadata.len(),
                mod_time: entry_mod_time(&metadata),
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<VolumeReader> {
        let file = tokio::fs::File::open(self.absolute(path)).await?;
        Ok(Box::pin(file))
    }

    /// Creates `path` with `O_EXCL` semantics: concurrent callers racing on the same
    /// path get exactly one success and one `AlreadyExists`, regardless of the
    /// `stat`-then-`write` check the FileServer performs above this layer.
    async fn write(&self, path: &str) -> Result<VolumeWriter> {
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new().write(true).create_new(true).open(absolute).await?;
        Ok(Box::pin(file))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tokio::fs::remove_file(self.absolute(path)).await.map_err(Into::into)
    }
}
