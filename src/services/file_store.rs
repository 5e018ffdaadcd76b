use axum::body::Bytes;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::models::SharedFile;
use crate::utils::{is_sanitized, sanitize_filename};

/// Subdirectory holding uploads that have not finished yet. Sanitized names
/// never start with a dot, so it can't collide with a shared file.
const INCOMING_DIR: &str = ".incoming";

const ARCHIVE_CHUNK_SIZE: usize = 64 * 1024;
const ARCHIVE_CHANNEL_DEPTH: usize = 8;

/// Byte stream of a zip archive being generated on the fly
pub type ArchiveStream = ReceiverStream<io::Result<Bytes>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to write file: {0}")]
    WriteFailure(#[source] io::Error),

    #[error("Failed to read {name} while bundling: {source}")]
    ArchiveMember {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Shared folder on disk. Holds no in-memory index: every call reads the
/// directory, so the folder is the only source of truth.
pub struct FileStore {
    upload_dir: PathBuf,
}

impl FileStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self { upload_dir })
    }

    /// Get upload directory
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    fn incoming_dir(&self) -> PathBuf {
        self.upload_dir.join(INCOMING_DIR)
    }

    /// Start streaming a new upload. Nothing becomes visible to `list` or
    /// `fetch` until [`PendingUpload::commit`] succeeds.
    pub async fn begin_upload(&self, name: &str) -> Result<PendingUpload, StoreError> {
        let clean =
            sanitize_filename(name).ok_or_else(|| StoreError::InvalidName(name.to_string()))?;

        let incoming = self.incoming_dir();
        fs::create_dir_all(&incoming)
            .await
            .map_err(StoreError::WriteFailure)?;

        let partial = incoming.join(format!("{}.part", uuid::Uuid::new_v4().simple()));
        let file = fs::File::create(&partial)
            .await
            .map_err(StoreError::WriteFailure)?;

        tracing::debug!(name = %clean, partial = %partial.display(), "Upload started");

        Ok(PendingUpload {
            target: self.upload_dir.join(&clean),
            name: clean,
            partial,
            file: Some(file),
            written: 0,
            committed: false,
        })
    }

    /// Save a whole stream under `name`, overwriting any file already stored
    /// under the same sanitized name.
    pub async fn save<R>(&self, name: &str, mut source: R) -> Result<SharedFile, StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let mut upload = self.begin_upload(name).await?;
        upload.copy_from(&mut source).await?;
        upload.commit().await
    }

    /// All stored files, newest first. An absent folder is an empty store.
    pub async fn list(&self) -> Result<Vec<SharedFile>, StoreError> {
        let mut entries = match fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            // Does not follow symlinks; the entry may also vanish under a wipe.
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let modified_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            files.push(SharedFile {
                name,
                size: metadata.len(),
                modified_at,
            });
        }

        sort_newest_first(&mut files);
        Ok(files)
    }

    /// Open a stored file for download
    pub async fn fetch(&self, name: &str) -> Result<(fs::File, SharedFile), StoreError> {
        if !is_sanitized(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        let path = self.upload_dir.join(name);
        let metadata = fs::symlink_metadata(&path)
            .await
            .map_err(|e| not_found_or_io(e, name))?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, name))?;
        // Size and mtime from the open handle, in case a concurrent save
        // replaced the path in between.
        let metadata = file.metadata().await?;
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok((
            file,
            SharedFile {
                name: name.to_string(),
                size: metadata.len(),
                modified_at,
            },
        ))
    }

    /// Zip every stored file into a stream, compressing on a blocking thread
    /// as the client reads.
    ///
    /// If any member can't be read the stream ends with an error instead of
    /// a finished archive, so the response is aborted rather than delivered
    /// truncated.
    pub async fn bundle_all(&self) -> Result<ArchiveStream, StoreError> {
        let members: Vec<String> = self.list().await?.into_iter().map(|f| f.name).collect();
        let dir = self.upload_dir.clone();
        let (tx, rx) = mpsc::channel(ARCHIVE_CHANNEL_DEPTH);

        tracing::info!(files = members.len(), "Bundling shared files");

        tokio::task::spawn_blocking(move || {
            let writer = io::BufWriter::with_capacity(
                ARCHIVE_CHUNK_SIZE,
                ChannelWriter { tx: tx.clone() },
            );
            if let Err(e) = write_archive(&dir, &members, writer) {
                if tx.is_closed() {
                    tracing::debug!("Archive download cancelled by client");
                } else {
                    tracing::error!(error = %e, "Aborting archive download");
                    let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }

    /// Remove everything in the shared folder. Never fails; problems are logged.
    pub async fn wipe_all(&self) -> usize {
        let mut entries = match fs::read_dir(&self.upload_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(error = %e, dir = %self.upload_dir.display(), "Cannot read shared folder for cleanup");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Cleanup stopped early");
                    break;
                }
            };

            let path = entry.path();
            let result = match entry.file_type().await {
                Ok(kind) if kind.is_dir() => fs::remove_dir_all(&path).await,
                Ok(_) => fs::remove_file(&path).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(error = %e, path = %path.display(), "Failed to remove"),
            }
        }

        if removed > 0 {
            tracing::info!(
                "Cleaned up {} entries from {}",
                removed,
                self.upload_dir.display()
            );
        }

        removed
    }
}

/// An upload being written to a private partial file. Dropping it without
/// committing (e.g. the client disconnected) deletes the partial file.
pub struct PendingUpload {
    name: String,
    partial: PathBuf,
    target: PathBuf,
    file: Option<fs::File>,
    written: u64,
    committed: bool,
}

impl PendingUpload {
    /// Sanitized name the file will be published under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    fn file(&mut self) -> Result<&mut fs::File, StoreError> {
        self.file
            .as_mut()
            .ok_or_else(|| StoreError::WriteFailure(io::Error::other("upload already closed")))
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StoreError> {
        self.file()?
            .write_all(chunk)
            .await
            .map_err(StoreError::WriteFailure)?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub async fn copy_from<R>(&mut self, source: &mut R) -> Result<(), StoreError>
    where
        R: AsyncRead + Unpin,
    {
        let copied = tokio::io::copy(source, self.file()?)
            .await
            .map_err(StoreError::WriteFailure)?;
        self.written += copied;
        Ok(())
    }

    /// Flush to disk, stamp the modification time and atomically move the
    /// file into place, replacing any previous file of the same name.
    pub async fn commit(mut self) -> Result<SharedFile, StoreError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| StoreError::WriteFailure(io::Error::other("upload already closed")))?;
        file.flush().await.map_err(StoreError::WriteFailure)?;

        let file = file.into_std().await;
        let stamped = SystemTime::now();
        tokio::task::spawn_blocking(move || {
            file.set_modified(stamped)?;
            file.sync_all()
        })
        .await
        .map_err(|e| StoreError::WriteFailure(io::Error::other(e)))?
        .map_err(StoreError::WriteFailure)?;

        fs::rename(&self.partial, &self.target)
            .await
            .map_err(StoreError::WriteFailure)?;
        self.committed = true;

        tracing::info!(name = %self.name, size = self.written, "File saved");

        Ok(SharedFile {
            name: self.name.clone(),
            size: self.written,
            modified_at: DateTime::<Utc>::from(stamped),
        })
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        drop(self.file.take());
        let partial = std::mem::take(&mut self.partial);
        let name = std::mem::take(&mut self.name);
        let discard = move || {
            if std::fs::remove_file(&partial).is_ok() {
                tracing::warn!(name = %name, "Discarded incomplete upload");
            }
        };

        // Unlink on the blocking pool when dropped inside the runtime
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(discard);
            }
            Err(_) => discard(),
        }
    }
}

/// Newest first; equal timestamps fall back to name order.
pub fn sort_newest_first(files: &mut [SharedFile]) {
    files.sort_by(|a, b| {
        b.modified_at
            .cmp(&a.modified_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Write a zip of `members` (names inside `dir`) to `writer`. Stops at the
/// first member that can't be read, and in that case never writes the
/// central directory, so the output is not a readable archive.
pub fn write_archive<W: Write>(
    dir: &Path,
    members: &[String],
    writer: W,
) -> Result<(), StoreError> {
    let aborted = Arc::new(AtomicBool::new(false));
    let mut zip = zip::ZipWriter::new_stream(AbortableWriter {
        inner: writer,
        aborted: Arc::clone(&aborted),
    });

    let mut add_members = || -> Result<(), StoreError> {
        for name in members {
            let member_error = |source| StoreError::ArchiveMember {
                name: name.clone(),
                source,
            };

            let mut file = std::fs::File::open(dir.join(name)).map_err(member_error)?;
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .large_file(size > u64::from(u32::MAX));

            zip.start_file(name.as_str(), options)?;
            io::copy(&mut file, &mut zip).map_err(member_error)?;
        }
        Ok(())
    };

    if let Err(e) = add_members() {
        // Dropping the writer finalizes it; nothing may reach the sink after this.
        aborted.store(true, Ordering::SeqCst);
        drop(zip);
        return Err(e);
    }

    zip.finish()?.flush()?;
    Ok(())
}

/// Passes writes through until the archive is abandoned, then swallows
/// everything, including what the zip writer emits when it is dropped.
struct AbortableWriter<W> {
    inner: W,
    aborted: Arc<AtomicBool>,
}

impl<W: Write> Write for AbortableWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(buf.len());
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.flush()
    }
}

fn not_found_or_io(e: io::Error, name: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(e)
    }
}

/// Adapts the archive's blocking writes onto the response body channel
struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive receiver dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
