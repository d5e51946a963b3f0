//! Attachment storage: collision-free naming and write-once persistence

use crate::error::{Result, UnpackError};
use crate::types::AttachmentRecord;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use uuid::Uuid;

/// Source of the random component in stored attachment names
pub trait IdSource {
    fn next_id(&mut self) -> Uuid;
}

/// Fresh UUID v4 per attachment
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Adapter turning any `FnMut() -> Uuid` into an [`IdSource`]
pub struct IdFn<F>(pub F);

impl<F: FnMut() -> Uuid> IdSource for IdFn<F> {
    fn next_id(&mut self) -> Uuid {
        (self.0)()
    }
}

/// What [`persist`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    /// A file with that name was already there and was left untouched
    AlreadyPresent,
}

/// Check whether `filename` exists in `dir`
#[must_use]
pub fn exists(dir: &Path, filename: &str) -> bool {
    dir.join(filename).exists()
}

/// Write `bytes` to `dir/filename` unless that file already exists.
///
/// The directory is created on demand. Bytes go to a temporary file in the
/// same directory which is then linked into place without clobbering, so a
/// failed write never leaves a partial file under the final name.
pub fn persist(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PersistOutcome> {
    if exists(dir, filename) {
        return Ok(PersistOutcome::AlreadyPresent);
    }
    let target = dir.join(filename);

    fs::create_dir_all(dir).map_err(|e| UnpackError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| UnpackError::io(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| UnpackError::io(&target, e))?;

    match tmp.persist_noclobber(&target) {
        Ok(_) => Ok(PersistOutcome::Written),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(PersistOutcome::AlreadyPresent),
        Err(e) => Err(UnpackError::io(&target, e.error)),
    }
}

/// Reduce a filename to alphanumerics, keeping its extension.
///
/// Directory components are dropped; an empty stem becomes `attachment`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = match base.rfind('.') {
        Some(i) if i > 0 => (&base[..i], &base[i + 1..]),
        _ => (base, ""),
    };

    let mut clean: String = stem.chars().filter(|c| c.is_alphanumeric()).collect();
    if clean.is_empty() {
        clean.push_str("attachment");
    }

    let ext: String = ext.chars().filter(|c| c.is_alphanumeric()).collect();
    if !ext.is_empty() {
        clean.push('.');
        clean.push_str(&ext);
    }
    clean
}

/// `message_id.id.name` with whitespace and path separators made safe
#[must_use]
pub fn stored_name(message_id: &str, id: Uuid, sanitized: &str) -> String {
    format!("{message_id}.{id}.{sanitized}")
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == '/' || c == '\\' {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Output directory plus the id source used to name files in it
pub struct AttachmentStore {
    dir: PathBuf,
    ids: Box<dyn IdSource + Send>,
}

impl AttachmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_ids(dir, RandomIds)
    }

    pub fn with_ids(dir: impl Into<PathBuf>, ids: impl IdSource + Send + 'static) -> Self {
        Self {
            dir: dir.into(),
            ids: Box::new(ids),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name and persist one attachment.
    ///
    /// An existing file of the generated name is kept as is; the record is
    /// returned either way.
    pub fn store(
        &mut self,
        message_id: &str,
        original_name: &str,
        content_id: Option<String>,
        bytes: &[u8],
    ) -> Result<AttachmentRecord> {
        let name = stored_name(
            message_id,
            self.ids.next_id(),
            &sanitize_filename(original_name),
        );

        let outcome = persist(&self.dir, &name, bytes)?;
        debug!(
            original = %original_name,
            stored = %name,
            size = bytes.len(),
            ?outcome,
            "attachment stored"
        );

        Ok(AttachmentRecord {
            original_name: original_name.to_string(),
            path: self.dir.join(&name),
            stored_name: name,
            content_id,
        })
    }
}

impl fmt::Debug for AttachmentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentStore")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}
