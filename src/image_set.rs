//! The user-editable, ordered collection of candidate images.
//!
//! [`OrderedImageSet`] is the session-owned list the UI appends to, removes
//! from, drags around and sorts. A conversion never borrows it: the caller
//! takes an [`OrderedImageSet::image_only_snapshot`] and hands that owned
//! `Vec` to the pipeline, so edits made while a run is in flight cannot
//! touch it (and are not reflected in it either).
//!
//! Payload bytes are shared, not copied: a [`ManagedImage`] holds an
//! [`ImageSource`] that is either an `Arc<[u8]>` or a file path read lazily
//! at decode time, so snapshots are cheap.
//!
//! ## Preview resources
//!
//! The thumbnail a list row shows is a per-image resource owned by a
//! [`PreviewStore`]. The set acquires it when an image is appended and
//! releases it exactly once: on [`OrderedImageSet::remove`],
//! [`OrderedImageSet::clear`] or when the set is dropped.

use crate::display::format_size;
use crate::error::KindlePdfError;
use chrono::{DateTime, Utc};
use icu_collator::{Collator, CollatorOptions};
use icu_locid::locale;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// MIME type given to payloads whose format could not be identified.
pub const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

// ── Identity ─────────────────────────────────────────────────────────────

/// Unique identifier of an entry, allocated when it is appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Payload ──────────────────────────────────────────────────────────────

/// Where the raw bytes of an image live.
#[derive(Clone)]
pub enum ImageSource {
    /// Bytes already in memory, shared between the set and any snapshot.
    Memory(Arc<[u8]>),
    /// A file on disk, read when the image is decoded.
    File(PathBuf),
}

impl ImageSource {
    /// Borrow in-memory bytes or read the backing file.
    pub fn load(&self) -> std::io::Result<Cow<'_, [u8]>> {
        match self {
            ImageSource::Memory(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            ImageSource::File(path) => std::fs::read(path).map(Cow::Owned),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageSource::Memory(_) => None,
            ImageSource::File(path) => Some(path),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
            ImageSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// A payload plus metadata, as handed over by a file picker or drop event.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub source: ImageSource,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub mime_type: String,
}

impl RawFile {
    /// Wrap in-memory bytes. The MIME type is sniffed from the magic bytes
    /// and the modification time is "now".
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let mime_type = image::guess_format(&bytes)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| UNKNOWN_MIME_TYPE.to_string());
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            source: ImageSource::Memory(bytes),
            modified_at: Utc::now(),
            mime_type,
        }
    }

    /// Describe a file on disk without reading its contents.
    ///
    /// The MIME type comes from the extension; size and modification time
    /// from the file metadata.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let meta = std::fs::metadata(path)?;
        let modified_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let mime_type = image::ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| UNKNOWN_MIME_TYPE.to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            source: ImageSource::File(path.to_path_buf()),
            size_bytes: meta.len(),
            modified_at,
            mime_type,
        })
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = mime.into();
        self
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }
}

// ── Entries ──────────────────────────────────────────────────────────────

/// One entry of the set.
#[derive(Debug, Clone)]
pub struct ManagedImage {
    pub id: ImageId,
    /// Original file name; used for sorting and progress messages.
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub mime_type: String,
    pub source: ImageSource,
}

impl ManagedImage {
    /// Give a raw file a fresh identity.
    pub fn from_raw(raw: RawFile) -> Self {
        Self {
            id: ImageId::new(),
            name: raw.name,
            size_bytes: raw.size_bytes,
            modified_at: raw.modified_at,
            mime_type: raw.mime_type,
            source: raw.source,
        }
    }

    /// Only `image/*` entries take part in a conversion.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Size formatted for a list row, e.g. `1.5 MB`.
    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }
}

// ── Sorting ──────────────────────────────────────────────────────────────

/// Ordering applied by [`OrderedImageSet::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// No reordering; records that drag-and-drop order is in effect.
    #[default]
    Manual,
    NameAsc,
    NameDesc,
    DateAsc,
    DateDesc,
    SizeAsc,
    SizeDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 7] = [
        SortKey::Manual,
        SortKey::NameAsc,
        SortKey::NameDesc,
        SortKey::DateAsc,
        SortKey::DateDesc,
        SortKey::SizeAsc,
        SortKey::SizeDesc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Manual => "manual",
            SortKey::NameAsc => "name_asc",
            SortKey::NameDesc => "name_desc",
            SortKey::DateAsc => "date_asc",
            SortKey::DateDesc => "date_desc",
            SortKey::SizeAsc => "size_asc",
            SortKey::SizeDesc => "size_desc",
        }
    }

    fn compare(self, a: &ManagedImage, b: &ManagedImage) -> Ordering {
        match self {
            SortKey::Manual => Ordering::Equal,
            SortKey::NameAsc => compare_names(&a.name, &b.name),
            SortKey::NameDesc => compare_names(&b.name, &a.name),
            SortKey::DateAsc => a.modified_at.cmp(&b.modified_at),
            SortKey::DateDesc => b.modified_at.cmp(&a.modified_at),
            SortKey::SizeAsc => a.size_bytes.cmp(&b.size_bytes),
            SortKey::SizeDesc => b.size_bytes.cmp(&a.size_bytes),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = KindlePdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| {
                KindlePdfError::InvalidConfig(format!(
                    "unknown sort key '{s}' (expected one of: manual, name_asc, name_desc, \
                     date_asc, date_desc, size_asc, size_desc)"
                ))
            })
    }
}

thread_local! {
    static NAME_COLLATOR: Option<Collator> =
        Collator::try_new(&locale!("ja").into(), CollatorOptions::new()).ok();
}

/// Collation for file names, following the Japanese CLDR tailoring.
///
/// Accented Latin sorts with its base letter, kana follow gojūon order across
/// hiragana and katakana, and names differing only in case put lowercase
/// first. Exact code points break the remaining ties.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    NAME_COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b).then_with(|| a.cmp(b)),
        None => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase))
            .then_with(|| a.cmp(b)),
    })
}

// ── Preview resources ────────────────────────────────────────────────────

/// Owner of the per-image preview resources shown in a file list.
pub trait PreviewStore: Send {
    /// Called once when `image` is appended to the set.
    fn acquire(&mut self, image: &ManagedImage);

    /// Called exactly once per acquired id, when the entry leaves the set.
    fn release(&mut self, id: ImageId);
}

/// Keeps no previews at all.
#[derive(Debug, Default)]
pub struct NoPreviews;

impl PreviewStore for NoPreviews {
    fn acquire(&mut self, _image: &ManagedImage) {}

    fn release(&mut self, _id: ImageId) {}
}

/// Small decoded thumbnails, produced on first request.
#[derive(Debug)]
pub struct ThumbnailPreviews {
    max_edge: u32,
    entries: HashMap<ImageId, ThumbnailEntry>,
}

#[derive(Debug)]
struct ThumbnailEntry {
    name: String,
    source: ImageSource,
    thumbnail: Option<DynamicImage>,
}

impl Default for ThumbnailPreviews {
    fn default() -> Self {
        Self::new(160)
    }
}

impl ThumbnailPreviews {
    /// Thumbnails fit inside a `max_edge` × `max_edge` box.
    pub fn new(max_edge: u32) -> Self {
        Self {
            max_edge: max_edge.max(1),
            entries: HashMap::new(),
        }
    }

    /// Number of live preview entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode (once) and return the thumbnail for `id`.
    ///
    /// Returns `Ok(None)` when `id` is not in the store.
    pub fn thumbnail(&mut self, id: ImageId) -> Result<Option<&DynamicImage>, KindlePdfError> {
        let max_edge = self.max_edge;
        let Some(entry) = self.entries.get_mut(&id) else {
            return Ok(None);
        };
        if entry.thumbnail.is_none() {
            let decoded = crate::pipeline::decode::decode_source(&entry.name, &entry.source)?;
            entry.thumbnail = Some(decoded.thumbnail(max_edge, max_edge));
        }
        Ok(entry.thumbnail.as_ref())
    }
}

impl PreviewStore for ThumbnailPreviews {
    fn acquire(&mut self, image: &ManagedImage) {
        if image.is_image() {
            self.entries.insert(
                image.id,
                ThumbnailEntry {
                    name: image.name.clone(),
                    source: image.source.clone(),
                    thumbnail: None,
                },
            );
        }
    }

    fn release(&mut self, id: ImageId) {
        self.entries.remove(&id);
    }
}

// ── The set ──────────────────────────────────────────────────────────────

/// Ordered, user-mutable list of candidate images.
///
/// # Example
/// ```rust
/// use kindle_pdf::{OrderedImageSet, RawFile, SortKey};
///
/// let mut set = OrderedImageSet::new();
/// let ids = set.append([
///     RawFile::from_bytes("b.png", vec![0u8; 4]).with_mime_type("image/png"),
///     RawFile::from_bytes("a.png", vec![0u8; 8]).with_mime_type("image/png"),
///     RawFile::from_bytes("notes.txt", b"hello".to_vec()),
/// ]);
/// set.sort_by(SortKey::NameAsc);
/// assert_eq!(set.position(ids[1]), Some(0));
/// assert_eq!(set.image_only_snapshot().len(), 2);
/// ```
pub struct OrderedImageSet<P: PreviewStore = NoPreviews> {
    entries: Vec<ManagedImage>,
    sort_mode: SortKey,
    previews: P,
}

impl OrderedImageSet<NoPreviews> {
    /// An empty set without preview resources.
    pub fn new() -> Self {
        Self::with_previews(NoPreviews)
    }
}

impl Default for OrderedImageSet<NoPreviews> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PreviewStore> OrderedImageSet<P> {
    /// An empty set whose previews are managed by `previews`.
    pub fn with_previews(previews: P) -> Self {
        Self {
            entries: Vec::new(),
            sort_mode: SortKey::Manual,
            previews,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ManagedImage> {
        self.entries.iter()
    }

    pub fn get(&self, id: ImageId) -> Option<&ManagedImage> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn position(&self, id: ImageId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// The last sort applied, or `Manual` after a drag reorder.
    pub fn sort_mode(&self) -> SortKey {
        self.sort_mode
    }

    pub fn previews(&self) -> &P {
        &self.previews
    }

    pub fn previews_mut(&mut self) -> &mut P {
        &mut self.previews
    }

    /// Append files at the end, in input order, each under a fresh id.
    ///
    /// Duplicate names are fine; ids tell them apart.
    pub fn append(&mut self, files: impl IntoIterator<Item = RawFile>) -> Vec<ImageId> {
        let mut ids = Vec::new();
        for raw in files {
            let image = ManagedImage::from_raw(raw);
            self.previews.acquire(&image);
            debug!(id = %image.id, name = %image.name, mime = %image.mime_type, "Appended file");
            ids.push(image.id);
            self.entries.push(image);
        }
        ids
    }

    /// Remove the entry with `id` and release its preview. No-op if absent.
    pub fn remove(&mut self, id: ImageId) -> Option<ManagedImage> {
        let idx = self.position(id)?;
        let removed = self.entries.remove(idx);
        self.previews.release(removed.id);
        debug!(id = %removed.id, name = %removed.name, "Removed file");
        Some(removed)
    }

    /// Move the entry at `from` to `to`, shifting the ones in between.
    ///
    /// Equal indices leave everything (including the sort mode) untouched.
    /// An out-of-bounds index is a caller bug: the set is left unchanged and
    /// [`KindlePdfError::IndexOutOfRange`] is returned. A successful move
    /// switches the sort mode back to `Manual`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), KindlePdfError> {
        let len = self.entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(KindlePdfError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let moved = self.entries.remove(from);
        self.entries.insert(to, moved);
        self.sort_mode = SortKey::Manual;
        Ok(())
    }

    /// Re-sort under `key` (stable). `Manual` only records the mode.
    pub fn sort_by(&mut self, key: SortKey) {
        self.sort_mode = key;
        if key == SortKey::Manual {
            return;
        }
        self.entries.sort_by(|a, b| key.compare(a, b));
        debug!(key = %key, entries = self.entries.len(), "Sorted set");
    }

    /// Image-typed entries in current order, as an owned snapshot.
    pub fn image_only_snapshot(&self) -> Vec<ManagedImage> {
        self.entries.iter().filter(|e| e.is_image()).cloned().collect()
    }

    /// Drop every entry, releasing all previews.
    pub fn clear(&mut self) {
        for entry in self.entries.drain(..) {
            self.previews.release(entry.id);
        }
        self.sort_mode = SortKey::Manual;
    }
}

impl<P: PreviewStore> Drop for OrderedImageSet<P> {
    fn drop(&mut self) {
        for entry in self.entries.drain(..) {
            self.previews.release(entry.id);
        }
    }
}

impl<P: PreviewStore> fmt::Debug for OrderedImageSet<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedImageSet")
            .field("entries", &self.entries)
            .field("sort_mode", &self.sort_mode)
            .finish()
    }
}

impl<'a, P: PreviewStore> IntoIterator for &'a OrderedImageSet<P> {
    type Item = &'a ManagedImage;
    type IntoIter = std::slice::Iter<'a, ManagedImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
