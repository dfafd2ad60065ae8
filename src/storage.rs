//! Photo storage
//!
//! [`Storage`] is the filesystem seam (an SD card on the target board).
//! [`PhotoStore`] keeps the photo directory on top of it: sequential
//! `/photos/IMG_NNNN.jpg` names, a photo counter seeded once from a
//! directory scan, and byte-exact write verification.
//!
//! Sequence numbers only move forward: the next name is one past the
//! highest number ever seen or written, so a gap or a delete never hands
//! out the name of a file that still exists.

use core::fmt::{Debug, Write};

use heapless::String;
use log::{info, warn};

use crate::error::SaveError;

/// Longest generated path, in bytes
pub const MAX_NAME_LEN: usize = 32;

/// Directory photos are written to
pub const PHOTO_DIR: &str = "/photos";

/// File name prefix
pub const PHOTO_PREFIX: &str = "IMG_";

/// File extension, lower case
pub const PHOTO_EXT: &str = ".jpg";

/// Generated photo path
pub type PhotoName = String<MAX_NAME_LEN>;

type SaveResult<T, E> = core::result::Result<T, SaveError<E>>;

/// Filesystem operations the photo store needs
pub trait Storage {
    /// Backend error
    type Error: Debug;

    /// Whether the medium is mounted
    fn is_available(&self) -> bool;

    /// Whether `path` exists
    fn exists(&mut self, path: &str) -> Result<bool, Self::Error>;

    /// Create directory `path`
    fn create_dir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Call `f` with the name of every regular file in `dir`
    fn for_each_file(&mut self, dir: &str, f: &mut dyn FnMut(&str)) -> Result<(), Self::Error>;

    /// Create or truncate `path` and write `data`, returning bytes written
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<usize, Self::Error>;

    /// Read up to `buf.len()` bytes of `path`, returning bytes read
    fn read_file(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Remove `path`
    fn remove_file(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Free bytes on the medium
    fn free_space(&mut self) -> Result<u64, Self::Error>;
}

fn is_photo(name: &str) -> bool {
    name.ends_with(PHOTO_EXT) || name.ends_with(".JPG")
}

/// Sequence number of a generated photo name, `None` for foreign files
fn photo_seq(name: &str) -> Option<u32> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let stem = base.get(..base.len().checked_sub(PHOTO_EXT.len())?)?;
    if !is_photo(base) {
        return None;
    }
    let digits = stem.strip_prefix(PHOTO_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Path for sequence number `seq`, zero-padded to four digits
pub fn photo_name<E>(seq: u32) -> SaveResult<PhotoName, E> {
    let mut name = PhotoName::new();
    write!(name, "{PHOTO_DIR}/{PHOTO_PREFIX}{seq:04}{PHOTO_EXT}")
        .map_err(|_| SaveError::NameOverflow)?;
    Ok(name)
}

/// Photo directory on top of a [`Storage`] backend
pub struct PhotoStore<S> {
    storage: S,
    count: u32,
    last_seq: u32,
    seeded: bool,
}

impl<S: Storage> PhotoStore<S> {
    /// Wrap a backend; the counter is zero until [`init`](Self::init)
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            count: 0,
            last_seq: 0,
            seeded: false,
        }
    }

    /// Create the photo directory if needed and seed the counter
    ///
    /// The scan runs once; later calls return the running count.
    pub fn init(&mut self) -> SaveResult<u32, S::Error> {
        if !self.storage.is_available() {
            warn!("storage unavailable, photos will not be saved");
            return Err(SaveError::Unavailable);
        }
        if self.seeded {
            return Ok(self.count);
        }
        if !self.storage.exists(PHOTO_DIR).map_err(SaveError::Storage)? {
            if let Err(e) = self.storage.create_dir(PHOTO_DIR) {
                warn!("could not create {}: {:?}", PHOTO_DIR, e);
            }
        }
        let mut count = 0u32;
        let mut last_seq = 0u32;
        self.storage
            .for_each_file(PHOTO_DIR, &mut |name| {
                if is_photo(name) {
                    count += 1;
                }
                if let Some(seq) = photo_seq(name) {
                    last_seq = last_seq.max(seq);
                }
            })
            .map_err(SaveError::Storage)?;
        self.count = count;
        self.last_seq = self.last_seq.max(last_seq);
        self.seeded = true;
        info!("found {} existing photos, last IMG_{:04}", count, self.last_seq);
        Ok(count)
    }

    /// Whether the backend is mounted
    pub fn is_available(&self) -> bool {
        self.storage.is_available()
    }

    /// Photos counted so far
    pub fn photo_count(&self) -> u32 {
        self.count
    }

    /// Highest sequence number seen or written
    pub fn last_seq(&self) -> u32 {
        self.last_seq
    }

    /// Name the next save will use
    pub fn next_name(&self) -> SaveResult<PhotoName, S::Error> {
        let seq = self.last_seq.checked_add(1).ok_or(SaveError::NameOverflow)?;
        photo_name(seq)
    }

    /// Persist `data` under the next sequential name
    ///
    /// The counter only advances when every byte was written.
    pub fn save(&mut self, data: &[u8]) -> SaveResult<PhotoName, S::Error> {
        if !self.storage.is_available() {
            return Err(SaveError::Unavailable);
        }
        if data.is_empty() {
            return Err(SaveError::EmptyPayload);
        }
        let name = self.next_name()?;
        let written = self
            .storage
            .write_file(&name, data)
            .map_err(SaveError::Storage)?;
        if written != data.len() {
            warn!("short write to {}: {}/{} bytes", name, written, data.len());
            return Err(SaveError::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        self.count = self.count.saturating_add(1);
        self.last_seq += 1;
        info!("saved {} ({} bytes)", name, data.len());
        Ok(name)
    }

    /// Remove a photo by path
    ///
    /// The photo count drops; the sequence number does not.
    pub fn delete(&mut self, name: &str) -> SaveResult<(), S::Error> {
        if !self.storage.is_available() {
            return Err(SaveError::Unavailable);
        }
        self.storage.remove_file(name).map_err(SaveError::Storage)?;
        self.count = self.count.saturating_sub(1);
        info!("deleted {}", name);
        Ok(())
    }

    /// Read a photo into `buf`, truncated to its length
    pub fn read(&mut self, name: &str, buf: &mut [u8]) -> SaveResult<usize, S::Error> {
        if !self.storage.is_available() {
            return Err(SaveError::Unavailable);
        }
        self.storage.read_file(name, buf).map_err(SaveError::Storage)
    }

    /// Call `f` with every photo file name
    pub fn for_each_photo(&mut self, mut f: impl FnMut(&str)) -> SaveResult<(), S::Error> {
        if !self.storage.is_available() {
            return Err(SaveError::Unavailable);
        }
        self.storage
            .for_each_file(PHOTO_DIR, &mut |name| {
                if is_photo(name) {
                    f(name);
                }
            })
            .map_err(SaveError::Storage)
    }

    /// Free bytes, zero when unavailable
    pub fn free_space(&mut self) -> u64 {
        if !self.storage.is_available() {
            return 0;
        }
        self.storage.free_space().unwrap_or(0)
    }

    /// Release the backend
    pub fn release(self) -> S {
        self.storage
    }
}
