//! # Database File
//!
//! A heap file holding pages: the 6-byte [`FileHeader`] followed by
//! `num_pages` pages of 8 KiB each. Files live at
//! `<data dir>/<file_id>`; the default data dir is
//! `$HOME/.var/lib/kyadb/db`, and every operation also has an `_in`
//! variant taking the directory explicitly (tests point that at a
//! tempdir).
//!
//! ## Durability
//!
//! Page writes go straight to the file descriptor, but the header, and
//! with it the page count a reader will trust, is only rewritten by
//! [`DatabaseFile::make_durable`], which then fsyncs. The call is a
//! durability barrier: everything written before a successful
//! `make_durable` survives a crash, anything after it may not. Between
//! barriers the in-memory `num_pages` runs ahead of the on-disk header.
//!
//! ## Partial Progress
//!
//! `append_pages` and `write_pages` stop at the first I/O failure and
//! report how far they got inside the error ([`AppendPagesError`],
//! [`WritePagesError`]), so a caller can reconcile its bookkeeping before
//! retrying.

use std::fmt;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};
use thiserror::Error;
use zerocopy::IntoBytes;

use crate::config::{
    BASE_DATA_PATH, DATA_DIR_MODE, DATA_FILE_MODE, DB_DATA_DIR, FILE_HEADER_SIZE,
    MAX_PAGES_PER_FILE, PAGE_SIZE, RESERVED_FILE_ID, VAR_DIR,
};

use super::headers::FileHeader;
use super::page::Page;

/// Returned when a file already holds the maximum number of pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("file is full, maximum number of pages allowed: {}", MAX_PAGES_PER_FILE)]
pub struct FileFullError;

/// Returned when creating a file with the ID reserved for the forwarding
/// sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("file ID 0x{0:04x} is reserved and can never be assigned")]
pub struct ReservedFileIdError(pub u16);

/// Returned when a page read hits end-of-file: the file is shorter than
/// its header claims. Never a silent empty page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("short read: page {page_num} lies beyond the end of the file")]
pub struct ShortReadError {
    pub page_num: u32,
}

/// Append failure carrying the successfully appended prefix.
#[derive(Debug)]
pub struct AppendPagesError {
    /// Page numbers of the pages appended before the failure.
    pub page_nums: Vec<u32>,
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl fmt::Display for AppendPagesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "appended {} pages before failing",
            self.page_nums.len()
        )
    }
}

impl std::error::Error for AppendPagesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Write failure carrying the count of pages written before it.
#[derive(Debug, Error)]
#[error("wrote {pages_written} pages before failing")]
pub struct WritePagesError {
    pub pages_written: u32,
    #[source]
    pub source: io::Error,
}

/// Default directory for database files: `$HOME/.var/lib/kyadb/db`.
pub fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| eyre::eyre!("HOME is not set, cannot locate the data directory"))?;
    Ok(PathBuf::from(home)
        .join(VAR_DIR)
        .join(BASE_DATA_PATH)
        .join(DB_DATA_DIR))
}

fn db_file_path(dir: &Path, file_id: u16) -> PathBuf {
    dir.join(file_id.to_string())
}

fn page_offset(page_num: u32) -> u64 {
    FILE_HEADER_SIZE as u64 + page_num as u64 * PAGE_SIZE as u64
}

/// An open database file. Exclusively owns its file descriptor and the
/// cached page count; holds no page cache, pages are delivered to the
/// caller as owned buffers.
#[derive(Debug)]
pub struct DatabaseFile {
    file: File,
    file_id: u16,
    num_pages: u32,
}

impl DatabaseFile {
    /// Creates a new database file in the default data directory.
    pub fn create(file_id: u16) -> Result<Self> {
        Self::create_in(default_data_dir()?, file_id)
    }

    /// Creates a new database file in `dir`, failing if it already
    /// exists. Parent directories are created as needed. The header is
    /// written and fsynced before the handle is returned.
    pub fn create_in(dir: impl AsRef<Path>, file_id: u16) -> Result<Self> {
        if file_id == RESERVED_FILE_ID {
            return Err(ReservedFileIdError(file_id).into());
        }

        let dir = dir.as_ref();
        DirBuilder::new()
            .recursive(true)
            .mode(DATA_DIR_MODE)
            .create(dir)
            .wrap_err_with(|| format!("failed to create data directory '{}'", dir.display()))?;

        let path = db_file_path(dir, file_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(DATA_FILE_MODE)
            .open(&path)
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        let db_file = Self {
            file,
            file_id,
            num_pages: 0,
        };
        db_file.make_durable()?;
        Ok(db_file)
    }

    /// Opens an existing database file in the default data directory.
    pub fn open(file_id: u16) -> Result<Self> {
        Self::open_in(default_data_dir()?, file_id)
    }

    /// Opens an existing database file in `dir`, reading the durable page
    /// count from its header.
    pub fn open_in(dir: impl AsRef<Path>, file_id: u16) -> Result<Self> {
        let path = db_file_path(dir.as_ref(), file_id);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let mut bytes = [0u8; FILE_HEADER_SIZE];
        file.read_exact_at(&mut bytes, 0)
            .wrap_err_with(|| format!("truncated header in database file '{}'", path.display()))?;
        let header = FileHeader::from_bytes(&bytes)?;
        ensure!(
            header.file_id() == file_id,
            "database file '{}' carries file ID {}, expected {}",
            path.display(),
            header.file_id(),
            file_id
        );

        Ok(Self {
            file,
            file_id,
            num_pages: header.num_pages(),
        })
    }

    /// Removes a database file from the default data directory.
    pub fn delete(file_id: u16) -> Result<()> {
        Self::delete_in(default_data_dir()?, file_id)
    }

    /// Removes a database file from `dir`.
    pub fn delete_in(dir: impl AsRef<Path>, file_id: u16) -> Result<()> {
        let path = db_file_path(dir.as_ref(), file_id);
        fs::remove_file(&path)
            .wrap_err_with(|| format!("failed to delete database file '{}'", path.display()))
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }

    /// Pages this handle knows about, including ones appended since the
    /// last [`DatabaseFile::make_durable`].
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Appends pages at the end of the file, returning their page
    /// numbers. The page count grows by one per page appended; the
    /// on-disk header is not refreshed until [`DatabaseFile::make_durable`].
    ///
    /// Stops at the first failure ([`FileFullError`] or I/O); the error
    /// carries the page numbers of the prefix that did get appended.
    pub fn append_pages(&mut self, pages: &[Page]) -> Result<Vec<u32>> {
        let mut page_nums = Vec::with_capacity(pages.len());
        for page in pages {
            if self.num_pages == MAX_PAGES_PER_FILE {
                return Err(AppendPagesError {
                    page_nums,
                    source: FileFullError.into(),
                }
                .into());
            }
            if let Err(e) = self
                .file
                .write_all_at(page.as_bytes(), page_offset(self.num_pages))
            {
                return Err(AppendPagesError {
                    page_nums,
                    source: e.into(),
                }
                .into());
            }
            page_nums.push(self.num_pages);
            self.num_pages += 1;
        }
        Ok(page_nums)
    }

    /// Overwrites existing pages starting at `first_page_num`, returning
    /// the count written. Does not grow the file; appending is
    /// [`DatabaseFile::append_pages`]' job, so the whole range must lie
    /// within the current page count.
    pub fn write_pages(&mut self, pages: &[Page], first_page_num: u32) -> Result<u32> {
        ensure!(
            first_page_num as u64 + pages.len() as u64 <= self.num_pages as u64,
            "write of {} pages at {} exceeds the file's {} pages; use append_pages to grow",
            pages.len(),
            first_page_num,
            self.num_pages
        );

        let mut pages_written = 0u32;
        for page in pages {
            if let Err(e) = self
                .file
                .write_all_at(page.as_bytes(), page_offset(first_page_num + pages_written))
            {
                return Err(WritePagesError {
                    pages_written,
                    source: e,
                }
                .into());
            }
            pages_written += 1;
        }
        Ok(pages_written)
    }

    /// Reads `count` pages starting at `first_page_num` into owned
    /// buffers. The range must lie within the page count; a file
    /// physically shorter than its header claims yields
    /// [`ShortReadError`].
    pub fn read_pages(&self, first_page_num: u32, count: u32) -> Result<Vec<Page>> {
        ensure!(
            first_page_num as u64 + count as u64 <= self.num_pages as u64,
            "read of {} pages at {} exceeds the file's {} pages",
            count,
            first_page_num,
            self.num_pages
        );

        let mut pages = Vec::with_capacity(count as usize);
        for i in 0..count {
            let page_num = first_page_num + i;
            let mut page = Page::zeroed();
            self.file
                .read_exact_at(page.as_bytes_mut(), page_offset(page_num))
                .map_err(|e| -> eyre::Report {
                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        ShortReadError { page_num }.into()
                    } else {
                        eyre::Report::new(e)
                            .wrap_err(format!("failed to read page {}", page_num))
                    }
                })?;
            pages.push(page);
        }
        Ok(pages)
    }

    /// Durability barrier: rewrites the header with the current page
    /// count, then fsyncs. On success every byte up to
    /// `6 + num_pages * PAGE_SIZE` is on stable storage.
    pub fn make_durable(&self) -> Result<()> {
        let header = FileHeader::new(self.file_id, self.num_pages);
        self.file
            .write_all_at(header.as_bytes(), 0)
            .wrap_err("failed to write file header")?;
        self.file.sync_all().wrap_err("failed to fsync database file")
    }
}
