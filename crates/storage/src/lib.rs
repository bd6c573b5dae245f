//! Page-granular file I/O.
//!
//! A page file is a flat sequence of fixed-size pages; its length is always
//! a whole number of pages. All reads and writes move exactly one page. No
//! caching happens at this layer — that is the buffer pool's job.


use common::{DbError, DbResult, PageNum};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

/// Open handle to a page file.
///
/// Tracks the page count (kept equal to `file length / PAGE_SIZE`) and a
/// current position used by the relative block operations. The position is
/// advisory and local to this handle.
#[derive(Debug)]
pub struct PageFile {
    path: PathBuf,
    file: File,
    total_pages: PageNum,
    cur_page_pos: PageNum,
}

impl PageFile {
    /// Create a page file containing a single zeroed page.
    ///
    /// An existing file at `path` is truncated.
    pub fn create(path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|_| DbError::FileNotFound(path.display().to_string()))?;
        file.write_all(&[0u8; PAGE_SIZE])
            .map_err(|e| DbError::WriteFailed(format!("initial page write failed: {e}")))?;
        Ok(())
    }

    /// Open an existing page file read-write.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| DbError::FileNotFound(path.display().to_string()))?;
        let len = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            total_pages: (len / PAGE_SIZE as u64) as PageNum,
            cur_page_pos: 0,
        })
    }

    /// Flush and release the underlying OS handle.
    pub fn close(self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Remove a page file from disk.
    pub fn destroy(path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|_| DbError::FileNotFound(path.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn total_pages(&self) -> PageNum {
        self.total_pages
    }

    /// Page index the relative block operations act on.
    pub fn block_pos(&self) -> PageNum {
        self.cur_page_pos
    }

    /// Read page `page_num` into `buf` (exactly one page worth of bytes).
    pub fn read_block(&mut self, page_num: PageNum, buf: &mut [u8]) -> DbResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        if page_num < 0 || page_num >= self.total_pages {
            return Err(DbError::ReadNonExistingPage(page_num));
        }
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file
            .read_exact(buf)
            .map_err(|_| DbError::ReadNonExistingPage(page_num))?;
        Ok(())
    }

    /// Write `buf` as page `page_num`. The page must already exist.
    pub fn write_block(&mut self, page_num: PageNum, buf: &[u8]) -> DbResult<()> {
        debug_assert_eq!(buf.len(), PAGE_SIZE);
        if page_num < 0 || page_num >= self.total_pages {
            return Err(DbError::ReadNonExistingPage(page_num));
        }
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file
            .write_all(buf)
            .map_err(|e| DbError::WriteFailed(format!("page {page_num} write failed: {e}")))?;
        Ok(())
    }

    pub fn read_first_block(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(0, buf)
    }

    /// Read the block before the current position, moving the position only
    /// on success.
    pub fn read_previous_block(&mut self, buf: &mut [u8]) -> DbResult<()> {
        let page_num = self.cur_page_pos - 1;
        self.read_block(page_num, buf)?;
        self.cur_page_pos = page_num;
        Ok(())
    }

    pub fn read_current_block(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(self.cur_page_pos, buf)
    }

    /// Read the block after the current position, moving the position only
    /// on success.
    pub fn read_next_block(&mut self, buf: &mut [u8]) -> DbResult<()> {
        let page_num = self.cur_page_pos + 1;
        self.read_block(page_num, buf)?;
        self.cur_page_pos = page_num;
        Ok(())
    }

    pub fn read_last_block(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.read_block(self.total_pages - 1, buf)
    }

    pub fn write_current_block(&mut self, buf: &[u8]) -> DbResult<()> {
        self.write_block(self.cur_page_pos, buf)
    }

    /// Append one zeroed page at the end of the file.
    pub fn append_empty_block(&mut self) -> DbResult<()> {
        self.file.seek(SeekFrom::End(0))?;
        self.file
            .write_all(&[0u8; PAGE_SIZE])
            .map_err(|e| DbError::WriteFailed(format!("append failed: {e}")))?;
        self.total_pages += 1;
        Ok(())
    }

    /// Grow the file with zeroed pages until it holds at least
    /// `num_pages` pages.
    pub fn ensure_capacity(&mut self, num_pages: PageNum) -> DbResult<()> {
        while self.total_pages < num_pages {
            self.append_empty_block()?;
        }
        Ok(())
    }
}
