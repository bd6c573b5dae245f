//! Buffer pool: a fixed set of in-memory frames caching file pages.
//!
//! Callers pin a page to keep it resident, access its bytes through the
//! pool, mark it dirty after mutating, and unpin it when done. Misses evict
//! an unpinned victim chosen by the pool's replacement strategy (FIFO or
//! LRU), writing it back first when dirty. Pinning a page past the end of
//! the file grows the file with zeroed pages.
//!
//! # Example
//!
//! ```no_run
//! use buffer::BufferPool;
//! use common::ReplacementStrategy;
//! use storage::PageFile;
//!
//! PageFile::create("pages.bin").unwrap();
//! let mut pool = BufferPool::open("pages.bin", 16, ReplacementStrategy::Lru).unwrap();
//!
//! pool.pin_page(3).unwrap();
//! pool.page_mut(3).unwrap()[0] = 42;
//! pool.mark_dirty(3).unwrap();
//! pool.unpin_page(3).unwrap();
//!
//! pool.shutdown().unwrap();
//! ```


use common::{DbError, DbResult, NO_PAGE, PageNum, ReplacementStrategy};
use pagemap::PageMap;
use std::path::Path;
use storage::{PAGE_SIZE, PageFile};
use tracing::debug;

#[derive(Debug)]
struct Frame {
    data: Box<[u8]>,
    page_num: PageNum,
    fix_count: u32,
    dirty: bool,
    occupied: bool,
    /// Last-access stamp from the pool's monotone counter; unique across
    /// the pool's lifetime.
    stamp: u64,
}

/// Fixed-size page cache over one page file.
#[derive(Debug)]
pub struct BufferPool {
    frames: Vec<Frame>,
    page_table: PageMap,
    file: PageFile,
    strategy: ReplacementStrategy,
    stamp: u64,
    /// Last index handed out by the FIFO probe; the next probe starts one
    /// past it.
    queue_index: usize,
    num_read: usize,
    num_write: usize,
}

impl BufferPool {
    /// Open `path` and build a pool of `num_frames` empty frames.
    ///
    /// # Panics
    ///
    /// Panics if `num_frames` is 0.
    pub fn open(
        path: impl AsRef<Path>,
        num_frames: usize,
        strategy: ReplacementStrategy,
    ) -> DbResult<Self> {
        assert!(num_frames > 0, "num_frames must be > 0");
        let file = PageFile::open(path)?;
        let mut pool = Self {
            frames: Vec::with_capacity(num_frames),
            page_table: PageMap::new(),
            file,
            strategy,
            stamp: 0,
            queue_index: num_frames - 1,
            num_read: 0,
            num_write: 0,
        };
        for _ in 0..num_frames {
            let stamp = pool.next_stamp();
            pool.frames.push(Frame {
                data: vec![0u8; PAGE_SIZE].into_boxed_slice(),
                page_num: NO_PAGE,
                fix_count: 0,
                dirty: false,
                occupied: false,
                stamp,
            });
        }
        debug!(frames = num_frames, ?strategy, "buffer pool opened");
        Ok(pool)
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Make `page_num` resident and raise its fix count.
    ///
    /// On a miss the file is grown as needed, so pinning past the current
    /// end of file succeeds. Fails with `WriteFailed` when every frame is
    /// pinned.
    pub fn pin_page(&mut self, page_num: PageNum) -> DbResult<()> {
        if page_num < 0 {
            return Err(DbError::PageNotCached(page_num));
        }
        if let Some(idx) = self.page_table.get(page_num) {
            let stamp = self.next_stamp();
            let frame = &mut self.frames[idx];
            frame.stamp = stamp;
            frame.fix_count += 1;
            return Ok(());
        }

        let idx = self
            .select_victim()
            .ok_or_else(|| DbError::WriteFailed("all frames are pinned".into()))?;
        self.evict(idx)?;

        self.page_table.set(page_num, idx);
        self.file.ensure_capacity(page_num + 1)?;
        self.file.read_block(page_num, &mut self.frames[idx].data)?;
        self.num_read += 1;

        let frame = &mut self.frames[idx];
        frame.page_num = page_num;
        frame.fix_count = 1;
        frame.dirty = false;
        frame.occupied = true;
        Ok(())
    }

    /// Drop one pin on a resident page. The fix count floors at zero.
    pub fn unpin_page(&mut self, page_num: PageNum) -> DbResult<()> {
        let idx = self.lookup(page_num)?;
        let stamp = self.next_stamp();
        let frame = &mut self.frames[idx];
        frame.stamp = stamp;
        frame.fix_count = frame.fix_count.saturating_sub(1);
        Ok(())
    }

    /// Flag a resident page as modified since its last write-back.
    pub fn mark_dirty(&mut self, page_num: PageNum) -> DbResult<()> {
        let idx = self.lookup(page_num)?;
        let stamp = self.next_stamp();
        let frame = &mut self.frames[idx];
        frame.stamp = stamp;
        frame.dirty = true;
        Ok(())
    }

    /// Write one resident page back to the file immediately.
    ///
    /// Only unpinned pages may be forced; a pinned page fails with
    /// `WriteFailed`.
    pub fn force_page(&mut self, page_num: PageNum) -> DbResult<()> {
        let idx = self.lookup(page_num)?;
        let stamp = self.next_stamp();
        self.frames[idx].stamp = stamp;
        if self.frames[idx].fix_count != 0 {
            return Err(DbError::WriteFailed(format!("page {page_num} is pinned")));
        }
        self.file.write_block(page_num, &self.frames[idx].data)?;
        self.num_write += 1;
        self.frames[idx].dirty = false;
        Ok(())
    }

    /// Write back every occupied, dirty, unpinned frame. Pinned dirty
    /// frames stay dirty.
    pub fn force_flush(&mut self) -> DbResult<()> {
        for idx in 0..self.frames.len() {
            let frame = &self.frames[idx];
            if frame.occupied && frame.dirty && frame.fix_count == 0 {
                self.file.write_block(frame.page_num, &frame.data)?;
                self.num_write += 1;
                let stamp = self.next_stamp();
                let frame = &mut self.frames[idx];
                frame.stamp = stamp;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Flush the pool ahead of dropping it.
    ///
    /// Fails with `WriteFailed` while any page is pinned, leaving the pool
    /// untouched. The file handle itself is released when the pool drops.
    pub fn shutdown(&mut self) -> DbResult<()> {
        if self.frames.iter().any(|f| f.fix_count > 0) {
            return Err(DbError::WriteFailed("pool has pinned pages".into()));
        }
        self.force_flush()?;
        debug!(
            reads = self.num_read,
            writes = self.num_write,
            "buffer pool shut down"
        );
        Ok(())
    }

    /// Bytes of a resident page.
    pub fn page(&self, page_num: PageNum) -> DbResult<&[u8]> {
        let idx = self.lookup(page_num)?;
        Ok(&self.frames[idx].data)
    }

    /// Mutable bytes of a resident page. Callers are responsible for
    /// calling `mark_dirty` after modifying them.
    pub fn page_mut(&mut self, page_num: PageNum) -> DbResult<&mut [u8]> {
        let idx = self.lookup(page_num)?;
        Ok(&mut self.frames[idx].data)
    }

    /// Pin `page_num`, run `f`, and unpin on every exit path.
    ///
    /// This is the intended shape for short-lived pins: the unpin cannot be
    /// skipped by an early `?` inside `f`.
    pub fn with_page<T>(
        &mut self,
        page_num: PageNum,
        f: impl FnOnce(&mut Self) -> DbResult<T>,
    ) -> DbResult<T> {
        self.pin_page(page_num)?;
        let out = f(self);
        let unpin = self.unpin_page(page_num);
        let value = out?;
        unpin?;
        Ok(value)
    }

    /// Resident page number per frame, `NO_PAGE` for empty frames.
    pub fn frame_contents(&self) -> Vec<PageNum> {
        self.frames
            .iter()
            .map(|f| if f.occupied { f.page_num } else { NO_PAGE })
            .collect()
    }

    pub fn dirty_flags(&self) -> Vec<bool> {
        self.frames
            .iter()
            .map(|f| f.occupied && f.dirty)
            .collect()
    }

    pub fn fix_counts(&self) -> Vec<u32> {
        self.frames
            .iter()
            .map(|f| if f.occupied { f.fix_count } else { 0 })
            .collect()
    }

    /// Pages read from the file since the pool opened.
    pub fn num_read_io(&self) -> usize {
        self.num_read
    }

    /// Pages written to the file since the pool opened.
    pub fn num_write_io(&self) -> usize {
        self.num_write
    }

    fn lookup(&self, page_num: PageNum) -> DbResult<usize> {
        self.page_table
            .get(page_num)
            .ok_or(DbError::PageNotCached(page_num))
    }

    fn next_stamp(&mut self) -> u64 {
        let stamp = self.stamp;
        self.stamp += 1;
        stamp
    }

    fn select_victim(&mut self) -> Option<usize> {
        match self.strategy {
            ReplacementStrategy::Fifo => self.select_fifo(),
            ReplacementStrategy::Lru => self.select_lru(),
        }
    }

    /// Circular probe starting one past the remembered cursor; first
    /// unpinned frame wins and becomes the new cursor.
    fn select_fifo(&mut self) -> Option<usize> {
        let n = self.frames.len();
        for step in 1..=n {
            let idx = (self.queue_index + step) % n;
            if self.frames[idx].fix_count == 0 {
                self.queue_index = idx;
                return Some(idx);
            }
        }
        None
    }

    /// Unpinned frame with the smallest stamp. Stamps are unique, so there
    /// are no ties; empty frames keep their low init stamps and age out
    /// first.
    fn select_lru(&self) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.fix_count == 0)
            .min_by_key(|(_, f)| f.stamp)
            .map(|(idx, _)| idx)
    }

    /// Clear a frame for reuse, writing its page back first when dirty.
    fn evict(&mut self, idx: usize) -> DbResult<()> {
        let stamp = self.next_stamp();
        self.frames[idx].stamp = stamp;
        if self.frames[idx].occupied {
            let page_num = self.frames[idx].page_num;
            self.page_table.remove(page_num);
            if self.frames[idx].dirty {
                debug!(page = page_num, frame = idx, "writing back evicted page");
                self.file.write_block(page_num, &self.frames[idx].data)?;
                self.num_write += 1;
            }
        }
        let frame = &mut self.frames[idx];
        frame.occupied = false;
        frame.dirty = false;
        frame.page_num = NO_PAGE;
        Ok(())
    }
}
