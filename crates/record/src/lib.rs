//! Record manager: catalog-driven tables of fixed-size records over a
//! buffer pool.
//!
//! A [`Session`] owns one page file and one buffer pool. Page 0 holds the
//! system catalog and stays pinned for the whole session. Each table is a
//! doubly-linked chain of slotted pages rooted at the main page recorded in
//! its catalog descriptor; pages no table owns sit on a free list rooted in
//! the catalog and are recycled before the file grows.
//!
//! # Example
//!
//! ```no_run
//! use common::{Attribute, DbConfig, Record, Schema};
//! use record::Session;
//! use types::{DataType, Value};
//!
//! let mut session = Session::open().unwrap();
//!
//! let schema = Schema::new(
//!     vec![
//!         Attribute::new("id", DataType::Int),
//!         Attribute::new("name", DataType::Text(12)),
//!     ],
//!     vec![0],
//! );
//! session.create_table("users", &schema).unwrap();
//!
//! let table = session.open_table("users").unwrap();
//! let mut record = Record::new(table.schema());
//! record.set_attr(table.schema(), 0, &Value::Int(1)).unwrap();
//! record.set_attr(table.schema(), 1, &Value::Text("ada".into())).unwrap();
//! session.insert_record(&table, &mut record).unwrap();
//!
//! session.close_table(table).unwrap();
//! session.shutdown().unwrap();
//! ```

mod catalog;
mod page;

use buffer::BufferPool;
use catalog::{CATALOG_PAGE, CatalogHeader, MAX_NUM_ATTR, MAX_NUM_KEYS, MAX_NUM_TABLES, TableDesc};
use common::{DbConfig, DbError, DbResult, NO_PAGE, PageNum, Record, Rid, Schema};
use expr::{EvalContext, Expr};
use hashbrown::HashSet;
use page::PageHeader;
use storage::PageFile;
use tracing::debug;
use types::Value;

/// An open record-manager session over one page file.
pub struct Session {
    pool: BufferPool,
    open_tables: HashSet<String>,
}

/// Handle to an open table. Holding one keeps the table's main page pinned;
/// return it to [`Session::close_table`] when done.
pub struct Table {
    name: String,
    schema: Schema,
    main_page: PageNum,
}

impl Table {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Cursor over a table's records, optionally filtered by a predicate.
/// Dropping the scan closes it.
pub struct Scan {
    id: Rid,
    cond: Option<Expr>,
}

enum ScanStep {
    Match(Record),
    Exhausted(PageNum),
}

impl Session {
    /// Open a session with the default configuration (`DATA.bin`, 16 LRU
    /// frames), creating the file and an empty catalog when missing.
    pub fn open() -> DbResult<Self> {
        Self::open_with(DbConfig::default())
    }

    pub fn open_with(config: DbConfig) -> DbResult<Self> {
        let new_system = !config.page_file.exists();
        if new_system {
            PageFile::create(&config.page_file)?;
        }
        let mut pool = BufferPool::open(&config.page_file, config.pool_frames, config.strategy)?;
        pool.pin_page(CATALOG_PAGE)?;
        if new_system {
            catalog::write_header(
                pool.page_mut(CATALOG_PAGE)?,
                &CatalogHeader {
                    total_num_pages: 1,
                    free_page: NO_PAGE,
                    num_tables: 0,
                },
            )?;
            pool.mark_dirty(CATALOG_PAGE)?;
        }
        debug!(file = %config.page_file.display(), new_system, "session opened");
        Ok(Self {
            pool,
            open_tables: HashSet::new(),
        })
    }

    /// Unpin the catalog and flush everything to disk.
    pub fn shutdown(mut self) -> DbResult<()> {
        self.pool.unpin_page(CATALOG_PAGE)?;
        self.pool.shutdown()
    }

    /// Register a table and allocate its (empty) main page.
    pub fn create_table(&mut self, name: &str, schema: &Schema) -> DbResult<()> {
        if self.find_table(name)?.is_some() {
            return Err(DbError::TableExists(name.into()));
        }
        let header = self.header()?;
        if header.num_tables as usize >= MAX_NUM_TABLES {
            return Err(DbError::NoMoreEntries("catalog is full".into()));
        }
        if schema.num_attrs() > MAX_NUM_ATTR {
            return Err(DbError::NoMoreEntries(format!(
                "schema has {} attributes, at most {MAX_NUM_ATTR} supported",
                schema.num_attrs()
            )));
        }
        if schema.keys.len() > MAX_NUM_KEYS {
            return Err(DbError::NoMoreEntries(format!(
                "schema has {} key attributes, at most {MAX_NUM_KEYS} supported",
                schema.keys.len()
            )));
        }

        let main_page = self.free_page()?;
        self.init_page(schema, main_page)?;

        let mut desc = TableDesc::from_schema(name, schema);
        desc.page_num = main_page;

        // free_page() may have touched the catalog header, so re-read it.
        let mut header = self.header()?;
        let index = header.num_tables as usize;
        catalog::write_desc(self.pool.page_mut(CATALOG_PAGE)?, index, &desc)?;
        header.num_tables += 1;
        self.set_header(&header)?;
        debug!(table = name, main_page, "table created");
        Ok(())
    }

    /// Open a table, pinning its main page for the lifetime of the handle.
    /// A table can be open at most once per session.
    pub fn open_table(&mut self, name: &str) -> DbResult<Table> {
        let (_, desc) = self
            .find_table(name)?
            .ok_or_else(|| DbError::TableNotFound(name.into()))?;
        let table_name = desc.name_str();
        if self.open_tables.contains(&table_name) {
            return Err(DbError::TableOpen(table_name));
        }
        let schema = desc.to_schema()?;
        self.pool.pin_page(desc.page_num)?;
        self.open_tables.insert(table_name.clone());
        Ok(Table {
            name: table_name,
            schema,
            main_page: desc.page_num,
        })
    }

    /// Release a table handle: unpin its main page and force it to disk.
    pub fn close_table(&mut self, table: Table) -> DbResult<()> {
        self.pool.unpin_page(table.main_page)?;
        match self.pool.force_page(table.main_page) {
            // A concurrent eviction already wrote the page out.
            Ok(()) | Err(DbError::PageNotCached(_)) => {}
            Err(e) => return Err(e),
        }
        self.open_tables.remove(&table.name);
        Ok(())
    }

    /// Drop a table: its whole page chain moves to the free list and its
    /// descriptor slot is compacted away. Open tables cannot be deleted.
    pub fn delete_table(&mut self, name: &str) -> DbResult<()> {
        if self.open_tables.contains(name) {
            return Err(DbError::TableOpen(name.into()));
        }
        let (index, desc) = self
            .find_table(name)?
            .ok_or_else(|| DbError::TableNotFound(name.into()))?;
        self.append_to_free_list(desc.page_num)?;

        let mut header = self.header()?;
        header.num_tables -= 1;
        for i in index..header.num_tables as usize {
            let next = catalog::read_desc(self.pool.page(CATALOG_PAGE)?, i + 1)?;
            catalog::write_desc(self.pool.page_mut(CATALOG_PAGE)?, i, &next)?;
        }
        self.set_header(&header)?;
        debug!(table = name, "table deleted");
        Ok(())
    }

    pub fn num_tables(&self) -> DbResult<i32> {
        Ok(self.header()?.num_tables)
    }

    /// Pages allocated in the file, catalog page included.
    pub fn num_pages(&self) -> DbResult<i32> {
        Ok(self.header()?.total_num_pages)
    }

    /// Length of the free-page list.
    pub fn num_free_pages(&mut self) -> DbResult<i32> {
        let mut count = 0;
        let mut cur = self.header()?.free_page;
        while cur != NO_PAGE {
            count += 1;
            cur = self.pool.with_page(cur, |pool| {
                Ok(page::read_header(pool.page(cur)?)?.next_page)
            })?;
        }
        Ok(count)
    }

    /// Records currently stored in the table.
    pub fn num_tuples(&self, table: &Table) -> DbResult<i32> {
        let (_, desc) = self
            .find_table(&table.name)?
            .ok_or_else(|| DbError::TableNotFound(table.name.clone()))?;
        Ok(desc.num_tuples)
    }

    /// Store a record in the first free slot along the table's chain,
    /// appending a fresh page when every page is full. On success the
    /// record's id points at the slot it landed in.
    pub fn insert_record(&mut self, table: &Table, record: &mut Record) -> DbResult<()> {
        let record_size = table.schema.record_size();
        if record.data.len() != record_size {
            return Err(DbError::WriteFailed(format!(
                "record is {} bytes, schema needs {record_size}",
                record.data.len()
            )));
        }

        // Main page first; it is already pinned for the open table.
        if let Some(slot) =
            page::insert_into_page(self.pool.page_mut(table.main_page)?, record_size, &record.data)?
        {
            self.pool.mark_dirty(table.main_page)?;
            self.bump_num_tuples(&table.name, 1)?;
            record.id = Rid {
                page: table.main_page,
                slot: slot as i32,
            };
            return Ok(());
        }

        // Walk the overflow chain.
        let mut prev = table.main_page;
        let mut cur = page::read_header(self.pool.page(table.main_page)?)?.next_page;
        while cur != NO_PAGE {
            let (slot, next) = self.pool.with_page(cur, |pool| {
                let slot = page::insert_into_page(pool.page_mut(cur)?, record_size, &record.data)?;
                if slot.is_some() {
                    pool.mark_dirty(cur)?;
                }
                let next = page::read_header(pool.page(cur)?)?.next_page;
                Ok((slot, next))
            })?;
            if let Some(slot) = slot {
                self.bump_num_tuples(&table.name, 1)?;
                record.id = Rid {
                    page: cur,
                    slot: slot as i32,
                };
                return Ok(());
            }
            prev = cur;
            cur = next;
        }

        // Every page is full: extend the chain.
        let new_page = self.free_page()?;
        self.init_page(&table.schema, new_page)?;
        let slot = self.pool.with_page(new_page, |pool| {
            let slot =
                page::insert_into_page(pool.page_mut(new_page)?, record_size, &record.data)?
                    .ok_or_else(|| {
                        DbError::WriteFailed(format!("fresh page {new_page} has no free slot"))
                    })?;
            let data = pool.page_mut(new_page)?;
            let mut header = page::read_header(data)?;
            header.prev_page = prev;
            page::write_header(data, &header)?;
            pool.mark_dirty(new_page)?;
            Ok(slot)
        })?;
        self.pool.with_page(prev, |pool| {
            let data = pool.page_mut(prev)?;
            let mut header = page::read_header(data)?;
            header.next_page = new_page;
            page::write_header(data, &header)?;
            pool.mark_dirty(prev)
        })?;
        self.bump_num_tuples(&table.name, 1)?;
        record.id = Rid {
            page: new_page,
            slot: slot as i32,
        };
        Ok(())
    }

    /// Free the slot a record occupies. The tuple bytes are left in place.
    pub fn delete_record(&mut self, table: &Table, id: Rid) -> DbResult<()> {
        self.pool.with_page(id.page, |pool| {
            let data = pool.page_mut(id.page)?;
            let header = page::read_header(data)?;
            check_slot(data, &header, id)?;
            page::set_slot(data, id.slot as usize, false);
            pool.mark_dirty(id.page)
        })?;
        self.bump_num_tuples(&table.name, -1)?;
        Ok(())
    }

    /// Overwrite the payload of an existing record, addressed by its id.
    pub fn update_record(&mut self, table: &Table, record: &Record) -> DbResult<()> {
        let record_size = table.schema.record_size();
        if record.data.len() != record_size {
            return Err(DbError::WriteFailed(format!(
                "record is {} bytes, schema needs {record_size}",
                record.data.len()
            )));
        }
        let id = record.id;
        self.pool.with_page(id.page, |pool| {
            let data = pool.page_mut(id.page)?;
            let header = page::read_header(data)?;
            check_slot(data, &header, id)?;
            let range = page::tuple_range(header.num_slots as usize, record_size, id.slot as usize);
            data[range].copy_from_slice(&record.data);
            pool.mark_dirty(id.page)
        })
    }

    /// Fetch the record stored at `id`.
    pub fn get_record(&mut self, table: &Table, id: Rid) -> DbResult<Record> {
        let record_size = table.schema.record_size();
        let data = self.pool.with_page(id.page, |pool| {
            let data = pool.page(id.page)?;
            let header = page::read_header(data)?;
            check_slot(data, &header, id)?;
            let range = page::tuple_range(header.num_slots as usize, record_size, id.slot as usize);
            Ok(data[range].to_vec())
        })?;
        Ok(Record { id, data })
    }

    /// Start a sequential scan over `table`. Records for which `cond`
    /// evaluates to true are returned; a missing condition matches
    /// everything.
    pub fn start_scan(&mut self, table: &Table, cond: Option<Expr>) -> DbResult<Scan> {
        Ok(Scan {
            id: Rid {
                page: table.main_page,
                slot: -1,
            },
            cond,
        })
    }

    /// Advance the scan to the next matching record, `Ok(None)` once the
    /// chain is exhausted.
    pub fn next(&mut self, table: &Table, scan: &mut Scan) -> DbResult<Option<Record>> {
        scan.id.slot += 1;
        while scan.id.page != NO_PAGE {
            match self.scan_page(table, scan.id, scan.cond.as_ref())? {
                ScanStep::Match(record) => {
                    scan.id = record.id;
                    return Ok(Some(record));
                }
                ScanStep::Exhausted(next_page) => {
                    scan.id.page = next_page;
                    scan.id.slot = 0;
                }
            }
        }
        Ok(None)
    }

    /// Walk the occupied slots of one page from `start.slot` upward,
    /// returning the first record matching `cond` or the next page in the
    /// chain.
    fn scan_page(&mut self, table: &Table, start: Rid, cond: Option<&Expr>) -> DbResult<ScanStep> {
        let record_size = table.schema.record_size();
        let page_num = start.page;
        self.pool.with_page(page_num, |pool| {
            let data = pool.page(page_num)?;
            let header = page::read_header(data)?;
            let num_slots = header.num_slots as usize;
            let ctx = EvalContext {
                schema: &table.schema,
            };
            for slot in start.slot.max(0) as usize..num_slots {
                if !page::slot_used(data, slot) {
                    continue;
                }
                let record = Record {
                    id: Rid {
                        page: page_num,
                        slot: slot as i32,
                    },
                    data: data[page::tuple_range(num_slots, record_size, slot)].to_vec(),
                };
                let matches = match cond {
                    None => true,
                    Some(cond) => match ctx.eval(cond, &record)? {
                        Value::Bool(b) => b,
                        other => {
                            return Err(DbError::Expr(format!(
                                "scan predicate evaluated to {other:?}, expected a boolean"
                            )));
                        }
                    },
                };
                if matches {
                    return Ok(ScanStep::Match(record));
                }
            }
            Ok(ScanStep::Exhausted(header.next_page))
        })
    }

    /// Produce a page usable as a fresh chain node: reuse the free-list
    /// head when there is one, otherwise grow the file.
    fn free_page(&mut self) -> DbResult<PageNum> {
        let mut header = self.header()?;
        if header.free_page == NO_PAGE {
            let new_page = header.total_num_pages;
            header.total_num_pages += 1;
            self.set_header(&header)?;
            self.pool.with_page(new_page, |pool| {
                let data = pool.page_mut(new_page)?;
                let mut page_header = page::read_header(data)?;
                page_header.next_page = NO_PAGE;
                page_header.prev_page = NO_PAGE;
                page::write_header(data, &page_header)?;
                pool.mark_dirty(new_page)
            })?;
            return Ok(new_page);
        }

        let new_page = header.free_page;
        let next = self.pool.with_page(new_page, |pool| {
            let data = pool.page_mut(new_page)?;
            let mut page_header = page::read_header(data)?;
            let next = page_header.next_page;
            page_header.next_page = NO_PAGE;
            page_header.prev_page = NO_PAGE;
            page::write_header(data, &page_header)?;
            pool.mark_dirty(new_page)?;
            Ok(next)
        })?;
        header.free_page = next;
        self.set_header(&header)?;
        if next != NO_PAGE {
            // The catalog page stands in as the list head's predecessor.
            self.pool.with_page(next, |pool| {
                let data = pool.page_mut(next)?;
                let mut page_header = page::read_header(data)?;
                page_header.prev_page = CATALOG_PAGE;
                page::write_header(data, &page_header)?;
                pool.mark_dirty(next)
            })?;
        }
        Ok(new_page)
    }

    /// Prepend the chain reachable from `page_num` to the free list. The
    /// chain must not already be on it.
    fn append_to_free_list(&mut self, page_num: PageNum) -> DbResult<()> {
        let mut header = self.header()?;
        if header.free_page == NO_PAGE {
            self.pool.with_page(page_num, |pool| {
                let data = pool.page_mut(page_num)?;
                let mut page_header = page::read_header(data)?;
                page_header.prev_page = CATALOG_PAGE;
                page::write_header(data, &page_header)?;
                pool.mark_dirty(page_num)
            })?;
            header.free_page = page_num;
            return self.set_header(&header);
        }

        // Find the incoming chain's last node.
        let mut last = page_num;
        loop {
            let next = self.pool.with_page(last, |pool| {
                Ok(page::read_header(pool.page(last)?)?.next_page)
            })?;
            if next == NO_PAGE {
                break;
            }
            last = next;
        }

        // Splice: last node -> old head, then the chain's head becomes the
        // list head.
        let old_head = header.free_page;
        self.pool.with_page(last, |pool| {
            let data = pool.page_mut(last)?;
            let mut page_header = page::read_header(data)?;
            page_header.next_page = old_head;
            page::write_header(data, &page_header)?;
            pool.mark_dirty(last)
        })?;
        self.pool.with_page(old_head, |pool| {
            let data = pool.page_mut(old_head)?;
            let mut page_header = page::read_header(data)?;
            page_header.prev_page = last;
            page::write_header(data, &page_header)?;
            pool.mark_dirty(old_head)
        })?;
        self.pool.with_page(page_num, |pool| {
            let data = pool.page_mut(page_num)?;
            let mut page_header = page::read_header(data)?;
            page_header.prev_page = CATALOG_PAGE;
            page::write_header(data, &page_header)?;
            pool.mark_dirty(page_num)
        })?;
        header.free_page = page_num;
        self.set_header(&header)
    }

    /// Lay out `page_num` as an empty slotted page for `schema`.
    fn init_page(&mut self, schema: &Schema, page_num: PageNum) -> DbResult<()> {
        let records_per_page = page::records_per_page(schema.record_size());
        if records_per_page == 0 {
            return Err(DbError::WriteFailed(format!(
                "record of {} bytes does not fit on a page",
                schema.record_size()
            )));
        }
        self.pool.with_page(page_num, |pool| {
            let data = pool.page_mut(page_num)?;
            let mut header = page::read_header(data)?;
            header.num_slots = records_per_page as i32;
            page::write_header(data, &header)?;
            for slot in 0..records_per_page {
                page::set_slot(data, slot, false);
            }
            pool.mark_dirty(page_num)
        })
    }

    fn header(&self) -> DbResult<CatalogHeader> {
        catalog::read_header(self.pool.page(CATALOG_PAGE)?)
    }

    fn set_header(&mut self, header: &CatalogHeader) -> DbResult<()> {
        catalog::write_header(self.pool.page_mut(CATALOG_PAGE)?, header)?;
        self.pool.mark_dirty(CATALOG_PAGE)
    }

    fn find_table(&self, name: &str) -> DbResult<Option<(usize, TableDesc)>> {
        let data = self.pool.page(CATALOG_PAGE)?;
        let num_tables = catalog::read_header(data)?.num_tables as usize;
        for index in 0..num_tables {
            let desc = catalog::read_desc(data, index)?;
            if desc.matches(name) {
                return Ok(Some((index, desc)));
            }
        }
        Ok(None)
    }

    fn bump_num_tuples(&mut self, name: &str, delta: i32) -> DbResult<()> {
        let (index, mut desc) = self
            .find_table(name)?
            .ok_or_else(|| DbError::TableNotFound(name.into()))?;
        desc.num_tuples += delta;
        catalog::write_desc(self.pool.page_mut(CATALOG_PAGE)?, index, &desc)?;
        self.pool.mark_dirty(CATALOG_PAGE)
    }
}

/// Reject out-of-range and free slots with the same error class the write
/// path reports.
fn check_slot(data: &[u8], header: &PageHeader, id: Rid) -> DbResult<()> {
    if id.slot < 0 || id.slot >= header.num_slots {
        return Err(DbError::WriteFailed(format!(
            "slot {} out of range on page {}",
            id.slot, id.page
        )));
    }
    if !page::slot_used(data, id.slot as usize) {
        return Err(DbError::WriteFailed(format!(
            "slot {} on page {} is empty",
            id.slot, id.page
        )));
    }
    Ok(())
}
