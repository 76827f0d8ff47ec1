//! Slotted sorted-set format for one entries region.
//!
//! An entries region treats a byte range (a whole leaf page minus its role
//! byte, or the tail of an inner page) as a sorted set of variable-length
//! byte strings:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ marker │ FE │ FC │ N │ slot pointers →                │
//! ├──────────────────────────────────────────────────────┤
//! │                    free space                        │
//! ├──────────────────────────────────────────────────────┤
//! │ entry records (growing down)   ← [rec2][gap][rec0]   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! - `marker` (1 byte): 0 = uninitialized, 1 = initialized
//! - `FE` (u16 BE): free-space end; equal to the lowest used record offset,
//!   or the region length when no records exist
//! - `FC` (u16 BE): total bytes in free chunks (gaps between used records)
//! - `N` (u16 BE): entry count, followed by `N` u16 BE slot pointers in
//!   ascending key order
//!
//! All offsets, including slot pointer values, are relative to the region
//! start. Offset 0 is the marker byte and can never address a record, which
//! frees the value 0 to encode the empty entry (no record is written for
//! it). A record is a 1-byte length for lengths up to 127, otherwise two
//! bytes with the high bit of the first set, followed by the raw bytes.
//!
//! Reads are zero-copy: [`PageEntries::get`] returns sub-slices of the
//! region. Any mutation of the region invalidates previously returned
//! views, which the borrow checker enforces through the slice lifetimes.

use crate::error::{Result, TreeError};
use crate::types::{MAX_ENTRY_LENGTH, MAX_PAGE_SIZE};
use log::trace;

const MARKER_UNINITIALIZED: u8 = 0;
const MARKER_V1: u8 = 1;

const FREE_END_OFFSET: usize = 1;
const FREE_CHUNKS_OFFSET: usize = 3;
const COUNT_OFFSET: usize = 5;
const SLOTS_OFFSET: usize = 7;

/// Smallest region this format can manage
pub const MIN_REGION_SIZE: usize = 16;

/// End of the slot array for a region holding `count` slots
fn slot_array_end(count: usize) -> usize {
    SLOTS_OFFSET + 2 * count
}

/// Size of the length prefix for an entry of `len` bytes
fn record_header_size(len: usize) -> usize {
    if len <= 0x7f {
        1
    } else {
        2
    }
}

/// Total record size for an entry of `len` bytes
fn record_size(len: usize) -> usize {
    record_header_size(len) + len
}

/// Bytes an entry of `len` consumes in a region: record plus slot pointer.
/// The empty entry is slot-only.
pub(crate) fn entry_cost(len: usize) -> usize {
    if len == 0 {
        2
    } else {
        record_size(len) + 2
    }
}

/// Parse the record at `offset`, returning the entry bytes and record size
fn read_record(data: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let out_of_bounds = || TreeError::bad_page(format!("entry record at {offset} out of bounds"));
    let b0 = *data.get(offset).ok_or_else(out_of_bounds)?;
    let (header, len) = if b0 & 0x80 == 0 {
        (1, b0 as usize)
    } else {
        let b1 = *data.get(offset + 1).ok_or_else(out_of_bounds)?;
        (2, ((b0 & 0x7f) as usize) << 8 | b1 as usize)
    };
    let start = offset + header;
    let end = start + len;
    if end > data.len() {
        return Err(out_of_bounds());
    }
    Ok((&data[start..end], header + len))
}

/// Write an entry record at `offset`; the caller guarantees it fits
fn write_record(data: &mut [u8], offset: usize, entry: &[u8]) {
    let len = entry.len();
    let header = if len <= 0x7f {
        data[offset] = len as u8;
        1
    } else {
        data[offset] = 0x80 | (len >> 8) as u8;
        data[offset + 1] = (len & 0xff) as u8;
        2
    };
    data[offset + header..offset + header + len].copy_from_slice(entry);
}

fn read_u16(data: &[u8], offset: usize) -> usize {
    u16::from_be_bytes([data[offset], data[offset + 1]]) as usize
}

fn write_u16(data: &mut [u8], offset: usize, value: usize) {
    debug_assert!(value <= u16::MAX as usize);
    data[offset..offset + 2].copy_from_slice(&(value as u16).to_be_bytes());
}

fn validate_region(data: &[u8]) -> Result<()> {
    if data.len() < MIN_REGION_SIZE || data.len() > MAX_PAGE_SIZE {
        return Err(TreeError::bad_page(format!(
            "entries region size {} out of range",
            data.len()
        )));
    }
    match data[0] {
        MARKER_UNINITIALIZED => Ok(()),
        MARKER_V1 => {
            let count = read_u16(data, COUNT_OFFSET);
            let free_end = read_u16(data, FREE_END_OFFSET);
            if free_end > data.len() || slot_array_end(count) > free_end {
                return Err(TreeError::bad_page(format!(
                    "inconsistent entries header (count {count}, free end {free_end})"
                )));
            }
            Ok(())
        }
        other => Err(TreeError::bad_page(format!(
            "unknown entries marker {other:#04x}"
        ))),
    }
}

/// Start position for a scan
#[derive(Debug, Clone, Copy)]
pub enum ScanFrom<'a> {
    /// Start at an entry, whether present or at its insertion point
    Entry(&'a [u8]),
    /// Start at an ordinal (clamped to the valid range)
    Ordinal(usize),
}

/// Read-only view of an entries region
#[derive(Clone, Copy)]
pub struct PageEntries<'a> {
    data: &'a [u8],
}

impl<'a> PageEntries<'a> {
    /// Interpret `data` as an entries region
    pub fn new(data: &'a [u8]) -> Result<Self> {
        validate_region(data)?;
        Ok(Self { data })
    }

    fn initialized(&self) -> bool {
        self.data[0] == MARKER_V1
    }

    /// Number of entries in the region
    pub fn count(&self) -> usize {
        if self.initialized() {
            read_u16(self.data, COUNT_OFFSET)
        } else {
            0
        }
    }

    /// Whether the region holds no entries
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Length of the underlying region in bytes
    pub fn region_size(&self) -> usize {
        self.data.len()
    }

    fn free_end(&self) -> usize {
        if self.initialized() {
            read_u16(self.data, FREE_END_OFFSET)
        } else {
            self.data.len()
        }
    }

    fn free_chunks(&self) -> usize {
        if self.initialized() {
            read_u16(self.data, FREE_CHUNKS_OFFSET)
        } else {
            0
        }
    }

    /// Free bytes available to insert, counting both the tail gap and the
    /// interior free chunks, with room for one more slot pointer reserved
    pub fn free_space(&self) -> usize {
        let tail = self
            .free_end()
            .saturating_sub(slot_array_end(self.count() + 1));
        tail + self.free_chunks()
    }

    fn slot(&self, ordinal: usize) -> usize {
        read_u16(self.data, SLOTS_OFFSET + 2 * ordinal)
    }

    /// Get the entry at `ordinal` as a zero-copy view into the region
    pub fn get(&self, ordinal: usize) -> Result<&'a [u8]> {
        if ordinal >= self.count() {
            return Err(TreeError::corruption(format!(
                "entry ordinal {} out of bounds (count: {})",
                ordinal,
                self.count()
            )));
        }
        let offset = self.slot(ordinal);
        if offset == 0 {
            return Ok(&[]);
        }
        let (entry, _) = read_record(self.data, offset)?;
        Ok(entry)
    }

    /// All entries in ascending order
    pub fn read_all(&self) -> Result<Vec<&'a [u8]>> {
        (0..self.count()).map(|i| self.get(i)).collect()
    }

    /// Binary search: `Ok(ordinal)` when present, `Err(insertion_point)` when
    /// absent, like `slice::binary_search`
    pub fn search(&self, entry: &[u8]) -> Result<std::result::Result<usize, usize>> {
        let mut low = 0;
        let mut high = self.count();
        while low < high {
            let mid = low + (high - low) / 2;
            match entry.cmp(self.get(mid)?) {
                std::cmp::Ordering::Less => high = mid,
                std::cmp::Ordering::Greater => low = mid + 1,
                std::cmp::Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(low))
    }

    /// Whether an equal entry is present
    pub fn contains(&self, entry: &[u8]) -> Result<bool> {
        Ok(self.search(entry)?.is_ok())
    }

    /// Ordinal of an equal entry, if present
    pub fn ordinal_of(&self, entry: &[u8]) -> Result<Option<usize>> {
        Ok(self.search(entry)?.ok())
    }

    /// Scan entries in ascending order starting at `from` (or the first
    /// entry). The callback receives the ordinal and a zero-copy view and
    /// returns whether to continue. Returns whether the scan ran to the end.
    pub fn scan<F>(&self, from: Option<ScanFrom<'_>>, mut f: F) -> Result<bool>
    where
        F: FnMut(usize, &[u8]) -> bool,
    {
        let count = self.count();
        let start = match from {
            None => 0,
            Some(ScanFrom::Ordinal(o)) => o,
            Some(ScanFrom::Entry(e)) => match self.search(e)? {
                Ok(i) => i,
                Err(i) => i,
            },
        };
        for i in start..count {
            if !f(i, self.get(i)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Scan entries in descending order starting at `from` (or the last
    /// entry). A key start begins at the greatest entry `<=` the key.
    pub fn scan_reverse<F>(&self, from: Option<ScanFrom<'_>>, mut f: F) -> Result<bool>
    where
        F: FnMut(usize, &[u8]) -> bool,
    {
        let count = self.count();
        if count == 0 {
            return Ok(true);
        }
        let start = match from {
            None => count - 1,
            Some(ScanFrom::Ordinal(o)) => o.min(count - 1),
            Some(ScanFrom::Entry(e)) => match self.search(e)? {
                Ok(i) => i,
                Err(0) => return Ok(true),
                Err(i) => i - 1,
            },
        };
        for i in (0..=start).rev() {
            if !f(i, self.get(i)?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Used records as `(offset, size)` pairs sorted by ascending offset
    fn used_records(&self) -> Result<Vec<(usize, usize)>> {
        let mut records = Vec::with_capacity(self.count());
        for i in 0..self.count() {
            let offset = self.slot(i);
            if offset != 0 {
                let (_, size) = read_record(self.data, offset)?;
                records.push((offset, size));
            }
        }
        records.sort_unstable();
        Ok(records)
    }
}

/// Mutable view of an entries region
pub struct PageEntriesMut<'a> {
    data: &'a mut [u8],
}

impl<'a> PageEntriesMut<'a> {
    /// Interpret `data` as a mutable entries region
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        validate_region(data)?;
        Ok(Self { data })
    }

    /// Read-only view over the same region
    pub fn reader(&self) -> PageEntries<'_> {
        PageEntries { data: &*self.data }
    }

    fn ensure_initialized(&mut self) {
        if self.data[0] != MARKER_V1 {
            let len = self.data.len();
            self.data[0] = MARKER_V1;
            write_u16(self.data, FREE_END_OFFSET, len);
            write_u16(self.data, FREE_CHUNKS_OFFSET, 0);
            write_u16(self.data, COUNT_OFFSET, 0);
        }
    }

    fn set_free_end(&mut self, value: usize) {
        write_u16(self.data, FREE_END_OFFSET, value);
    }

    fn set_free_chunks(&mut self, value: usize) {
        write_u16(self.data, FREE_CHUNKS_OFFSET, value);
    }

    fn set_count(&mut self, value: usize) {
        write_u16(self.data, COUNT_OFFSET, value);
    }

    fn set_slot(&mut self, ordinal: usize, offset: usize) {
        write_u16(self.data, SLOTS_OFFSET + 2 * ordinal, offset);
    }

    /// Best-fit free chunk of at least `needed` bytes: the smallest
    /// sufficient gap between used records, exact fits first by construction
    fn find_free_chunk(&self, needed: usize) -> Result<Option<usize>> {
        let reader = self.reader();
        let records = reader.used_records()?;
        let mut best: Option<(usize, usize)> = None;
        let mut prev_end = reader.free_end();
        for &(offset, size) in &records {
            let gap = offset - prev_end;
            if gap >= needed && best.map_or(true, |(_, best_gap)| gap < best_gap) {
                best = Some((prev_end, gap));
            }
            prev_end = offset + size;
        }
        let top_gap = self.data.len() - prev_end;
        if top_gap >= needed && best.map_or(true, |(_, best_gap)| top_gap < best_gap) {
            best = Some((prev_end, top_gap));
        }
        Ok(best.map(|(offset, _)| offset))
    }

    /// Insert an entry, keeping the region sorted.
    ///
    /// Returns `true` when the entry is present afterwards (inserted now or
    /// already there) and `false` when the region lacks space; the caller
    /// decides between compaction, splitting, or giving up.
    pub fn insert(&mut self, entry: &[u8]) -> Result<bool> {
        if entry.len() > MAX_ENTRY_LENGTH {
            return Err(TreeError::EntryTooLong {
                size: entry.len(),
                max: MAX_ENTRY_LENGTH,
            });
        }
        self.ensure_initialized();

        let ordinal = match self.reader().search(entry)? {
            Ok(_) => return Ok(true),
            Err(i) => i,
        };
        let count = self.reader().count();
        let new_slot_end = slot_array_end(count + 1);

        let offset = if entry.is_empty() {
            if new_slot_end > self.reader().free_end() {
                return Ok(false);
            }
            0
        } else {
            let needed = record_size(entry.len());
            let free_end = self.reader().free_end();
            if let Some(chunk) = self.find_free_chunk(needed)? {
                if new_slot_end > free_end {
                    return Ok(false);
                }
                write_record(self.data, chunk, entry);
                let chunks = self.reader().free_chunks();
                self.set_free_chunks(chunks - needed);
                chunk
            } else if free_end >= needed && free_end - needed >= new_slot_end {
                let offset = free_end - needed;
                write_record(self.data, offset, entry);
                self.set_free_end(offset);
                offset
            } else {
                return Ok(false);
            }
        };

        for i in (ordinal..count).rev() {
            let slot = self.reader().slot(i);
            self.set_slot(i + 1, slot);
        }
        self.set_slot(ordinal, offset);
        self.set_count(count + 1);
        Ok(true)
    }

    /// Insert with the rewrite fallback: when a plain insert fails because
    /// the free space is fragmented, compact the region and retry once.
    pub fn insert_or_defragment(&mut self, entry: &[u8]) -> Result<bool> {
        if self.insert(entry)? {
            return Ok(true);
        }
        self.defragment()?;
        self.insert(entry)
    }

    /// Remove an equal entry. Returns `false` when absent.
    pub fn remove(&mut self, entry: &[u8]) -> Result<bool> {
        let ordinal = match self.reader().search(entry)? {
            Ok(i) => i,
            Err(_) => return Ok(false),
        };
        let count = self.reader().count();
        let offset = self.reader().slot(ordinal);

        for i in ordinal..count - 1 {
            let slot = self.reader().slot(i + 1);
            self.set_slot(i, slot);
        }
        self.set_count(count - 1);

        if offset != 0 {
            let (_, size) = read_record(self.data, offset)?;
            let free_end = self.reader().free_end();
            if offset == free_end {
                // The record was flush against the free space; reclaim it and
                // any adjacent free chunk into the tail.
                let records = self.reader().used_records()?;
                let next_used = records.first().map(|&(o, _)| o);
                let mut new_free_end = free_end + size;
                match next_used {
                    Some(next) => {
                        let reclaimed_gap = next - new_free_end;
                        let chunks = self.reader().free_chunks();
                        self.set_free_chunks(chunks - reclaimed_gap);
                        new_free_end = next;
                    }
                    None => {
                        self.set_free_chunks(0);
                        new_free_end = self.data.len();
                    }
                }
                self.set_free_end(new_free_end);
            } else {
                let chunks = self.reader().free_chunks();
                self.set_free_chunks(chunks + size);
            }
        }

        if self.reader().count() == 0 {
            let len = self.data.len();
            self.set_free_end(len);
            self.set_free_chunks(0);
        }
        Ok(true)
    }

    /// Wipe the region back to the uninitialized state
    pub fn reset(&mut self) {
        self.data[0] = MARKER_UNINITIALIZED;
    }

    /// Compact the region: read all entries, reset, reinsert
    fn defragment(&mut self) -> Result<()> {
        trace!(
            "defragmenting entries region ({} entries, {} chunk bytes)",
            self.reader().count(),
            self.reader().free_chunks()
        );
        let entries: Vec<Vec<u8>> = self
            .reader()
            .read_all()?
            .into_iter()
            .map(<[u8]>::to_vec)
            .collect();
        self.reset();
        for entry in &entries {
            if !self.insert(entry)? {
                return Err(TreeError::corruption(
                    "entry no longer fits while compacting a page",
                ));
            }
        }
        Ok(())
    }
}
