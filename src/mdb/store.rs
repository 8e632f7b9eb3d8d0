use super::format::{
    index_slot, DataEntryHeader, FileHeader, IndexEntry, DATA_ENTRY_HEADER_SIZE, DATA_MAGIC,
    ENTRY_MAGIC, HEADER_SIZE, INDEX_ENTRY_SIZE, INDEX_MAGIC, VERSION,
};
use super::record::{decode_payload, encode_entry, encode_tombstone, verify_entry, Record};
use crate::errors::MdbError;
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info, warn};
use memchr::memmem;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

/// Slot number of a record in the index. Ids are assigned in append order and never reused.
pub type RecordId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Flush file data to stable storage after every write
    pub sync: bool,
}

/// Outcome of a recovery scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Valid data entries found, tombstones included
    pub processed: u64,
    /// Damaged spans skipped while resynchronizing
    pub skipped: u64,
    /// Data file offsets where a damaged span starts
    pub corrupt_offsets: Vec<u64>,
    /// The scan stopped early on request; the index was left untouched
    pub canceled: bool,
}

#[derive(Debug)]
struct Files {
    index: File,
    data: File,
}

#[derive(Debug)]
struct WriterState {
    next_id: u64,
    data_len: u64,
}

/// An index and data file pair holding append-only metric records.
///
/// Appends are serialized by a writer lock and write the data entry before the index entry. A
/// record becomes readable only once both writes have landed, so concurrent readers never see
/// an index slot without its data. Reads use positional I/O and run in parallel.
///
/// ```
/// use ncollectd_core::mdb::{Record, Store, StoreOptions};
/// use ncollectd_core::metric::LabelSet;
/// use ncollectd_core::mql::Point;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = Store::open(dir.path().join("metrics"), StoreOptions::default()).unwrap();
/// let point = Point { timestamp: 1_600_000_000_000, value: 0.5 };
/// let id = store.append(&Record::new("load1", LabelSet::new(), vec![point])).unwrap();
/// assert_eq!(store.read(id).unwrap().points, vec![point]);
/// ```
#[derive(Debug)]
pub struct Store {
    index_path: PathBuf,
    data_path: PathBuf,
    options: StoreOptions,
    files: RwLock<Files>,
    writer: Mutex<WriterState>,
    published: AtomicU64,
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

fn io_error<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> MdbError + 'a {
    move |source| MdbError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

fn corrupt(path: &Path, offset: u64, reason: &str) -> MdbError {
    MdbError::Corrupt {
        path: path.to_path_buf(),
        offset,
        reason: reason.to_owned(),
    }
}

fn open_file(path: &Path) -> Result<File, MdbError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(io_error("open", path))
}

fn create_file(path: &Path) -> Result<File, MdbError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(io_error("create", path))
}

fn file_len(file: &File, path: &Path) -> Result<u64, MdbError> {
    Ok(file.metadata().map_err(io_error("stat", path))?.len())
}

fn sync_if(sync: bool, file: &File, path: &Path) -> Result<(), MdbError> {
    if sync {
        file.sync_data().map_err(io_error("sync", path))?;
    }
    Ok(())
}

fn read_range(file: &File, path: &Path, offset: u64, len: u64) -> Result<Vec<u8>, MdbError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len as usize)?;
    buf.resize(len as usize, 0);
    file.read_exact_at(&mut buf, offset)
        .map_err(io_error("read", path))?;
    Ok(buf)
}

fn read_index_entry(file: &File, path: &Path, id: RecordId) -> Result<IndexEntry, MdbError> {
    let mut buf = [0u8; INDEX_ENTRY_SIZE as usize];
    file.read_exact_at(&mut buf, index_slot(id))
        .map_err(io_error("read index", path))?;
    Ok(IndexEntry::from_bytes(&buf))
}

/// Writes the header of an empty file, or checks the header of an existing one.
fn init_header(file: &File, path: &Path, magic: u64) -> Result<(), MdbError> {
    let len = file_len(file, path)?;
    if len == 0 {
        file.write_all_at(&FileHeader::new(magic).to_bytes(), 0)
            .map_err(io_error("write header", path))?;
        return file.sync_all().map_err(io_error("sync", path));
    }
    if len < HEADER_SIZE {
        return Err(corrupt(path, 0, "file is shorter than its header"));
    }

    let mut buf = [0u8; HEADER_SIZE as usize];
    file.read_exact_at(&mut buf, 0)
        .map_err(io_error("read header", path))?;
    let header = FileHeader::read_from(&mut &buf[..]).map_err(io_error("read header", path))?;
    if header.magic != magic {
        return Err(MdbError::FormatMismatch {
            path: path.to_path_buf(),
            reason: format!("unexpected magic {:#018x}", header.magic),
        });
    }
    if header.version != VERSION {
        return Err(MdbError::FormatMismatch {
            path: path.to_path_buf(),
            reason: format!("unsupported version {}", header.version),
        });
    }
    Ok(())
}

/// Validates the data entry starting at `pos` of a fully loaded data file.
fn entry_at(data: &[u8], pos: usize) -> Result<DataEntryHeader, &'static str> {
    let header = DataEntryHeader::from_bytes(&data[pos..]).ok_or("truncated entry header")?;
    if header.magic != ENTRY_MAGIC {
        return Err("bad entry magic");
    }
    let end = pos as u64 + header.entry_len();
    if end > data.len() as u64 {
        return Err("entry extends past the end of the file");
    }
    verify_entry(&data[pos..end as usize])
}

impl Store {
    /// Opens the `<base>.idx` / `<base>.dat` pair, creating it when absent.
    ///
    /// Data entries found after the last indexed record were left by a crash between the data
    /// and index writes. Complete ones are indexed again; anything after them is truncated.
    pub fn open<P: AsRef<Path>>(base: P, options: StoreOptions) -> Result<Store, MdbError> {
        let base = base.as_ref();
        let index_path = with_suffix(base, ".idx");
        let data_path = with_suffix(base, ".dat");

        let index = open_file(&index_path)?;
        let data = open_file(&data_path)?;
        init_header(&index, &index_path, INDEX_MAGIC)?;
        init_header(&data, &data_path, DATA_MAGIC)?;

        let index_len = file_len(&index, &index_path)?;
        let mut data_len = file_len(&data, &data_path)?;
        if (index_len - HEADER_SIZE) % INDEX_ENTRY_SIZE != 0 {
            return Err(corrupt(
                &index_path,
                index_len,
                "index length is not a header plus whole entries",
            ));
        }
        let mut count = (index_len - HEADER_SIZE) / INDEX_ENTRY_SIZE;

        let mut indexed_end = HEADER_SIZE;
        let mut slot = count;
        while slot > 0 {
            slot -= 1;
            let entry = read_index_entry(&index, &index_path, slot)?;
            if entry.is_deleted() {
                continue;
            }
            if entry.end() > data_len {
                return Err(corrupt(
                    &index_path,
                    index_slot(slot),
                    "last index entry ends past the data file",
                ));
            }
            indexed_end = entry.end();
            break;
        }

        if data_len > indexed_end {
            let tail = read_range(&data, &data_path, indexed_end, data_len - indexed_end)?;
            let mut pos = 0;
            let mut reindexed = 0;
            while pos < tail.len() {
                let header = match entry_at(&tail, pos) {
                    Ok(header) => header,
                    Err(_) => break,
                };
                if header.is_tombstone() {
                    if header.idx < count {
                        index
                            .write_all_at(&IndexEntry::DELETED.to_bytes(), index_slot(header.idx))
                            .map_err(io_error("write index", &index_path))?;
                    }
                } else if header.idx == count {
                    let entry = IndexEntry {
                        crc: header.crc,
                        size: header.entry_len() as u32,
                        offset: indexed_end + pos as u64,
                    };
                    index
                        .write_all_at(&entry.to_bytes(), index_slot(count))
                        .map_err(io_error("write index", &index_path))?;
                    count += 1;
                    reindexed += 1;
                } else if header.idx > count {
                    break;
                }
                pos += header.entry_len() as usize;
            }

            if reindexed > 0 {
                warn!(
                    "{}: indexed {} records written after the last index update",
                    index_path.display(),
                    reindexed
                );
            }
            let valid_end = indexed_end + pos as u64;
            if valid_end < data_len {
                warn!(
                    "{}: truncating {} bytes of incomplete data at offset {}",
                    data_path.display(),
                    data_len - valid_end,
                    valid_end
                );
                data.set_len(valid_end)
                    .map_err(io_error("truncate", &data_path))?;
                data_len = valid_end;
            }
            sync_if(options.sync, &index, &index_path)?;
            sync_if(options.sync, &data, &data_path)?;
        }

        debug!("opened {} with {} records", base.display(), count);
        Ok(Store {
            index_path,
            data_path,
            options,
            files: RwLock::new(Files { index, data }),
            writer: Mutex::new(WriterState {
                next_id: count,
                data_len,
            }),
            published: AtomicU64::new(count),
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Number of readable slots, deleted ones included.
    pub fn len(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a record and returns its id.
    pub fn append(&self, record: &Record) -> Result<RecordId, MdbError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let id = writer.next_id;
        let entry = encode_entry(id, record)?;
        let slot = IndexEntry {
            crc: LittleEndian::read_u32(&entry[4..8]),
            size: entry.len() as u32,
            offset: writer.data_len,
        };

        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        files
            .data
            .write_all_at(&entry, writer.data_len)
            .map_err(io_error("append data", &self.data_path))?;
        sync_if(self.options.sync, &files.data, &self.data_path)?;
        files
            .index
            .write_all_at(&slot.to_bytes(), index_slot(id))
            .map_err(io_error("append index", &self.index_path))?;
        sync_if(self.options.sync, &files.index, &self.index_path)?;

        writer.data_len += entry.len() as u64;
        writer.next_id += 1;
        self.published.store(writer.next_id, Ordering::Release);
        Ok(id)
    }

    /// Loads the verified data entry of `id`.
    fn load(
        &self,
        files: &Files,
        id: RecordId,
    ) -> Result<(IndexEntry, DataEntryHeader, Vec<u8>), MdbError> {
        let slot = read_index_entry(&files.index, &self.index_path, id)?;
        if slot.is_deleted() {
            return Err(MdbError::Deleted(id));
        }
        let bad = |reason: &str| corrupt(&self.data_path, slot.offset, reason);

        if u64::from(slot.size) < DATA_ENTRY_HEADER_SIZE {
            return Err(bad("index entry is smaller than an entry header"));
        }
        let data_len = file_len(&files.data, &self.data_path)?;
        match slot.offset.checked_add(u64::from(slot.size)) {
            Some(end) if end <= data_len => {}
            _ => return Err(bad("entry extends past the end of the data file")),
        }
        let mut entry = Vec::new();
        entry.try_reserve_exact(slot.size as usize)?;
        entry.resize(slot.size as usize, 0);
        files
            .data
            .read_exact_at(&mut entry, slot.offset)
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => bad("entry extends past the end of the data file"),
                _ => io_error("read data", &self.data_path)(e),
            })?;

        let header = verify_entry(&entry).map_err(bad)?;
        if header.crc != slot.crc {
            return Err(bad("index and data checksums differ"));
        }
        if header.idx != id {
            return Err(bad("entry belongs to another record"));
        }
        if header.is_tombstone() {
            return Err(bad("index points at a tombstone"));
        }
        Ok((slot, header, entry))
    }

    /// Reads a record. Damage to this record is reported as `Corrupt` and does not affect
    /// other records.
    pub fn read(&self, id: RecordId) -> Result<Record, MdbError> {
        if id >= self.len() {
            return Err(MdbError::NotFound(id));
        }
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        // recover may have shrunk the index before the lock was taken
        if id >= self.len() {
            return Err(MdbError::NotFound(id));
        }
        let (slot, header, entry) = self.load(&files, id)?;
        decode_payload(&header, &entry[DATA_ENTRY_HEADER_SIZE as usize..])
            .map_err(|reason| corrupt(&self.data_path, slot.offset, reason))
    }

    /// Deletes a record: a tombstone is appended to the data file, then the index slot is
    /// cleared. The id is not reused.
    pub fn delete(&self, id: RecordId) -> Result<(), MdbError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if id >= writer.next_id {
            return Err(MdbError::NotFound(id));
        }
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        if read_index_entry(&files.index, &self.index_path, id)?.is_deleted() {
            return Err(MdbError::Deleted(id));
        }

        let tombstone = encode_tombstone(id);
        files
            .data
            .write_all_at(&tombstone, writer.data_len)
            .map_err(io_error("append data", &self.data_path))?;
        sync_if(self.options.sync, &files.data, &self.data_path)?;
        files
            .index
            .write_all_at(&IndexEntry::DELETED.to_bytes(), index_slot(id))
            .map_err(io_error("write index", &self.index_path))?;
        sync_if(self.options.sync, &files.index, &self.index_path)?;

        writer.data_len += tombstone.len() as u64;
        Ok(())
    }

    /// Rewrites both files without deleted records and tombstones. Record ids do not change;
    /// slots of deleted records stay cleared. Records that fail verification are dropped with
    /// a warning.
    pub fn compact(&self) -> Result<(), MdbError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        let data_tmp = with_suffix(&self.data_path, ".tmp");
        let index_tmp = with_suffix(&self.index_path, ".tmp");
        let new_data = create_file(&data_tmp)?;
        let new_index = create_file(&index_tmp)?;

        let mut kept = 0;
        let mut data_len = HEADER_SIZE;
        {
            let mut data_w = BufWriter::new(&new_data);
            let mut index_w = BufWriter::new(&new_index);
            FileHeader::new(DATA_MAGIC)
                .write_to(&mut data_w)
                .map_err(io_error("write header", &data_tmp))?;
            FileHeader::new(INDEX_MAGIC)
                .write_to(&mut index_w)
                .map_err(io_error("write header", &index_tmp))?;

            for id in 0..writer.next_id {
                let slot = match self.load(&files, id) {
                    Ok((_, header, entry)) => {
                        data_w
                            .write_all(&entry)
                            .map_err(io_error("write data", &data_tmp))?;
                        let slot = IndexEntry {
                            crc: header.crc,
                            size: entry.len() as u32,
                            offset: data_len,
                        };
                        data_len += entry.len() as u64;
                        kept += 1;
                        slot
                    }
                    Err(MdbError::Deleted(_)) => IndexEntry::DELETED,
                    Err(e @ MdbError::Corrupt { .. }) => {
                        warn!("dropping record {} during compaction: {}", id, e);
                        IndexEntry::DELETED
                    }
                    Err(e) => return Err(e),
                };
                index_w
                    .write_all(&slot.to_bytes())
                    .map_err(io_error("write index", &index_tmp))?;
            }

            data_w.flush().map_err(io_error("write data", &data_tmp))?;
            index_w.flush().map_err(io_error("write index", &index_tmp))?;
        }
        new_data.sync_all().map_err(io_error("sync", &data_tmp))?;
        new_index.sync_all().map_err(io_error("sync", &index_tmp))?;

        fs::rename(&data_tmp, &self.data_path).map_err(io_error("rename", &data_tmp))?;
        fs::rename(&index_tmp, &self.index_path).map_err(io_error("rename", &index_tmp))?;
        *files = Files {
            index: new_index,
            data: new_data,
        };
        writer.data_len = data_len;

        info!(
            "compacted {}: kept {} of {} records",
            self.data_path.display(),
            kept,
            writer.next_id
        );
        Ok(())
    }

    /// Rebuilds the index from a full scan of the data file.
    ///
    /// Damaged spans are skipped by searching for the next entry magic. When an id appears more
    /// than once the later entry wins, and ids with no entry become deleted slots. `cancel` is
    /// polled before each entry; a canceled scan leaves the index as it was.
    pub fn recover<F>(&self, mut cancel: F) -> Result<RecoverySummary, MdbError>
    where
        F: FnMut() -> bool,
    {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);

        let data_len = file_len(&files.data, &self.data_path)?;
        let data = read_range(&files.data, &self.data_path, 0, data_len)?;
        let magic = ENTRY_MAGIC.to_le_bytes();
        let finder = memmem::Finder::new(&magic);

        let mut summary = RecoverySummary::default();
        let mut latest: BTreeMap<u64, IndexEntry> = BTreeMap::new();
        let mut pos = HEADER_SIZE as usize;
        while pos < data.len() {
            if cancel() {
                summary.canceled = true;
                warn!("recovery of {} canceled at offset {}", self.data_path.display(), pos);
                return Ok(summary);
            }

            match entry_at(&data, pos) {
                Ok(header) => {
                    let slot = if header.is_tombstone() {
                        IndexEntry::DELETED
                    } else {
                        IndexEntry {
                            crc: header.crc,
                            size: header.entry_len() as u32,
                            offset: pos as u64,
                        }
                    };
                    latest.insert(header.idx, slot);
                    summary.processed += 1;
                    pos += header.entry_len() as usize;
                }
                Err(reason) => {
                    debug!("{}: skipping offset {}: {}", self.data_path.display(), pos, reason);
                    summary.skipped += 1;
                    summary.corrupt_offsets.push(pos as u64);
                    match finder.find(&data[pos + 1..]) {
                        Some(n) => pos += 1 + n,
                        None => break,
                    }
                }
            }
        }

        let count = latest.keys().next_back().map_or(0, |&id| id + 1);
        let index_tmp = with_suffix(&self.index_path, ".tmp");
        let tmp = create_file(&index_tmp)?;
        {
            let mut w = BufWriter::new(&tmp);
            FileHeader::new(INDEX_MAGIC)
                .write_to(&mut w)
                .map_err(io_error("write header", &index_tmp))?;
            for id in 0..count {
                let slot = latest.get(&id).copied().unwrap_or(IndexEntry::DELETED);
                w.write_all(&slot.to_bytes())
                    .map_err(io_error("write index", &index_tmp))?;
            }
            w.flush().map_err(io_error("write index", &index_tmp))?;
        }
        tmp.sync_all().map_err(io_error("sync", &index_tmp))?;
        fs::rename(&index_tmp, &self.index_path).map_err(io_error("rename", &index_tmp))?;
        files.index = tmp;

        writer.next_id = count;
        writer.data_len = data_len;
        self.published.store(count, Ordering::Release);

        if summary.skipped > 0 {
            warn!(
                "recovered {}: {} entries, {} damaged spans skipped",
                self.data_path.display(),
                summary.processed,
                summary.skipped
            );
        } else {
            info!(
                "recovered {}: {} entries",
                self.data_path.display(),
                summary.processed
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::LabelSet;
    use crate::mql::Point;

    fn record(n: i64) -> Record {
        let mut labels = LabelSet::new();
        labels.add("instance", &format!("host{}", n), true, false).unwrap();
        Record::new(
            "requests_total",
            labels,
            vec![Point {
                timestamp: n * 1000,
                value: n as f64,
            }],
        )
    }

    fn open(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path().join("t"), StoreOptions::default()).unwrap()
    }

    fn flip_byte(path: &Path, offset: u64) {
        let f = OpenOptions::new().read(true).write(true).open(path).unwrap();
        let mut b = [0u8; 1];
        f.read_exact_at(&mut b, offset).unwrap();
        b[0] ^= 0xFF;
        f.write_all_at(&b, offset).unwrap();
    }

    #[test]
    fn test_create_writes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        assert!(store.is_empty());
        assert_eq!(fs::metadata(store.index_path()).unwrap().len(), HEADER_SIZE);
        assert_eq!(fs::metadata(store.data_path()).unwrap().len(), HEADER_SIZE);
        assert!(store.index_path().to_string_lossy().ends_with("t.idx"));
    }

    #[test]
    fn test_append_read_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = open(&dir);
            for n in 0..5 {
                assert_eq!(store.append(&record(n)).unwrap(), n as u64);
            }
            assert_eq!(store.read(3).unwrap(), record(3));
        }
        let store = open(&dir);
        assert_eq!(store.len(), 5);
        for n in 0..5 {
            assert_eq!(store.read(n as u64).unwrap(), record(n));
        }
        match store.read(5) {
            Err(MdbError::NotFound(5)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_payload_is_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.append(&record(0)).unwrap();
        store.append(&record(1)).unwrap();
        flip_byte(store.data_path(), HEADER_SIZE + DATA_ENTRY_HEADER_SIZE + 3);

        match store.read(0) {
            Err(MdbError::Corrupt { offset, .. }) => assert_eq!(offset, HEADER_SIZE),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.read(1).unwrap(), record(1));
    }

    #[test]
    fn test_oversized_index_entry_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.append(&record(0)).unwrap();
        store.append(&record(1)).unwrap();
        let f = OpenOptions::new().write(true).open(store.index_path()).unwrap();
        f.write_all_at(&u32::MAX.to_le_bytes(), index_slot(0) + 4)
            .unwrap();

        match store.read(0) {
            Err(e @ MdbError::Corrupt { .. }) => {
                assert!(e.to_string().contains("past the end"), "{}", e)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.read(1).unwrap(), record(1));
    }

    #[test]
    fn test_read_after_recover_shrinks_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for n in 0..3 {
            store.append(&record(n)).unwrap();
        }
        // drop the last data entry so recovery finds only two records
        let f = OpenOptions::new().write(true).open(store.data_path()).unwrap();
        let entry_len = encode_entry(2, &record(2)).unwrap().len() as u64;
        let len = f.metadata().unwrap().len();
        f.set_len(len - entry_len).unwrap();

        let summary = store.recover(|| false).unwrap();
        assert_eq!(summary.processed, 2);
        match store.read(2) {
            Err(MdbError::NotFound(2)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(store.read(1).unwrap(), record(1));
    }

    #[test]
    fn test_format_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let index_path = store.index_path().to_path_buf();
        drop(store);
        flip_byte(&index_path, 0);
        match Store::open(dir.path().join("t"), StoreOptions::default()) {
            Err(MdbError::FormatMismatch { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_partial_index_entry_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.append(&record(0)).unwrap();
        let index_path = store.index_path().to_path_buf();
        drop(store);
        let f = OpenOptions::new().write(true).open(&index_path).unwrap();
        f.set_len(HEADER_SIZE + INDEX_ENTRY_SIZE + 5).unwrap();
        match Store::open(dir.path().join("t"), StoreOptions::default()) {
            Err(MdbError::Corrupt { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_delete_and_compact() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for n in 0..4 {
            store.append(&record(n)).unwrap();
        }
        store.delete(1).unwrap();
        match store.read(1) {
            Err(MdbError::Deleted(1)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(store.delete(1), Err(MdbError::Deleted(1))));
        assert!(matches!(store.delete(9), Err(MdbError::NotFound(9))));

        let before = fs::metadata(store.data_path()).unwrap().len();
        store.compact().unwrap();
        let after = fs::metadata(store.data_path()).unwrap().len();
        assert!(after < before);

        assert_eq!(store.len(), 4);
        assert_eq!(store.read(2).unwrap(), record(2));
        assert!(matches!(store.read(1), Err(MdbError::Deleted(1))));
        assert_eq!(store.append(&record(4)).unwrap(), 4);
        assert_eq!(store.read(4).unwrap(), record(4));

        drop(store);
        let store = open(&dir);
        assert_eq!(store.len(), 5);
        assert_eq!(store.read(3).unwrap(), record(3));
    }

    #[test]
    fn test_unindexed_tail_is_reindexed() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        store.append(&record(0)).unwrap();
        store.append(&record(1)).unwrap();
        let index_path = store.index_path().to_path_buf();
        drop(store);

        // lose the last index entry, as if the process died between the two writes
        let f = OpenOptions::new().write(true).open(&index_path).unwrap();
        f.set_len(HEADER_SIZE + INDEX_ENTRY_SIZE).unwrap();

        let store = open(&dir);
        assert_eq!(store.len(), 2);
        assert_eq!(store.read(1).unwrap(), record(1));
    }

    #[test]
    fn test_recover_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for n in 0..3 {
            store.append(&record(n)).unwrap();
        }
        store.delete(2).unwrap();
        let entry_len = encode_entry(0, &record(0)).unwrap().len() as u64;
        flip_byte(store.data_path(), HEADER_SIZE + entry_len + 30);
        fs::write(store.index_path(), b"garbage").unwrap();

        let summary = store.recover(|| false).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.corrupt_offsets, vec![HEADER_SIZE + entry_len]);
        assert!(!summary.canceled);

        assert_eq!(store.len(), 3);
        assert_eq!(store.read(0).unwrap(), record(0));
        assert!(matches!(store.read(1), Err(MdbError::Deleted(1))));
        assert!(matches!(store.read(2), Err(MdbError::Deleted(2))));
        assert_eq!(store.append(&record(3)).unwrap(), 3);
    }

    #[test]
    fn test_recover_cancel_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        for n in 0..3 {
            store.append(&record(n)).unwrap();
        }
        let mut polls = 0;
        let summary = store
            .recover(|| {
                polls += 1;
                polls > 1
            })
            .unwrap();
        assert!(summary.canceled);
        assert_eq!(summary.processed, 1);
        assert_eq!(store.read(2).unwrap(), record(2));
    }
}
