//! On-disk layout. Every integer is little-endian and structures are packed.
//!
//! ```text
//! index file: header | entry 0 | entry 1 | ...
//!   header  = magic u64 | version u64
//!   entry   = crc32c u32 | size u32 | offset u64        (all zero: deleted)
//!
//! data file:  header | data entry | data entry | ...
//!   header     = magic u64 | version u64
//!   data entry = magic u32 | crc32c u32 | idx u64 | size u32 | labels_len u16 | metric_len u16
//!                | payload[size]
//! ```
//!
//! The data entry checksum covers everything from `idx` to the end of the payload. The index
//! entry repeats it and records the full entry length (header plus payload).

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

pub const INDEX_MAGIC: u64 = 0x4E43_444D_4944_5849;
pub const DATA_MAGIC: u64 = 0x4E43_444D_4944_5844;
pub const VERSION: u64 = 1;

/// Marks the start of every data entry; found again by scanning when resynchronizing
pub const ENTRY_MAGIC: u32 = 0x4D49_4458;

pub const HEADER_SIZE: u64 = 16;
pub const INDEX_ENTRY_SIZE: u64 = 16;
pub const DATA_ENTRY_HEADER_SIZE: u64 = 24;

/// Offset of the checksummed part of a data entry
pub const CRC_START: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u64,
    pub version: u64,
}

impl FileHeader {
    pub fn new(magic: u64) -> Self {
        FileHeader {
            magic,
            version: VERSION,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(self.magic)?;
        w.write_u64::<LittleEndian>(self.version)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(FileHeader {
            magic: r.read_u64::<LittleEndian>()?,
            version: r.read_u64::<LittleEndian>()?,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        LittleEndian::write_u64(&mut out[0..8], self.magic);
        LittleEndian::write_u64(&mut out[8..16], self.version);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexEntry {
    pub crc: u32,
    pub size: u32,
    pub offset: u64,
}

impl IndexEntry {
    pub const DELETED: IndexEntry = IndexEntry {
        crc: 0,
        size: 0,
        offset: 0,
    };

    pub fn is_deleted(&self) -> bool {
        *self == IndexEntry::DELETED
    }

    pub fn end(&self) -> u64 {
        self.offset + u64::from(self.size)
    }

    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_SIZE as usize] {
        let mut out = [0u8; INDEX_ENTRY_SIZE as usize];
        LittleEndian::write_u32(&mut out[0..4], self.crc);
        LittleEndian::write_u32(&mut out[4..8], self.size);
        LittleEndian::write_u64(&mut out[8..16], self.offset);
        out
    }

    pub fn from_bytes(b: &[u8; INDEX_ENTRY_SIZE as usize]) -> Self {
        IndexEntry {
            crc: LittleEndian::read_u32(&b[0..4]),
            size: LittleEndian::read_u32(&b[4..8]),
            offset: LittleEndian::read_u64(&b[8..16]),
        }
    }
}

/// Slot position of record `id` in the index file
pub fn index_slot(id: u64) -> u64 {
    HEADER_SIZE + id * INDEX_ENTRY_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEntryHeader {
    pub magic: u32,
    pub crc: u32,
    pub idx: u64,
    pub size: u32,
    pub labels_len: u16,
    pub metric_len: u16,
}

impl DataEntryHeader {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        if b.len() < DATA_ENTRY_HEADER_SIZE as usize {
            return None;
        }
        Some(DataEntryHeader {
            magic: LittleEndian::read_u32(&b[0..4]),
            crc: LittleEndian::read_u32(&b[4..8]),
            idx: LittleEndian::read_u64(&b[8..16]),
            size: LittleEndian::read_u32(&b[16..20]),
            labels_len: LittleEndian::read_u16(&b[20..22]),
            metric_len: LittleEndian::read_u16(&b[22..24]),
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u32::<LittleEndian>(self.magic)?;
        w.write_u32::<LittleEndian>(self.crc)?;
        w.write_u64::<LittleEndian>(self.idx)?;
        w.write_u32::<LittleEndian>(self.size)?;
        w.write_u16::<LittleEndian>(self.labels_len)?;
        w.write_u16::<LittleEndian>(self.metric_len)?;
        Ok(())
    }

    /// Length of the whole entry on disk
    pub fn entry_len(&self) -> u64 {
        DATA_ENTRY_HEADER_SIZE + u64::from(self.size)
    }

    pub fn is_tombstone(&self) -> bool {
        self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_bytes() {
        let mut buf = Vec::new();
        FileHeader::new(INDEX_MAGIC).write_to(&mut buf).unwrap();
        assert_eq!(&buf[0..8], b"IXDIMDCN");
        assert_eq!(FileHeader::new(DATA_MAGIC).to_bytes()[0], b'D');
        assert_eq!(ENTRY_MAGIC.to_le_bytes(), [0x58, 0x44, 0x49, 0x4D]);
    }

    #[test]
    fn test_header_roundtrip() {
        let header = FileHeader::new(DATA_MAGIC);
        let bytes = header.to_bytes();
        assert_eq!(FileHeader::read_from(&mut &bytes[..]).unwrap(), header);
    }

    #[test]
    fn test_index_entry_layout() {
        let entry = IndexEntry {
            crc: 0x0102_0304,
            size: 40,
            offset: 16,
        };
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(IndexEntry::from_bytes(&bytes), entry);
        assert_eq!(entry.end(), 56);
        assert!(IndexEntry::from_bytes(&[0; 16]).is_deleted());
    }

    #[test]
    fn test_data_entry_header_layout() {
        let header = DataEntryHeader {
            magic: ENTRY_MAGIC,
            crc: 7,
            idx: 3,
            size: 100,
            labels_len: 10,
            metric_len: 5,
        };
        let mut buf = Vec::new();
        header.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, DATA_ENTRY_HEADER_SIZE);
        assert_eq!(DataEntryHeader::from_bytes(&buf), Some(header));
        assert_eq!(DataEntryHeader::from_bytes(&buf[..23]), None);
        assert_eq!(header.entry_len(), 124);
    }
}
