use super::format::{DataEntryHeader, CRC_START, DATA_ENTRY_HEADER_SIZE, ENTRY_MAGIC};
use crate::buf::StrBuf;
use crate::errors::MdbError;
use crate::metric::LabelSet;
use crate::mql::Point;
use byteorder::{ByteOrder, LittleEndian};

const POINT_SIZE: usize = 16;

/// A stored series chunk: metric name, labels and points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub name: String,
    pub labels: LabelSet,
    pub points: Vec<Point>,
}

impl Record {
    pub fn new(name: &str, labels: LabelSet, points: Vec<Point>) -> Self {
        Record {
            name: name.to_owned(),
            labels,
            points,
        }
    }
}

/// Encodes `record` as a complete data entry for slot `idx`.
pub(crate) fn encode_entry(idx: u64, record: &Record) -> Result<Vec<u8>, MdbError> {
    let mut labels = StrBuf::with_capacity(record.labels.strlen() + 2);
    record.labels.marshal(&mut labels)?;

    let metric_len = u16_len(record.name.len(), "metric name")?;
    let labels_len = u16_len(labels.len(), "label set")?;
    let payload_len = record
        .points
        .len()
        .checked_mul(POINT_SIZE)
        .and_then(|n| n.checked_add(record.name.len() + labels.len()))
        .filter(|&n| n as u64 <= u64::from(u32::MAX) - DATA_ENTRY_HEADER_SIZE)
        .ok_or(MdbError::RecordTooLarge("payload"))?;

    let mut entry = Vec::new();
    entry.try_reserve_exact(DATA_ENTRY_HEADER_SIZE as usize + payload_len)?;
    entry.resize(DATA_ENTRY_HEADER_SIZE as usize, 0);
    entry.extend_from_slice(record.name.as_bytes());
    entry.extend_from_slice(labels.as_str().as_bytes());
    let mut point = [0u8; POINT_SIZE];
    for p in &record.points {
        LittleEndian::write_i64(&mut point[0..8], p.timestamp);
        LittleEndian::write_f64(&mut point[8..16], p.value);
        entry.extend_from_slice(&point);
    }

    seal(&mut entry, idx, payload_len as u32, labels_len, metric_len);
    Ok(entry)
}

/// A data entry without payload that marks slot `idx` deleted.
pub(crate) fn encode_tombstone(idx: u64) -> Vec<u8> {
    let mut entry = vec![0u8; DATA_ENTRY_HEADER_SIZE as usize];
    seal(&mut entry, idx, 0, 0, 0);
    entry
}

/// Fills the header of `entry` and computes its checksum.
fn seal(entry: &mut [u8], idx: u64, size: u32, labels_len: u16, metric_len: u16) {
    LittleEndian::write_u32(&mut entry[0..4], ENTRY_MAGIC);
    LittleEndian::write_u64(&mut entry[8..16], idx);
    LittleEndian::write_u32(&mut entry[16..20], size);
    LittleEndian::write_u16(&mut entry[20..22], labels_len);
    LittleEndian::write_u16(&mut entry[22..24], metric_len);
    let crc = crc32c::crc32c(&entry[CRC_START..]);
    LittleEndian::write_u32(&mut entry[4..8], crc);
}

fn u16_len(len: usize, field: &'static str) -> Result<u16, MdbError> {
    if len > usize::from(u16::MAX) {
        Err(MdbError::RecordTooLarge(field))
    } else {
        Ok(len as u16)
    }
}

/// Checks framing and checksum of a complete data entry. Returns the parsed header, or the
/// reason the entry is invalid.
pub(crate) fn verify_entry(entry: &[u8]) -> Result<DataEntryHeader, &'static str> {
    let header = DataEntryHeader::from_bytes(entry).ok_or("entry is shorter than its header")?;
    if header.magic != ENTRY_MAGIC {
        return Err("bad entry magic");
    }
    if header.entry_len() != entry.len() as u64 {
        return Err("entry length does not match its header");
    }
    if crc32c::crc32c(&entry[CRC_START..]) != header.crc {
        return Err("checksum mismatch");
    }
    Ok(header)
}

/// Decodes the payload of a verified data entry.
pub(crate) fn decode_payload(header: &DataEntryHeader, payload: &[u8]) -> Result<Record, &'static str> {
    let metric_len = usize::from(header.metric_len);
    let labels_len = usize::from(header.labels_len);
    if payload.len() < metric_len + labels_len
        || (payload.len() - metric_len - labels_len) % POINT_SIZE != 0
    {
        return Err("payload lengths are inconsistent");
    }

    let name = std::str::from_utf8(&payload[..metric_len]).map_err(|_| "metric name is not utf-8")?;
    let labels_text = std::str::from_utf8(&payload[metric_len..metric_len + labels_len])
        .map_err(|_| "labels are not utf-8")?;
    let labels: LabelSet = labels_text.parse().map_err(|_| "labels do not parse")?;

    let points = payload[metric_len + labels_len..]
        .chunks_exact(POINT_SIZE)
        .map(|c| Point {
            timestamp: LittleEndian::read_i64(&c[0..8]),
            value: LittleEndian::read_f64(&c[8..16]),
        })
        .collect();

    Ok(Record {
        name: name.to_owned(),
        labels,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut labels = LabelSet::new();
        labels.add("host", "db1", true, false).unwrap();
        labels.add("cpu", "0", true, false).unwrap();
        Record::new(
            "node_cpu_seconds_total",
            labels,
            vec![
                Point {
                    timestamp: 1000,
                    value: 1.5,
                },
                Point {
                    timestamp: 2000,
                    value: -3.0,
                },
            ],
        )
    }

    #[test]
    fn test_checksum_is_castagnoli() {
        assert_eq!(crc32c::crc32c(b"123456789"), 0xE306_9283);
        assert_eq!(crc32c::crc32c(&[0u8; 32]), 0x8A91_36AA);

        let entry = encode_entry(7, &sample()).unwrap();
        let (head, tail) = entry[CRC_START..].split_at(10);
        let incremental = crc32c::crc32c_append(crc32c::crc32c(head), tail);
        assert_eq!(incremental, LittleEndian::read_u32(&entry[4..8]));
    }

    #[test]
    fn test_entry_layout() {
        let record = sample();
        let entry = encode_entry(9, &record).unwrap();
        let header = verify_entry(&entry).unwrap();
        let labels_text = r#"{cpu="0",host="db1"}"#;

        assert_eq!(&entry[0..4], &[0x58, 0x44, 0x49, 0x4D]);
        assert_eq!(header.idx, 9);
        assert_eq!(usize::from(header.metric_len), record.name.len());
        assert_eq!(usize::from(header.labels_len), labels_text.len());
        assert_eq!(
            header.size as usize,
            record.name.len() + labels_text.len() + 2 * POINT_SIZE
        );
        let payload = &entry[DATA_ENTRY_HEADER_SIZE as usize..];
        assert_eq!(decode_payload(&header, payload).unwrap(), record);
    }

    #[test]
    fn test_corruption_is_detected() {
        let entry = encode_entry(0, &sample()).unwrap();
        for &at in [2usize, 5, 10, 30, entry.len() - 1].iter() {
            let mut bad = entry.clone();
            bad[at] ^= 0x40;
            assert!(verify_entry(&bad).is_err(), "flip at {}", at);
        }
        assert!(verify_entry(&entry[..entry.len() - 1]).is_err());
    }

    #[test]
    fn test_tombstone() {
        let entry = encode_tombstone(4);
        let header = verify_entry(&entry).unwrap();
        assert!(header.is_tombstone());
        assert_eq!(header.idx, 4);
    }

    #[test]
    fn test_name_too_long() {
        let record = Record::new(&"x".repeat(70_000), LabelSet::new(), vec![]);
        match encode_entry(0, &record) {
            Err(MdbError::RecordTooLarge(field)) => assert_eq!(field, "metric name"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_record() {
        let record = Record::new("up", LabelSet::new(), vec![]);
        let entry = encode_entry(1, &record).unwrap();
        let header = verify_entry(&entry).unwrap();
        assert!(!header.is_tombstone());
        let payload = &entry[DATA_ENTRY_HEADER_SIZE as usize..];
        assert_eq!(decode_payload(&header, payload).unwrap(), record);
    }
}
