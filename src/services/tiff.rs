//! Minimal reader for the tag directory shared by TIFF-derived RAW formats.
//!
//! Most RAW containers (ARW, NEF, CR2, DNG, ORF, RW2, ...) inherit the TIFF
//! layout: a byte-order header followed by a chain of image file directories
//! (IFDs) mapping numeric tag IDs to values. This reader walks only the
//! handful of tags the conversion pipeline cares about: the camera model and
//! the location of the embedded preview. It is not a general TIFF parser.

use super::RawError;

pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_COMPRESSION: u16 = 0x0103;
pub const TAG_SUB_IFDS: u16 = 0x014A;
pub const TAG_JPEG_OFFSET: u16 = 0x0201; // JpegInterchangeFormat
pub const TAG_JPEG_LENGTH: u16 = 0x0202; // JpegInterchangeFormatLength

const FIELD_TYPE_ASCII: u16 = 2;

// Cap on directory entries; anything larger is garbage input.
const MAX_IFD_ENTRIES: u16 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn read_u16(self, bytes: &[u8], at: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u16::from_le_bytes(raw),
            ByteOrder::Big => u16::from_be_bytes(raw),
        })
    }

    fn read_u32(self, bytes: &[u8], at: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    pub value: u32,
}

/// Parsed top of the directory chain: IFD0 plus pointers to the places
/// previews usually live.
#[derive(Debug)]
pub struct TagDirectory {
    pub order: ByteOrder,
    pub ifd0: Vec<IfdEntry>,
    /// Offset of IFD1 (the classic thumbnail directory), when present.
    pub ifd1_offset: Option<u32>,
    /// Offset of the first SubIFD, where many cameras keep the large preview.
    pub sub_ifd_offset: Option<u32>,
}

impl TagDirectory {
    /// Validate the container header and read IFD0. Cheap: no sensor data is
    /// touched.
    pub fn parse(bytes: &[u8]) -> Result<Self, RawError> {
        let order = match bytes.get(..4) {
            Some([0x49, 0x49, 0x2A, 0x00]) => ByteOrder::Little,
            Some([0x4D, 0x4D, 0x00, 0x2A]) => ByteOrder::Big,
            _ => return Err(RawError::UnrecognizedContainer),
        };
        let ifd0_offset = order
            .read_u32(bytes, 4)
            .ok_or_else(|| RawError::Corrupted("truncated header".into()))?;
        let (ifd0, next) = read_ifd(bytes, order, ifd0_offset)?;

        let sub_ifd_offset = ifd0
            .iter()
            .find(|e| e.tag == TAG_SUB_IFDS && e.count > 0)
            .map(|e| e.value);
        let ifd1_offset = (next != 0).then_some(next);

        Ok(Self {
            order,
            ifd0,
            ifd1_offset,
            sub_ifd_offset,
        })
    }

    /// Read an ASCII tag out of IFD0. Values of four bytes or fewer are
    /// stored inline rather than at an offset and are skipped here; no real
    /// camera model fits in four bytes.
    pub fn ascii_value(&self, bytes: &[u8], tag: u16) -> Option<String> {
        let entry = self
            .ifd0
            .iter()
            .find(|e| e.tag == tag && e.field_type == FIELD_TYPE_ASCII)?;
        if entry.count <= 4 {
            return None;
        }
        let start = entry.value as usize;
        let raw = bytes.get(start..start.checked_add(entry.count as usize)?)?;
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim_end_matches('\0').trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// Read one IFD: its entry table plus the offset of the next IFD in the
/// chain (0 when the chain ends). Entries whose value offset points past the
/// end of the file are dropped.
pub fn read_ifd(
    bytes: &[u8],
    order: ByteOrder,
    offset: u32,
) -> Result<(Vec<IfdEntry>, u32), RawError> {
    let base = offset as usize;
    let entry_count = order
        .read_u16(bytes, base)
        .ok_or_else(|| RawError::Corrupted(format!("IFD offset {offset} out of range")))?;
    if entry_count > MAX_IFD_ENTRIES {
        return Err(RawError::Corrupted(format!(
            "implausible IFD entry count {entry_count}"
        )));
    }

    let mut entries = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count as usize {
        let at = base + 2 + i * 12;
        let (Some(tag), Some(field_type), Some(count), Some(value)) = (
            order.read_u16(bytes, at),
            order.read_u16(bytes, at + 2),
            order.read_u32(bytes, at + 4),
            order.read_u32(bytes, at + 8),
        ) else {
            return Err(RawError::Corrupted("truncated IFD entry table".into()));
        };
        if value as usize > bytes.len() {
            continue;
        }
        entries.push(IfdEntry {
            tag,
            field_type,
            count,
            value,
        });
    }

    let next = order
        .read_u32(bytes, base + 2 + entry_count as usize * 12)
        .unwrap_or(0);
    Ok((entries, next))
}
