//! Fixed-size pack header

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::format::{BinaryFormat, HEADER_MAGIC, HEADER_SIZE};
use crate::error::{Error, Result};

/// Pack file header: format plus record, user and item counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    format: BinaryFormat,
    rating_count: u32,
    user_count: u32,
    item_count: u32,
}

impl PackHeader {
    pub fn new(format: BinaryFormat, rating_count: u32, user_count: u32, item_count: u32) -> Self {
        Self {
            format,
            rating_count,
            user_count,
            item_count,
        }
    }

    /// Placeholder header written before the counts are known
    pub fn placeholder(format: BinaryFormat) -> Self {
        Self::new(format, 0, 0, 0)
    }

    pub fn format(&self) -> BinaryFormat {
        self.format
    }

    pub fn rating_count(&self) -> u32 {
        self.rating_count
    }

    pub fn user_count(&self) -> u32 {
        self.user_count
    }

    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    /// Size in bytes of the record region
    pub fn rating_data_size(&self) -> usize {
        self.rating_count as usize * self.format.record_size()
    }

    /// Parse a header from the start of `reader`.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if magic != HEADER_MAGIC {
            return Err(Error::Format(format!(
                "invalid magic {:02x}{:02x}",
                magic[0], magic[1]
            )));
        }
        let flag_word = reader.read_i16::<BigEndian>().map_err(truncated)?;
        let format = BinaryFormat::from_flag_word(flag_word)?;
        let rating_count = read_count(reader, "rating")?;
        let user_count = read_count(reader, "user")?;
        let item_count = read_count(reader, "item")?;
        Ok(Self::new(format, rating_count, user_count, item_count))
    }

    /// Parse a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Format(format!(
                "pack is {} bytes, shorter than its header",
                bytes.len()
            )));
        }
        let mut reader = &bytes[..HEADER_SIZE];
        Self::read(&mut reader)
    }

    /// Emit the 16-byte header.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&HEADER_MAGIC)?;
        writer.write_i16::<BigEndian>(self.format.flag_word())?;
        writer.write_i32::<BigEndian>(self.rating_count as i32)?;
        writer.write_i32::<BigEndian>(self.user_count as i32)?;
        writer.write_i32::<BigEndian>(self.item_count as i32)?;
        Ok(())
    }
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let count = reader.read_i32::<BigEndian>().map_err(truncated)?;
    u32::try_from(count).map_err(|_| Error::Format(format!("negative {} count {}", what, count)))
}

fn truncated(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::Format("truncated pack header".to_string())
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::format::FormatFlags;

    #[test]
    fn test_header_layout() {
        let format = BinaryFormat::new(FormatFlags::TIMESTAMPS);
        let header = PackHeader::new(format, 3, 2, 1);
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[..2], b"LK");
        assert_eq!(&buf[2..4], &[0, 1]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 3]);
        assert_eq!(PackHeader::from_bytes(&buf).unwrap(), header);
        assert_eq!(header.rating_data_size(), 3 * 32);
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = Vec::new();
        PackHeader::placeholder(BinaryFormat::new(FormatFlags::empty()))
            .write(&mut buf)
            .unwrap();
        buf[0] = b'X';
        assert!(matches!(PackHeader::from_bytes(&buf), Err(Error::Format(_))));
    }

    #[test]
    fn test_bad_flag_word() {
        let mut buf = Vec::new();
        PackHeader::placeholder(BinaryFormat::new(FormatFlags::empty()))
            .write(&mut buf)
            .unwrap();
        buf[3] = 0x40;
        assert!(matches!(PackHeader::from_bytes(&buf), Err(Error::Format(_))));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            PackHeader::from_bytes(b"LK\0"),
            Err(Error::Format(_))
        ));
    }
}
