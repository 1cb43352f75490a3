use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::digi::TofDigi;
use super::error::DigiWriterError;

/// Writes one sorted digi collection as a length-prefixed binary archive.
///
/// Layout (little endian): `u64` record count, then per record `u32` address,
/// `f64` time in nanoseconds, `u32` ToT. One archive file holds the output of
/// one timeslice.
#[derive(Debug)]
pub struct DigiWriter {
    writer: BufWriter<File>,
}

impl DigiWriter {
    pub fn create(path: &Path) -> Result<Self, DigiWriterError> {
        Ok(DigiWriter {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn write_digis(&mut self, digis: &[TofDigi]) -> Result<(), DigiWriterError> {
        self.writer.write_u64::<LittleEndian>(digis.len() as u64)?;
        for digi in digis {
            self.writer.write_u32::<LittleEndian>(digi.address)?;
            self.writer.write_f64::<LittleEndian>(digi.time_ns)?;
            self.writer.write_u32::<LittleEndian>(digi.tot)?;
        }
        Ok(())
    }

    /// Flush and close the archive, consuming the writer
    pub fn close(mut self) -> Result<(), DigiWriterError> {
        use std::io::Write;
        self.writer.flush()?;
        Ok(())
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    #[test]
    fn test_archive_layout() {
        let digis = vec![
            TofDigi::new(42, 100.5, 7),
            TofDigi::new(43, 200.25, 8),
        ];
        let path = std::env::temp_dir().join("tof_digi_layout.digi");
        let mut writer = DigiWriter::create(&path).unwrap();
        writer.write_digis(&digis).unwrap();
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 + 2 * 16);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(cursor.read_u64::<LittleEndian>().unwrap(), 2);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 42);
        assert_eq!(cursor.read_f64::<LittleEndian>().unwrap(), 100.5);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 7);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 43);
        assert_eq!(cursor.read_f64::<LittleEndian>().unwrap(), 200.25);
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 8);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_empty_collection() {
        let path = std::env::temp_dir().join("tof_digi_empty.digi");
        let mut writer = DigiWriter::create(&path).unwrap();
        writer.write_digis(&[]).unwrap();
        writer.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8);
        std::fs::remove_file(path).unwrap();
    }
}
