use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use super::error::TimesliceFileError;

/// One contiguous span of raw bytes from one board: a leading epoch cycle
/// marker followed by whole 64-bit wire messages.
#[derive(Debug, Clone, Default)]
pub struct Microslice {
    /// Equipment identifier of the board that produced this data
    pub equipment_id: u16,
    pub content: Vec<u8>,
}

/// All microslices of one input link, tagged with the subsystem the link
/// belongs to
#[derive(Debug, Clone, Default)]
pub struct Component {
    pub sys_id: u8,
    pub microslices: Vec<Microslice>,
}

/// A set of components from multiple boards covering the same time window,
/// bundled for joint processing
#[derive(Debug, Clone, Default)]
pub struct Timeslice {
    pub index: u64,
    pub components: Vec<Component>,
}

impl Timeslice {
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn num_microslices(&self, component: usize) -> usize {
        self.components[component].microslices.len()
    }

    /// Total content bytes, for progress reporting
    pub fn size_bytes(&self) -> u64 {
        self.components
            .iter()
            .flat_map(|c| c.microslices.iter())
            .map(|ms| ms.content.len() as u64)
            .sum()
    }
}

/// Reader for a timeslice archive file.
///
/// The archive is a flat little-endian stream of timeslices:
///
/// ```text
/// u64 index, u32 n_components
///   per component: u8 sys_id, u32 n_microslices
///     per microslice: u16 equipment_id, u32 size, size content bytes
/// ```
///
/// The reader yields timeslices in file order until clean end-of-file.
#[derive(Debug)]
pub struct TimesliceFile {
    reader: BufReader<File>,
    size_bytes: u64,
}

impl TimesliceFile {
    pub fn open(path: &Path) -> Result<Self, TimesliceFileError> {
        if !path.exists() {
            return Err(TimesliceFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Ok(TimesliceFile {
            reader: BufReader::new(file),
            size_bytes,
        })
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Read the next timeslice from the archive.
    ///
    /// Returns None at a clean end-of-file. An end-of-file in the middle of a
    /// timeslice record is an error; the archive is damaged.
    pub fn next_timeslice(&mut self) -> Result<Option<Timeslice>, TimesliceFileError> {
        let index = match self.reader.read_u64::<LittleEndian>() {
            Ok(index) => index,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(TimesliceFileError::IOError(e)),
        };

        let n_components = self.reader.read_u32::<LittleEndian>()?;
        let mut components = Vec::with_capacity(n_components as usize);
        for _ in 0..n_components {
            let sys_id = self.reader.read_u8()?;
            let n_microslices = self.reader.read_u32::<LittleEndian>()?;
            let mut microslices = Vec::with_capacity(n_microslices as usize);
            for _ in 0..n_microslices {
                let equipment_id = self.reader.read_u16::<LittleEndian>()?;
                let size = self.reader.read_u32::<LittleEndian>()?;
                let mut content = vec![0u8; size as usize];
                self.reader.read_exact(&mut content)?;
                microslices.push(Microslice {
                    equipment_id,
                    content,
                });
            }
            components.push(Component {
                sys_id,
                microslices,
            });
        }

        Ok(Some(Timeslice { index, components }))
    }
}

/// Collect the timeslice archives (`*.tsa`) of an input directory, sorted by
/// name
pub fn find_timeslice_files(parent_path: &Path) -> Result<Vec<PathBuf>, TimesliceFileError> {
    let mut file_list: Vec<PathBuf> = Vec::new();
    for item in parent_path.read_dir()? {
        let item_path = item?.path();
        if item_path.extension().is_some_and(|ext| ext == "tsa") {
            file_list.push(item_path);
        }
    }
    file_list.sort();
    Ok(file_list)
}
