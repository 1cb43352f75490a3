// Mapping from the readout hardware address triple (board, chip, channel) to
// the global detector address. The mapping file pairs an encoded hardware key
// with the detector address it is cabled to:
// key = (board << 12) | (chip << 4) | channel
// A detector address of 0 means the slot is present in the file but not
// connected to anything; 0 is also what lookups return for slots the file
// never mentions, so the unpacker treats 0 uniformly as "drop this hit".
use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::constants::{CHANNELS_PER_BOARD, CHANNELS_PER_CHIP};
use super::error::ChannelMapError;

/// Split an encoded mapping key into (board, chip, channel).
/// Board occupies bits 12.., chip bits 4-11, channel bits 0-1.
pub fn decompose_key(key: u32) -> (u16, u8, u8) {
    ((key >> 12) as u16, ((key >> 4) & 0xFF) as u8, (key & 0x3) as u8)
}

/// Compose the encoded hardware key used by the mapping file and by the wire
/// messages themselves
pub fn compose_address(board: u16, chip: u8, channel: u8) -> u32 {
    ((board as u32) << 12) + ((chip as u32) << 4) + channel as u32
}

/// ChannelMap translates (board id, GET4 chip, channel) into the global
/// detector address used downstream.
///
/// The outer lookup is keyed by board id; each board holds a dense array of
/// 1024 slots (256 chips x 4 channels) so the per-hit lookup in the decode
/// loop is a single hash probe plus an index. The cabling changes between
/// campaigns, so the map is read from a plain text file of whitespace
/// separated `key value` pairs.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    boards: FxHashMap<u16, Vec<u32>>,
    loaded: bool,
}

impl ChannelMap {
    /// Load the mapping from a text file, replacing any previous content.
    ///
    /// The new table is built completely before it is swapped in, so a reader
    /// of this map never observes a partially populated table. Parsing stops
    /// silently at the first token that is not an unsigned integer, matching
    /// the read-until-failure behavior of the original parameter files.
    pub fn load(&mut self, path: &Path) -> Result<(), ChannelMapError> {
        spdlog::info!("Reading channel mapping from file: {}", path.display());
        if !path.exists() {
            return Err(ChannelMapError::NotFound(path.to_path_buf()));
        }
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;

        let mut pairs: Vec<(u32, u32)> = Vec::new();
        let mut tokens = contents.split_whitespace();
        loop {
            let key = match tokens.next().map(str::parse::<u32>) {
                Some(Ok(k)) => k,
                _ => break,
            };
            let value = match tokens.next().map(str::parse::<u32>) {
                Some(Ok(v)) => v,
                _ => break,
            };
            pairs.push((key, value));
        }

        let fresh = ChannelMap::from_pairs(&pairs);
        self.boards = fresh.boards;
        self.loaded = true;
        spdlog::info!(
            "Finished reading channel mapping: {} entries on {} boards",
            pairs.len(),
            self.boards.len()
        );
        Ok(())
    }

    /// Build a map directly from decoded (key, address) pairs
    pub fn from_pairs(pairs: &[(u32, u32)]) -> Self {
        let mut map = ChannelMap {
            boards: FxHashMap::default(),
            loaded: true,
        };
        for (key, value) in pairs {
            let (board, chip, channel) = decompose_key(*key);
            if *value == 0 {
                spdlog::warn!("Mapping key {} maps to nothing (address 0)", key);
            }
            let slots = map
                .boards
                .entry(board)
                .or_insert_with(|| vec![0u32; CHANNELS_PER_BOARD]);
            slots[chip as usize * CHANNELS_PER_CHIP + channel as usize] = *value;
        }
        map
    }

    /// Global detector address for a hardware triple; 0 when the board is
    /// unknown or the slot is unmapped
    pub fn lookup(&self, board: u16, chip: u8, channel: u8) -> u32 {
        match self.boards.get(&board) {
            Some(slots) => slots[chip as usize * CHANNELS_PER_CHIP + channel as usize],
            None => 0,
        }
    }

    /// Dense slot array of one board, for callers that resolve many hits of
    /// the same board in a row
    pub fn board(&self, board: u16) -> Option<&[u32]> {
        self.boards.get(&board).map(Vec::as_slice)
    }

    /// Distinguishes "never loaded / failed to load" from "loaded, possibly
    /// empty"
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}
