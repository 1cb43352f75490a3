use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use super::channel_map::ChannelMap;
use super::constants::{
    BYTES_PER_MESSAGE, CHANNELS_PER_CHIP, EPOCH_CYCLE_FIELD_MASK, EPOCH_CYCLE_MODULUS,
};
use super::digi::TofDigi;
use super::error::ChannelMapError;
use super::message::{Message, MessageType};

/// Epoch tracking state of one microslice.
///
/// A fresh state is built for every microslice; nothing carries over between
/// buffers. `last_epoch` is None until the first epoch message has been seen
/// (or quirk-mode recovery has produced a provisional value) and never goes
/// back to None within a buffer.
#[derive(Debug, Clone, Copy)]
struct EpochState {
    cycle: u64,
    last_epoch: Option<u64>,
}

impl EpochState {
    fn new(cycle: u64) -> Self {
        EpochState {
            cycle,
            last_epoch: None,
        }
    }

    /// Extend an on-chip epoch number with the cycle counter and make it the
    /// current epoch
    fn seed(&mut self, epoch_number: u32) {
        self.last_epoch = Some(epoch_number as u64 + EPOCH_CYCLE_MODULUS * self.cycle);
    }
}

/// Scan forward through the remaining messages of a microslice for the next
/// epoch message and return its epoch number.
///
/// Used by quirk-mode recovery for firmware that omits the epoch marker at
/// the start of a microslice. `start_index` counts in whole messages from the
/// beginning of `content`.
pub fn find_next_epoch(content: &[u8], start_index: usize) -> Option<u32> {
    content
        .chunks_exact(BYTES_PER_MESSAGE)
        .skip(start_index)
        .map(|chunk| Message::new(LittleEndian::read_u64(chunk)))
        .find(|mess| mess.message_type() == MessageType::Epoch)
        .map(|mess| mess.epoch_number())
}

/// TofUnpacker decodes the gDPB wire messages of one microslice at a time
/// into calibrated [`TofDigi`] records.
///
/// The unpacker owns the channel mapping and the diagnostic counters. The
/// counters accumulate across microslices until [`TofUnpacker::reset_counters`]
/// is called; everything else is buffer-scoped. Per-message data problems are
/// never fatal: the offending message is dropped and a counter incremented,
/// so the worst case outcome of a decode is zero digis.
#[derive(Debug, Clone, Default)]
pub struct TofUnpacker {
    map: ChannelMap,
    missing_epoch_errors: u64,
    unmapped_count: u64,
    unrecognized_type_count: u64,
}

impl TofUnpacker {
    pub fn new() -> Self {
        TofUnpacker::default()
    }

    pub fn with_map(map: ChannelMap) -> Self {
        TofUnpacker {
            map,
            ..TofUnpacker::default()
        }
    }

    /// Load (or reload) the channel mapping. The previous table stays in use
    /// if loading fails.
    pub fn load_mapping(&mut self, path: &Path) -> Result<(), ChannelMapError> {
        self.map.load(path)
    }

    pub fn is_mapping_loaded(&self) -> bool {
        self.map.is_loaded()
    }

    /// Hits dropped because no epoch context could be established
    pub fn get_errors(&self) -> u64 {
        self.missing_epoch_errors
    }

    /// Hits dropped because their channel resolves to no detector address
    pub fn get_unmapped_messages(&self) -> u64 {
        self.unmapped_count
    }

    /// Messages of a type the unpacker does not decode
    pub fn get_unrecognized_messages(&self) -> u64 {
        self.unrecognized_type_count
    }

    pub fn reset_counters(&mut self) {
        self.missing_epoch_errors = 0;
        self.unmapped_count = 0;
        self.unrecognized_type_count = 0;
    }

    /// Decode one microslice, appending accepted hits to `digis`.
    ///
    /// The first message of a microslice is the epoch cycle marker, not a
    /// protocol message. Trailing bytes that do not form a whole message are
    /// silently ignored. A microslice whose board is absent from the mapping
    /// is skipped entirely; that is a configuration precondition, not a data
    /// error, so no counter is touched.
    pub fn process_microslice(
        &mut self,
        content: &[u8],
        equipment_id: u16,
        digis: &mut Vec<TofDigi>,
    ) {
        let n_messages = content.len() / BYTES_PER_MESSAGE;
        if n_messages == 0 {
            return;
        }

        let Some(board_slots) = self.map.board(equipment_id) else {
            return;
        };

        let cycle = LittleEndian::read_u64(&content[0..BYTES_PER_MESSAGE]) & EPOCH_CYCLE_FIELD_MASK;
        let mut state = EpochState::new(cycle);

        // Accumulated locally so the board slice can stay borrowed for the
        // whole loop
        let mut missing_epoch_errors = 0u64;
        let mut unmapped_count = 0u64;
        let mut unrecognized_type_count = 0u64;

        for index in 1..n_messages {
            let word = LittleEndian::read_u64(
                &content[index * BYTES_PER_MESSAGE..(index + 1) * BYTES_PER_MESSAGE],
            );
            let mess = Message::new(word);

            match mess.message_type() {
                MessageType::Hit => {
                    let epoch = match state.last_epoch {
                        Some(epoch) => epoch,
                        None => {
                            // Quirk mode: some firmware versions omit the
                            // epoch marker at the start of a microslice. Take
                            // the next marker in this buffer and assume the
                            // hit belongs to the epoch just before it. The
                            // off-by-one is observed firmware behavior and
                            // must not be "fixed" here.
                            match find_next_epoch(content, index + 1) {
                                Some(next_number) => {
                                    let provisional = (next_number as u64).wrapping_sub(1)
                                        + EPOCH_CYCLE_MODULUS * state.cycle;
                                    state.last_epoch = Some(provisional);
                                    provisional
                                }
                                None => {
                                    missing_epoch_errors += 1;
                                    continue;
                                }
                            }
                        }
                    };

                    let slot = mess.chip_id() as usize * CHANNELS_PER_CHIP
                        + mess.hit_chan_id() as usize;
                    let address = board_slots[slot];
                    if address == 0 {
                        unmapped_count += 1;
                        continue;
                    }

                    digis.push(TofDigi::new(
                        address,
                        mess.full_time_ns(epoch),
                        mess.hit_tot() as u32,
                    ));
                }
                MessageType::Epoch => {
                    state.seed(mess.epoch_number());
                }
                _ => {
                    unrecognized_type_count += 1;
                }
            }
        }

        self.missing_epoch_errors += missing_epoch_errors;
        self.unmapped_count += unmapped_count;
        self.unrecognized_type_count += unrecognized_type_count;
    }
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_map::compose_address;
    use crate::constants::EPOCH_IN_NS;

    fn cycle_marker(cycle: u64) -> u64 {
        cycle & EPOCH_CYCLE_FIELD_MASK
    }

    fn epoch_word(number: u32) -> u64 {
        let mut mess = Message::default();
        mess.set_raw_type(1);
        mess.set_epoch_number(number);
        mess.data()
    }

    fn hit_word(chip: u8, chan: u8, full_ts: u32, tot: u8) -> u64 {
        let mut mess = Message::default();
        mess.set_raw_type(0);
        mess.set_chip_id(chip);
        mess.set_hit_chan_id(chan);
        mess.set_hit_full_ts(full_ts);
        mess.set_hit_tot(tot);
        mess.data()
    }

    fn system_word() -> u64 {
        let mut mess = Message::default();
        mess.set_raw_type(3);
        mess.data()
    }

    fn to_bytes(words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn test_unpacker() -> TofUnpacker {
        // Board 0x1980, chip 1, channels 0..2 mapped
        let pairs = [
            (compose_address(0x1980, 1, 0), 42),
            (compose_address(0x1980, 1, 1), 43),
            (compose_address(0x1980, 1, 2), 44),
        ];
        TofUnpacker::with_map(ChannelMap::from_pairs(&pairs))
    }

    #[test]
    fn test_find_next_epoch() {
        let buffer = to_bytes(&[
            cycle_marker(0),
            hit_word(1, 0, 10, 1),
            system_word(),
            epoch_word(5),
        ]);
        assert_eq!(find_next_epoch(&buffer, 1), Some(5));
        assert_eq!(find_next_epoch(&buffer, 4), None);
        let no_epoch = to_bytes(&[cycle_marker(0), hit_word(1, 0, 10, 1)]);
        assert_eq!(find_next_epoch(&no_epoch, 0), None);
    }

    #[test]
    fn test_end_to_end_buffer() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[
            cycle_marker(0),
            epoch_word(10),
            hit_word(1, 0, 100, 20),
            hit_word(1, 1, 200, 21),
            hit_word(1, 2, 300, 22),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(digis.len(), 3);
        assert_eq!(unpacker.get_errors(), 0);
        assert_eq!(unpacker.get_unmapped_messages(), 0);
        let addresses: Vec<u32> = digis.iter().map(|d| d.address).collect();
        assert_eq!(addresses, vec![42, 43, 44]);
        for pair in digis.windows(2) {
            assert!(pair[0].time_ns <= pair[1].time_ns);
        }
        assert!(digis[0].time_ns >= 10.0 * EPOCH_IN_NS);
    }

    #[test]
    fn test_missing_epoch_drops_hit() {
        let mut unpacker = test_unpacker();
        // Hit before any epoch, and no later epoch in the buffer either
        let buffer = to_bytes(&[cycle_marker(0), hit_word(1, 0, 100, 20)]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(digis.len(), 0);
        assert_eq!(unpacker.get_errors(), 1);
    }

    #[test]
    fn test_quirk_mode_recovery() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[
            cycle_marker(0),
            hit_word(1, 0, 100, 20),
            epoch_word(5),
            hit_word(1, 0, 100, 20),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        // First hit recovers with the epoch just before the next marker
        assert_eq!(digis.len(), 2);
        assert_eq!(unpacker.get_errors(), 0);
        assert_eq!(digis[0].address, 42);
        assert_eq!(digis[1].address, 42);
        let fine = 100.0 * (6.25 / 112.0);
        assert!((digis[0].time_ns - (4.0 * EPOCH_IN_NS + fine)).abs() < 1e-9);
        assert!((digis[1].time_ns - (5.0 * EPOCH_IN_NS + fine)).abs() < 1e-9);
    }

    #[test]
    fn test_quirk_mode_epoch_zero_wraps() {
        let mut unpacker = test_unpacker();
        // An on-chip epoch number of 0 right after a headless hit makes the
        // provisional epoch wrap to u64::MAX. Observed firmware behavior; the
        // hit is emitted, not dropped
        let buffer = to_bytes(&[
            cycle_marker(0),
            hit_word(1, 0, 0, 20),
            epoch_word(0),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(digis.len(), 1);
        assert_eq!(unpacker.get_errors(), 0);
        assert_eq!(digis[0].address, 42);
        let wrapped = u64::MAX as f64 * EPOCH_IN_NS;
        assert!((digis[0].time_ns - wrapped).abs() <= wrapped * f64::EPSILON);
    }

    #[test]
    fn test_epoch_cycle_extension() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[
            cycle_marker(2),
            epoch_word(7),
            hit_word(1, 0, 0, 20),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(digis.len(), 1);
        let extended = 7.0 + 2.0 * EPOCH_CYCLE_MODULUS as f64;
        assert!((digis[0].time_ns - extended * EPOCH_IN_NS).abs() < 1.0);

        // A later buffer with the next cycle value decodes strictly after,
        // even though its on-chip epoch number is smaller
        let later = to_bytes(&[
            cycle_marker(3),
            epoch_word(0),
            hit_word(1, 0, 0, 20),
        ]);
        unpacker.process_microslice(&later, 0x1980, &mut digis);

        assert_eq!(digis.len(), 2);
        assert!(digis[1].time_ns > digis[0].time_ns);
    }

    #[test]
    fn test_unmapped_channel_drops_hit() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[
            cycle_marker(0),
            epoch_word(10),
            hit_word(1, 0, 100, 20),
            hit_word(1, 3, 200, 21), // channel 3 not in the map
            hit_word(1, 1, 300, 22),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(digis.len(), 2);
        assert_eq!(unpacker.get_unmapped_messages(), 1);
        assert_eq!(unpacker.get_errors(), 0);
    }

    #[test]
    fn test_unknown_board_skips_buffer() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[cycle_marker(0), hit_word(1, 0, 100, 20)]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1922, &mut digis);

        // No records and no counters; an unmapped board is a configuration
        // precondition, not a data error
        assert_eq!(digis.len(), 0);
        assert_eq!(unpacker.get_errors(), 0);
        assert_eq!(unpacker.get_unmapped_messages(), 0);
    }

    #[test]
    fn test_unrecognized_types_are_counted() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[
            cycle_marker(0),
            epoch_word(1),
            system_word(),
            system_word(),
        ]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);

        assert_eq!(unpacker.get_unrecognized_messages(), 2);
        assert_eq!(digis.len(), 0);
    }

    #[test]
    fn test_counters_persist_until_reset() {
        let mut unpacker = test_unpacker();
        let buffer = to_bytes(&[cycle_marker(0), hit_word(1, 0, 100, 20)]);
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);
        assert_eq!(unpacker.get_errors(), 2);
        unpacker.reset_counters();
        assert_eq!(unpacker.get_errors(), 0);
    }

    #[test]
    fn test_truncated_trailing_bytes_ignored() {
        let mut unpacker = test_unpacker();
        let mut buffer = to_bytes(&[cycle_marker(0), epoch_word(10), hit_word(1, 0, 100, 20)]);
        buffer.extend_from_slice(&[0xAB, 0xCD, 0xEF]); // partial message
        let mut digis = Vec::new();
        unpacker.process_microslice(&buffer, 0x1980, &mut digis);
        assert_eq!(digis.len(), 1);
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let mut unpacker = test_unpacker();
        let mut digis = Vec::new();
        unpacker.process_microslice(&[], 0x1980, &mut digis);
        assert!(digis.is_empty());
    }
}
