//! Hardware constants of the gDPB v1.00 readout format.
//!
//! All time constants are derived from the counter widths of the GET4 chip
//! and are fixed at compile time. Do not re-derive them per call.

/// Size of one clock cycle (= 1 coarse bin) in picoseconds
pub const CLOCK_CYCLE_PS: f64 = 6250.0;
/// Size of one clock cycle in nanoseconds
pub const CLOCK_CYCLE_NS: f64 = CLOCK_CYCLE_PS / 1000.0;
/// Size of one ToT bin in picoseconds
pub const TOT_BIN_PS: f64 = 50.0;

/// Fine counter mask (7 bits)
pub const FINE_TIME_MASK: u32 = 0x0000007F;
/// Fine counter offset within the timestamp field
pub const FINE_TIME_SHIFT: u32 = 0;
/// Coarse counter mask (12 bits)
pub const COARSE_TIME_MASK: u32 = 0x0007FF80;
/// Coarse counter offset within the timestamp field
pub const COARSE_TIME_SHIFT: u32 = 7;

/// Number of values of the fine counter
pub const FINE_COUNTER_SIZE: u32 = (FINE_TIME_MASK >> FINE_TIME_SHIFT) + 1;
/// Number of values of the coarse counter
pub const COARSE_COUNTER_SIZE: u32 = (COARSE_TIME_MASK >> COARSE_TIME_SHIFT) + 1;
/// Number of usable fine bins within one clock cycle. The remaining bins up
/// to [`FINE_COUNTER_SIZE`] are never produced by the chip.
pub const FINE_BINS_PER_CYCLE: f64 = 112.0;

/// Size of one fine bin in picoseconds (non-linearity neglected)
pub const BIN_SIZE_PS: f64 = CLOCK_CYCLE_PS / FINE_COUNTER_SIZE as f64;
/// Epoch length in fine bins
pub const EPOCH_IN_BINS: u32 = FINE_TIME_MASK + COARSE_TIME_MASK + 1;
/// Epoch length in picoseconds
pub const EPOCH_IN_PS: f64 = EPOCH_IN_BINS as f64 * BIN_SIZE_PS;
/// Epoch length in nanoseconds
pub const EPOCH_IN_NS: f64 = EPOCH_IN_PS / 1000.0;

/// Largest value of the on-chip epoch counter (31 bits)
pub const EPOCH_COUNTER_MASK: u32 = 0x7FFF_FFFF;
/// Modulus applied when extending an epoch number with the cycle counter
pub const EPOCH_CYCLE_MODULUS: u64 = EPOCH_COUNTER_MASK as u64 + 1;
/// Mask of the epoch cycle field in the leading word of a microslice (21 bits)
pub const EPOCH_CYCLE_FIELD_MASK: u64 = 0x1F_FFFF;

/// Chip id used by the firmware for merged epoch messages
pub const CHIP_ID_MERGED_EPOCH: u32 = 255;

/// Size of one wire message in bytes
pub const BYTES_PER_MESSAGE: usize = 8;

/// Subsystem identifier of the TOF components in a timeslice
pub const SYS_ID_TOF: u8 = 0x60;
/// Subsystem identifier of the T0 components; decoded by the same path
pub const SYS_ID_T0: u8 = 0x90;

/// Channels per GET4 chip (channel field is 2 bits)
pub const CHANNELS_PER_CHIP: usize = 4;
/// Chip slots per board (chip field is 8 bits)
pub const CHIPS_PER_BOARD: usize = 256;
/// Size of the dense per-board mapping array
pub const CHANNELS_PER_BOARD: usize = CHANNELS_PER_CHIP * CHIPS_PER_BOARD;
