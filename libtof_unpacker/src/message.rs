use std::fmt::Display;

use super::constants::*;

/// The eight message types encoded in the 3-bit discriminant of a wire message.
///
/// The four STAR trigger sub-types carry the pieces of a 64-bit trigger
/// timestamp spread over four consecutive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hit,
    Epoch,
    SlowControl,
    System,
    StarTriggerA,
    StarTriggerB,
    StarTriggerC,
    StarTriggerD,
}

impl From<u8> for MessageType {
    /// Classify a 3-bit discriminant. Only the low 3 bits are considered,
    /// so every input maps to a valid type.
    fn from(raw: u8) -> Self {
        match raw & 0x7 {
            0 => MessageType::Hit,
            1 => MessageType::Epoch,
            2 => MessageType::SlowControl,
            3 => MessageType::System,
            4 => MessageType::StarTriggerA,
            5 => MessageType::StarTriggerB,
            6 => MessageType::StarTriggerC,
            _ => MessageType::StarTriggerD,
        }
    }
}

/// One 64-bit gDPB wire message.
///
/// The word is self-describing given its type tag; no accessor depends on any
/// other message. Accessors perform no validation: calling a hit accessor on
/// an epoch message returns whatever bits occupy that range. Callers must
/// check [`Message::message_type`] first. This permissiveness is part of the
/// format contract and is relied upon by the bit-compatibility tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Message {
    data: u64,
}

impl Message {
    pub fn new(data: u64) -> Self {
        Message { data }
    }

    pub fn data(&self) -> u64 {
        self.data
    }

    pub fn set_data(&mut self, value: u64) {
        self.data = value;
    }

    /// Extract a field of `len` bits starting at bit `shift`
    pub fn get_field(&self, shift: u32, len: u32) -> u32 {
        ((self.data >> shift) & ((1u64 << len) - 1)) as u32
    }

    /// Extract a field wider than 32 bits
    pub fn get_field_long(&self, shift: u32, len: u32) -> u64 {
        (self.data >> shift) & ((1u64 << len) - 1)
    }

    /// Overwrite a field of `len` bits starting at bit `shift`.
    /// Bits outside the field are untouched.
    pub fn set_field(&mut self, shift: u32, len: u32, value: u32) {
        let mask = (1u64 << len) - 1;
        self.data = (self.data & !(mask << shift)) | ((value as u64 & mask) << shift);
    }

    /// Overwrite a field wider than 32 bits
    pub fn set_field_long(&mut self, shift: u32, len: u32, value: u64) {
        let mask = (1u64 << len) - 1;
        self.data = (self.data & !(mask << shift)) | ((value & mask) << shift);
    }

    pub fn get_bit(&self, shift: u32) -> bool {
        (self.data >> shift) & 1 == 1
    }

    pub fn set_bit(&mut self, shift: u32, value: bool) {
        self.data = if value {
            self.data | (1u64 << shift)
        } else {
            self.data & !(1u64 << shift)
        };
    }

    // ------------------------- common fields -------------------------

    /// The raw 3-bit message type field
    pub fn raw_type(&self) -> u8 {
        self.get_field(0, 3) as u8
    }

    pub fn set_raw_type(&mut self, v: u8) {
        self.set_field(0, 3, v as u32);
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.raw_type())
    }

    /// Board (gDPB) id; present in hit, epoch, slow control and system messages
    pub fn gdpb_id(&self) -> u16 {
        self.get_field(48, 16) as u16
    }

    pub fn set_gdpb_id(&mut self, v: u16) {
        self.set_field(48, 16, v as u32);
    }

    /// GET4 chip id within the board
    pub fn chip_id(&self) -> u8 {
        self.get_field(40, 8) as u8
    }

    pub fn set_chip_id(&mut self, v: u8) {
        self.set_field(40, 8, v as u32);
    }

    // ------------------------- hit fields -------------------------

    /// Set when the hit was recorded in the legacy 24-bit format
    pub fn hit_is_24b(&self) -> bool {
        self.get_bit(39)
    }

    pub fn hit_chan_id(&self) -> u8 {
        self.get_field(32, 2) as u8
    }

    pub fn set_hit_chan_id(&mut self, v: u8) {
        self.set_field(32, 2, v as u32);
    }

    /// Combined coarse+fine timestamp counter (19 bits)
    pub fn hit_full_ts(&self) -> u32 {
        self.get_field(13, 19)
    }

    pub fn set_hit_full_ts(&mut self, v: u32) {
        self.set_field(13, 19, v);
    }

    pub fn hit_coarse(&self) -> u16 {
        self.get_field(20, 12) as u16
    }

    pub fn hit_fine(&self) -> u8 {
        self.get_field(13, 7) as u8
    }

    pub fn hit_dll_lock(&self) -> bool {
        self.get_bit(12)
    }

    /// Time over threshold in ToT bins
    pub fn hit_tot(&self) -> u8 {
        self.get_field(4, 8) as u8
    }

    pub fn set_hit_tot(&mut self, v: u8) {
        self.set_field(4, 8, v as u32);
    }

    // ------------------------- epoch fields -------------------------

    pub fn epoch_link_id(&self) -> bool {
        self.get_bit(39)
    }

    /// Epoch number (31 bits)
    pub fn epoch_number(&self) -> u32 {
        self.get_field(8, 31)
    }

    pub fn set_epoch_number(&mut self, v: u32) {
        self.set_field(8, 31, v);
    }

    pub fn epoch_sync(&self) -> bool {
        self.get_bit(7)
    }

    pub fn epoch_data_loss(&self) -> bool {
        self.get_bit(6)
    }

    pub fn epoch_epoch_loss(&self) -> bool {
        self.get_bit(5)
    }

    pub fn epoch_missmatch(&self) -> bool {
        self.get_bit(4)
    }

    // ------------------------- slow control fields -------------------------

    pub fn slc_mess(&self) -> u32 {
        self.get_field(4, 29)
    }

    pub fn slc_chan(&self) -> u8 {
        self.get_field(31, 2) as u8
    }

    pub fn slc_edge(&self) -> bool {
        self.get_bit(30)
    }

    pub fn slc_kind(&self) -> u8 {
        self.get_field(28, 2) as u8
    }

    pub fn slc_data(&self) -> u32 {
        self.get_field(4, 24)
    }

    // ------------------------- system fields -------------------------

    pub fn sys_sub_type(&self) -> u8 {
        self.get_field(38, 2) as u8
    }

    pub fn sys_link_id(&self) -> bool {
        self.get_bit(37)
    }

    pub fn sys_unknown_data(&self) -> u32 {
        self.get_field(4, 32)
    }

    // ------------------------- STAR trigger fields -------------------------

    /// Index of the trigger message within the A..D sequence (low 2 bits of
    /// the discriminant)
    pub fn star_trig_msg_index(&self) -> u8 {
        self.get_field(0, 2) as u8
    }

    pub fn star_gdpb_ts_msb_a(&self) -> u64 {
        self.get_field_long(4, 40)
    }

    pub fn set_star_gdpb_ts_msb_a(&mut self, full_gdpb_ts: u64) {
        self.set_field_long(4, 40, full_gdpb_ts >> 24);
    }

    pub fn star_gdpb_ts_lsb_b(&self) -> u64 {
        self.get_field_long(20, 24)
    }

    pub fn set_star_gdpb_ts_lsb_b(&mut self, full_gdpb_ts: u64) {
        self.set_field_long(20, 24, full_gdpb_ts);
    }

    pub fn star_ts_msb_b(&self) -> u64 {
        self.get_field_long(4, 16)
    }

    pub fn star_ts_mid_c(&self) -> u64 {
        self.get_field_long(4, 40)
    }

    pub fn star_ts_lsb_d(&self) -> u64 {
        self.get_field_long(36, 8)
    }

    /// Should always read 0
    pub fn star_filler_d(&self) -> u16 {
        self.get_field(24, 12) as u16
    }

    pub fn star_trig_cmd_d(&self) -> u8 {
        self.get_field(20, 4) as u8
    }

    pub fn star_daq_cmd_d(&self) -> u8 {
        self.get_field(16, 4) as u8
    }

    pub fn star_token_d(&self) -> u16 {
        self.get_field(4, 12) as u16
    }

    // ------------------------- time decoding -------------------------

    /// Absolute time of this message in nanoseconds, given the extended epoch
    /// it belongs to.
    ///
    /// Only a 32-bit hit message carries a usable fine timestamp; everything
    /// else is placed on its epoch boundary. For an epoch message the caller
    /// passes the epoch's own (extended) number.
    pub fn full_time_ns(&self, extended_epoch: u64) -> f64 {
        // 32b hit: type bits all zero and the 24b flag (bit 39) clear
        if self.data & 0x80_0000_0007 == 0 {
            EPOCH_IN_NS * extended_epoch as f64
                + self.hit_full_ts() as f64 * (CLOCK_CYCLE_NS / FINE_BINS_PER_CYCLE)
        } else {
            EPOCH_IN_NS * extended_epoch as f64
        }
    }

    /// Expanded integer timestamp: epoch in the high bits, the 19-bit
    /// coarse+fine counter in the low bits
    pub fn full_time_stamp(epoch: u64, ts: u32) -> u64 {
        (epoch << 19) | (ts as u64 & 0x7FFFF)
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message_type() {
            MessageType::Hit => write!(
                f,
                "Hit: board 0x{:04x} chip {} chan {} ts {} tot {}",
                self.gdpb_id(),
                self.chip_id(),
                self.hit_chan_id(),
                self.hit_full_ts(),
                self.hit_tot()
            ),
            MessageType::Epoch => write!(
                f,
                "Epoch: board 0x{:04x} chip {} epoch {}",
                self.gdpb_id(),
                self.chip_id(),
                self.epoch_number()
            ),
            MessageType::SlowControl => write!(
                f,
                "SlowControl: board 0x{:04x} chip {} chan {} kind {}",
                self.gdpb_id(),
                self.chip_id(),
                self.slc_chan(),
                self.slc_kind()
            ),
            MessageType::System => write!(
                f,
                "System: board 0x{:04x} chip {} sub-type {}",
                self.gdpb_id(),
                self.chip_id(),
                self.sys_sub_type()
            ),
            _ => write!(
                f,
                "StarTrigger: index {} raw 0x{:016x}",
                self.star_trig_msg_index(),
                self.data
            ),
        }
    }
}
