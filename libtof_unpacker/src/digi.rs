use std::cmp::Ordering;
use std::fmt::Display;

/// One calibrated TOF hit.
///
/// Produced by the unpacker for every accepted hit message; never mutated
/// afterwards. The address is the mapped global detector address and is never
/// zero (zero is the mapping sentinel for "unmapped" and such hits are
/// dropped before a digi is made).
#[derive(Debug, Clone, PartialEq)]
pub struct TofDigi {
    /// Global detector address
    pub address: u32,
    /// Absolute time in nanoseconds
    pub time_ns: f64,
    /// Time over threshold in native ToT bins
    pub tot: u32,
}

impl TofDigi {
    pub fn new(address: u32, time_ns: f64, tot: u32) -> Self {
        TofDigi {
            address,
            time_ns,
            tot,
        }
    }

    /// Time ordering used for the output sort. NaN never occurs in decoded
    /// data, so incomparable times are treated as equal to keep the sort
    /// stable.
    pub fn cmp_time(&self, other: &TofDigi) -> Ordering {
        self.time_ns
            .partial_cmp(&other.time_ns)
            .unwrap_or(Ordering::Equal)
    }
}

impl Display for TofDigi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TofDigi: address 0x{:08x} time {} ns tot {}",
            self.address, self.time_ns, self.tot
        )
    }
}
