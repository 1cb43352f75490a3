use std::path::Path;

use super::constants::{SYS_ID_T0, SYS_ID_TOF};
use super::digi::TofDigi;
use super::digi_writer::DigiWriter;
use super::error::{ChannelMapError, DigiWriterError};
use super::timeslice::Timeslice;
use super::unpacker::TofUnpacker;

/// TimesliceUnpacker drives the [`TofUnpacker`] over whole timeslices.
///
/// It selects the components carrying TOF (or T0) data, decodes every core
/// microslice of those components and accumulates the emitted digis in one
/// collection. The collection persists across timeslices until
/// [`TimesliceUnpacker::save`] sorts it, hands it to the digi writer and
/// releases its storage.
///
/// Workers running in parallel each own a private TimesliceUnpacker; merging
/// their output is the caller's concern. There is no locking in here.
#[derive(Debug, Default)]
pub struct TimesliceUnpacker {
    unpacker: TofUnpacker,
    digis: Vec<TofDigi>,
    overlap_ms: usize,
    timeslice_count: usize,
    timeslice_error_count: usize,
}

impl TimesliceUnpacker {
    /// Create a dispatcher that skips `overlap_ms` trailing microslices of
    /// every component (the overlap region shared with the next timeslice)
    pub fn new(overlap_ms: usize) -> Self {
        TimesliceUnpacker {
            overlap_ms,
            ..TimesliceUnpacker::default()
        }
    }

    /// Load or reload the channel mapping of the inner unpacker. Must not be
    /// called while a decode is in flight; the engine offers no internal
    /// locking.
    pub fn load_mapping(&mut self, path: &Path) -> Result<(), ChannelMapError> {
        self.unpacker.load_mapping(path)
    }

    /// Decode all TOF components of one timeslice.
    ///
    /// Returns false without touching any data when the timeslice is
    /// structurally empty or when no mapping is loaded; the caller is
    /// expected to continue with the next unit of work either way.
    pub fn process_timeslice(&mut self, ts: &Timeslice) -> bool {
        if ts.num_components() == 0 {
            spdlog::warn!("No component in timeslice {}", ts.index);
            self.timeslice_error_count += 1;
            return false;
        }
        if !self.unpacker.is_mapping_loaded() {
            spdlog::warn!(
                "No channel mapping loaded; skipping timeslice {}",
                ts.index
            );
            self.timeslice_error_count += 1;
            return false;
        }

        for component in &ts.components {
            if component.sys_id != SYS_ID_TOF && component.sys_id != SYS_ID_T0 {
                continue;
            }
            let n_core = component
                .microslices
                .len()
                .saturating_sub(self.overlap_ms);
            for ms in &component.microslices[..n_core] {
                self.unpacker
                    .process_microslice(&ms.content, ms.equipment_id, &mut self.digis);
            }
        }

        self.timeslice_count += 1;
        true
    }

    /// Sort the accumulated digis by time and write them to `path`, then
    /// drop the collection's storage and reset the engine counters.
    ///
    /// The sort is stable: digis sharing a coarse timestamp keep their
    /// insertion order.
    pub fn save(&mut self, path: &Path) -> Result<(), DigiWriterError> {
        self.digis.sort_by(|a, b| a.cmp_time(b));

        let mut writer = DigiWriter::create(path)?;
        writer.write_digis(&self.digis)?;
        writer.close()?;

        self.digis.clear();
        self.digis.shrink_to_fit();
        self.unpacker.reset_counters();
        Ok(())
    }

    pub fn digis(&self) -> &[TofDigi] {
        &self.digis
    }

    pub fn clear_digis(&mut self) {
        self.digis.clear();
        self.digis.shrink_to_fit();
    }

    pub fn is_mapping_loaded(&self) -> bool {
        self.unpacker.is_mapping_loaded()
    }

    pub fn get_errors(&self) -> u64 {
        self.unpacker.get_errors()
    }

    pub fn get_unmapped_messages(&self) -> u64 {
        self.unpacker.get_unmapped_messages()
    }

    pub fn get_unrecognized_messages(&self) -> u64 {
        self.unpacker.get_unrecognized_messages()
    }

    pub fn reset_counters(&mut self) {
        self.unpacker.reset_counters()
    }

    pub fn statistics(&self) -> String {
        let mut s = format!(
            "timeslices unpacked: {} -- missing epochs: {}, unmapped: {}, unrecognized: {}",
            self.timeslice_count,
            self.get_errors(),
            self.get_unmapped_messages(),
            self.get_unrecognized_messages()
        );
        if self.timeslice_error_count > 0 {
            s.push_str(&format!(" [{} errors]", self.timeslice_error_count));
        }
        s
    }
}
