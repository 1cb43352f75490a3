//! # tof_unpacker
//!
//! tof_unpacker decodes the raw readout stream of a time-of-flight
//! subdetector read out through gDPB boards carrying GET4 TDC chips. It takes
//! timeslice archives produced by the data acquisition, decodes the 64-bit
//! bit-packed wire messages of every TOF microslice into calibrated digis
//! (detector address, absolute time in nanoseconds, time over threshold) and
//! writes one time-sorted binary digi archive per timeslice.
//!
//! ## How decoding works
//!
//! A microslice is one contiguous span of bytes from one board. Its first
//! 64-bit word is an epoch cycle marker; every following word is one wire
//! message whose 3-bit tag selects hit, epoch, slow control, system or one of
//! four STAR trigger sub-types. Epoch messages carry a 31-bit epoch number
//! that the unpacker extends with the cycle counter; hit messages carry only
//! a 19-bit coarse+fine counter, so their absolute time is defined relative
//! to the most recent epoch message of the same microslice:
//!
//! ```text
//! time_ns = 25600.0 * extended_epoch + full_ts * (6.25 / 112.0)
//! ```
//!
//! Some firmware versions omit the epoch marker at the start of a
//! microslice. For hits arriving before any marker the unpacker scans forward
//! for the next epoch message and assumes the hit belongs to the epoch just
//! before it; hits with no epoch context at all are dropped and counted.
//! Unmapped channels and unrecognized message types are likewise counted and
//! dropped. No data error aborts a decode.
//!
//! ## Channel mapping format
//!
//! The channel mapping is a plain text file of whitespace separated unsigned
//! integer pairs:
//!
//! ```text
//! key value
//! ```
//!
//! where `key = (board << 12) | (chip << 4) | channel` is the hardware
//! address of one readout channel and `value` is the global detector address
//! it is cabled to. A value of 0 marks a channel that maps to nothing;
//! parsing stops silently at the first non-numeric token.
//!
//! ## Configuration
//!
//! The YAML format of a configuration file is as follows:
//!
//! ```yml
//! input_path: /data/run_0001
//! output_path: /data/run_0001_digi
//! mapping_path: /data/mapping.par
//! overlap_ms: 1
//! n_threads: 1
//! ```
//!
//! - `input_path`: directory containing the timeslice archives (`*.tsa`)
//! - `output_path`: directory to which the digi archives are written
//! - `mapping_path`: full path to the channel mapping parameter file
//! - `overlap_ms`: number of trailing overlap microslices of every component
//!   that are skipped (they are repeated in the next timeslice)
//! - `n_threads`: number of parallel worker threads to divide the archives
//!   amongst. Each worker gets a subset of the archives and a private
//!   unpacker, so no synchronization happens in the decode path. Must be at
//!   least 1.
//!
//! ## Output
//!
//! For every timeslice a file `ts_<index>.digi` is written: a little-endian
//! length-prefixed archive of the digi list, sorted by time (`u64` count,
//! then `u32` address, `f64` time_ns, `u32` tot per record).
pub mod channel_map;
pub mod config;
pub mod constants;
pub mod digi;
pub mod digi_writer;
pub mod error;
pub mod message;
pub mod process;
pub mod timeslice;
pub mod timeslice_unpacker;
pub mod unpacker;
pub mod worker_status;
