use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::config::Config;
use super::error::ProcessorError;
use super::timeslice::{find_timeslice_files, TimesliceFile};
use super::timeslice_unpacker::TimesliceUnpacker;
use super::worker_status::{BarColor, WorkerStatus};

/// Unpack one timeslice archive.
///
/// Streams the timeslices of the archive through a private dispatcher; each
/// processed timeslice is saved to its own digi archive in the output
/// directory. Write failures are logged and the run continues, matching the
/// policy that nothing in the decode path aborts the process.
pub fn process_file(
    config: &Config,
    path: &Path,
    tx: &Sender<WorkerStatus>,
    worker_id: &usize,
) -> Result<(), ProcessorError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tsu = TimesliceUnpacker::new(config.overlap_ms);
    tsu.load_mapping(&config.mapping_path)?;

    let mut ts_file = TimesliceFile::open(path)?;
    let total_size = ts_file.get_size_bytes();
    spdlog::info!(
        "Processing {} ({})",
        file_name,
        human_bytes::human_bytes(total_size as f64)
    );

    tx.send(WorkerStatus::new(
        0.0,
        file_name.clone(),
        *worker_id,
        BarColor::CYAN,
    ))?;

    let mut processed_bytes: u64 = 0;
    while let Some(ts) = ts_file.next_timeslice()? {
        processed_bytes += ts.size_bytes();
        if !tsu.process_timeslice(&ts) {
            spdlog::warn!("Skipped timeslice {} of {}", ts.index, file_name);
            continue;
        }
        let out_path = config.get_output_file_name(ts.index);
        if let Err(e) = tsu.save(&out_path) {
            // Non-fatal: report and keep the remaining timeslices
            spdlog::warn!("Failed to write {}: {}", out_path.display(), e);
            tsu.clear_digis();
            tsu.reset_counters();
        }
        tx.send(WorkerStatus::new(
            (processed_bytes as f32 / total_size as f32).min(1.0),
            file_name.clone(),
            *worker_id,
            BarColor::CYAN,
        ))?;
    }

    tx.send(WorkerStatus::new(
        1.0,
        file_name.clone(),
        *worker_id,
        BarColor::GREEN,
    ))?;
    spdlog::info!("Done with {}: {}", file_name, tsu.statistics());
    Ok(())
}

/// The function to be called by a separate thread (typically the UI).
/// Processes every timeslice archive found in the input directory.
pub fn process(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<(), ProcessorError> {
    let files = find_timeslice_files(&config.input_path)?;
    if files.is_empty() {
        return Err(ProcessorError::NoFilesError);
    }
    for file in files {
        process_file(&config, &file, &tx, &worker_id)?;
    }
    Ok(())
}

/// Process a subset of the timeslice archives
pub fn process_subset(
    config: Config,
    tx: Sender<WorkerStatus>,
    worker_id: usize,
    subset: Vec<PathBuf>,
) -> Result<(), ProcessorError> {
    for file in subset {
        process_file(&config, &file, &tx, &worker_id)?;
    }
    Ok(())
}

/// Divide the timeslice archives into a set of subsets (per thread/worker)
pub fn create_subsets(config: &Config) -> Result<Vec<Vec<PathBuf>>, ProcessorError> {
    let files = find_timeslice_files(&config.input_path)?;
    if files.is_empty() {
        return Err(ProcessorError::NoFilesError);
    }

    let mut subsets: Vec<Vec<PathBuf>> = vec![Vec::new(); config.n_threads as usize];
    let n_subsets = subsets.len();
    for (idx, file) in files.into_iter().enumerate() {
        subsets[idx % n_subsets].push(file)
    }

    Ok(subsets)
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_subsets_round_robin() {
        let dir = std::env::temp_dir().join("tof_subsets_test");
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..5 {
            std::fs::write(dir.join(format!("run_{i}.tsa")), b"").unwrap();
        }

        let config = Config {
            input_path: dir.clone(),
            n_threads: 2,
            ..Config::default()
        };
        let subsets = create_subsets(&config).unwrap();
        assert_eq!(subsets.len(), 2);
        assert_eq!(subsets[0].len(), 3);
        assert_eq!(subsets[1].len(), 2);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_create_subsets_empty_directory() {
        let dir = std::env::temp_dir().join("tof_subsets_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let config = Config {
            input_path: dir.clone(),
            n_threads: 2,
            ..Config::default()
        };
        assert!(matches!(
            create_subsets(&config),
            Err(ProcessorError::NoFilesError)
        ));
        std::fs::remove_dir_all(dir).unwrap();
    }
}
