use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libtof_unpacker::config::Config;
use libtof_unpacker::process::{create_subsets, process_subset};
use libtof_unpacker::worker_status::WorkerStatus;

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn main() {
    // Create a cli
    let matches = Command::new("tof_unpacker_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );

        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Input Path: {}", config.input_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Mapping Path: {}", config.mapping_path.to_string_lossy());
    log::info!("Overlap Microslices: {}", config.overlap_ms);
    log::info!("Workers: {}", config.n_threads);

    if !config.is_n_threads_valid() {
        log::error!("Number of threads must be at least 1!");
        return;
    }

    // Split the archives amongst the workers
    let subsets = match create_subsets(&config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    let (tx, rx) = channel::<WorkerStatus>();
    let mut handles = Vec::new();
    let mut bars = Vec::new();
    let style = ProgressStyle::with_template("{prefix} [{bar:40}] {percent}% {msg}")
        .expect("Could not create progress style!");

    for (worker_id, subset) in subsets.into_iter().enumerate() {
        if subset.is_empty() {
            continue;
        }
        let bar = pb_manager.add(ProgressBar::new(100));
        bar.set_style(style.clone());
        bar.set_prefix(format!("Worker {worker_id}"));
        bars.push(bar);

        let worker_config = config.clone();
        let worker_tx = tx.clone();
        handles.push(std::thread::spawn(move || {
            process_subset(worker_config, worker_tx, worker_id, subset)
        }));
    }
    drop(tx);

    // Drive the progress bars from the worker status messages
    while let Ok(status) = rx.recv() {
        if let Some(bar) = bars.get(status.worker_id) {
            bar.set_position((status.progress * 100.0) as u64);
            bar.set_message(status.file);
        }
    }

    for (worker_id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(_)) => log::info!("Worker {worker_id} finished successfully."),
            Ok(Err(e)) => log::error!("Worker {worker_id} failed with error: {e}"),
            Err(_) => log::error!("Failed to join worker {worker_id}!"),
        }
    }

    for bar in bars {
        bar.finish();
    }

    log::info!("Done.");
}
