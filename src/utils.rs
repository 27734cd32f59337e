use anyhow::Result;
use chrono::{DateTime, Local};
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

/// Log lines go to a file, or to stderr so that stdout only carries lookup results.
/// Records from dependencies are kept only at warning level and above.
pub struct FinderLogger {
    log_file: Option<Mutex<std::fs::File>>,
}

impl FinderLogger {
    pub fn new(log_file_path: Option<&str>) -> Result<Self> {
        let log_file = match log_file_path {
            Some(path) => Some(Mutex::new(OpenOptions::new().create(true).append(true).open(path)?)),
            None => None,
        };

        Ok(FinderLogger { log_file })
    }
}

fn is_own_target(target: &str) -> bool {
    target == "discussion_finder" || target.starts_with("discussion_finder::")
}

impl log::Log for FinderLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > log::max_level() {
            return false;
        }
        is_own_target(metadata.target()) || metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now: DateTime<Local> = Local::now();
        let line = format!(
            "[{}] {:<5} {} {}\n",
            now.format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or(record.target()),
            record.args()
        );

        match &self.log_file {
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = file.write_all(line.as_bytes());
                }
            }
            None => eprint!("{}", line),
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.log_file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Installs the logger at `level`. The level can be changed later with
/// `log::set_max_level` once the config is known.
pub fn setup_logging(log_file: Option<&str>, level: LevelFilter) -> Result<()> {
    let logger = FinderLogger::new(log_file)?;
    log::set_boxed_logger(Box::new(logger)).map(|()| log::set_max_level(level))?;

    match log_file {
        Some(path) => log::debug!("Logging to {} at level {}", path, level),
        None => log::debug!("Logging to stderr at level {}", level),
    }
    Ok(())
}
