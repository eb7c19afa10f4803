use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;

/// One finished run, as written to the results file.
#[derive(Clone, Debug, Serialize)]
pub struct RunRecord {
    pub seed: u64,
    pub jobs: usize,
    pub machines: usize,
    pub population_size: usize,
    pub run: usize,
    pub algorithm: String,
    pub generations: usize,
    pub diversity: f64,
    pub best_fitness: f64,
    pub optimum: f64,
    pub unique_individuals: usize,
    pub runtime: f64,
}

/// A CSV file shared by concurrent runs.
pub struct ReportSink {
    writer: Mutex<Writer<File>>,
}

impl ReportSink {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Writer::from_writer(file)),
        })
    }

    /// Writes and flushes one record. Safe to call from several threads.
    pub fn append(&self, record: &RunRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| "results writer lock poisoned")?;
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

pub fn timestamped_filename(prefix: &str, extension: &str) -> String {
    let date_str = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    format!("{}_{}.{}", prefix, date_str, extension)
}
