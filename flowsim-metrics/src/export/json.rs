//! JSON export via serde.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::MetricsError;
use crate::export::StatsExporter;
use crate::stats::SimulationStats;

#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            pretty: false,
        }
    }

    /// Produce indented output.
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl StatsExporter for JsonExporter {
    fn export(&self, stats: &SimulationStats) -> Result<(), MetricsError> {
        let snapshot = stats.snapshot();
        let writer = BufWriter::new(File::create(&self.path)?);
        if self.pretty {
            serde_json::to_writer_pretty(writer, &snapshot)?;
        } else {
            serde_json::to_writer(writer, &snapshot)?;
        }
        Ok(())
    }
}
