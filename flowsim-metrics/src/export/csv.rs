//! CSV export.
//!
//! Writes one file per table next to the configured base path:
//! `{base}_arrivals.csv`, `{base}_resources.csv`, `{base}_attributes.csv`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::MetricsError;
use crate::export::StatsExporter;
use crate::stats::SimulationStats;

#[derive(Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    /// `path` is the base name; table suffixes are appended to its stem.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn path_for(&self, suffix: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("stats");
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{stem}_{suffix}.csv"))
    }

    fn export_arrivals(&self, stats: &SimulationStats) -> Result<(), MetricsError> {
        let mut file = File::create(self.path_for("arrivals"))?;
        writeln!(file, "name,start,end,finished,flow_time")?;
        for record in stats.arrivals() {
            writeln!(
                file,
                "{},{},{},{},{}",
                record.name,
                record.start.as_secs_f64(),
                record
                    .end
                    .map(|t| t.as_secs_f64().to_string())
                    .unwrap_or_default(),
                record.finished,
                record
                    .flow_time()
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
            )?;
        }
        Ok(())
    }

    fn export_resources(&self, stats: &SimulationStats) -> Result<(), MetricsError> {
        let snapshot = stats.snapshot();
        let mut file = File::create(self.path_for("resources"))?;
        writeln!(file, "resource,time,server,queue,capacity")?;
        for (name, samples) in &snapshot.resources {
            for sample in samples {
                writeln!(
                    file,
                    "{},{},{},{},{}",
                    name,
                    sample.time.as_secs_f64(),
                    sample.server,
                    sample.queue,
                    sample.capacity,
                )?;
            }
        }
        Ok(())
    }

    fn export_attributes(&self, stats: &SimulationStats) -> Result<(), MetricsError> {
        let mut file = File::create(self.path_for("attributes"))?;
        writeln!(file, "arrival,time,key,value")?;
        for record in stats.attributes() {
            writeln!(
                file,
                "{},{},{},{}",
                record.arrival,
                record.time.as_secs_f64(),
                record.key,
                record.value,
            )?;
        }
        Ok(())
    }
}

impl StatsExporter for CsvExporter {
    fn export(&self, stats: &SimulationStats) -> Result<(), MetricsError> {
        self.export_arrivals(stats)?;
        self.export_resources(stats)?;
        self.export_attributes(stats)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowsim_core::{Monitor, SimTime};

    #[test]
    fn writes_one_file_per_table() {
        let mut stats = SimulationStats::new();
        stats.on_arrival_start("a0", SimTime::zero());
        stats.on_arrival_end("a0", SimTime::from_secs(5), true);
        stats.on_resource_change("server", SimTime::zero(), 1, 0, 1);
        stats.on_attribute("a0", SimTime::from_secs(1), "size", 2.0);

        let dir = std::env::temp_dir().join("flowsim_csv_export_test");
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("run");
        CsvExporter::new(&base).export(&stats).unwrap();

        let arrivals = std::fs::read_to_string(dir.join("run_arrivals.csv")).unwrap();
        assert!(arrivals.starts_with("name,start,end,finished,flow_time"));
        assert!(arrivals.contains("a0,0,5,true,5"));

        let resources = std::fs::read_to_string(dir.join("run_resources.csv")).unwrap();
        assert!(resources.contains("server,0,1,0,1"));

        let attributes = std::fs::read_to_string(dir.join("run_attributes.csv")).unwrap();
        assert!(attributes.contains("a0,1,size,2"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
