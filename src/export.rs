//! Text export of scores and feature vectors.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TripScoreError};
use crate::metrics::TripMetrics;
use crate::scoring::TripScore;

/// Header line of the score export.
pub const SCORE_HEADER: &str = "driver_trip,prob";

/// Write scores as `driver_trip,prob` CSV (`<driver>_<trip>,<probability>` rows).
pub fn write_scores<W: Write>(writer: &mut W, scores: &[TripScore]) -> io::Result<()> {
    writeln!(writer, "{SCORE_HEADER}")?;
    for score in scores {
        writeln!(
            writer,
            "{}_{},{}",
            score.driver_id, score.trip_id, score.probability
        )?;
    }
    Ok(())
}

/// Write feature vectors, one space-separated line per trip.
pub fn write_metrics<W: Write>(
    writer: &mut W,
    metrics: &[TripMetrics],
    with_header: bool,
) -> io::Result<()> {
    if with_header {
        writeln!(writer, "{}", TripMetrics::variable_names())?;
    }
    for m in metrics {
        writeln!(writer, "{m}")?;
    }
    Ok(())
}

fn write_file(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()> {
    let file = File::create(path).map_err(|e| TripScoreError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| TripScoreError::io(path, e))
}

pub fn export_scores(path: &Path, scores: &[TripScore]) -> Result<()> {
    write_file(path, |w| write_scores(w, scores))
}

pub fn export_metrics(path: &Path, metrics: &[TripMetrics], with_header: bool) -> Result<()> {
    write_file(path, |w| write_metrics(w, metrics, with_header))
}
