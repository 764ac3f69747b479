//! Per-driver trajectory storage.
//!
//! One binary file per driver, named `<driver_id>.data`, laid out in strict
//! sequence without padding (all little-endian):
//!
//! ```text
//! i32 driver_id
//! u64 trip_count
//! trip_count x {
//!     i32 trip_id
//!     u64 point_count
//!     point_count x { f32 x, f32 y }
//! }
//! ```
//!
//! Besides the binary store this module enumerates the driver files of a
//! directory and imports the raw CSV layout (`<root>/<driver>/<trip>.csv`).

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Result, TripScoreError};
use crate::geometry::Position;

/// File extension of driver files in the binary store.
pub const DRIVER_FILE_EXTENSION: &str = "data";

/// Raw positions of one trip as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrip {
    pub trip_id: i32,
    pub points: Vec<Position>,
}

/// All raw trips of one driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverTripData {
    pub driver_id: i32,
    pub trips: Vec<RawTrip>,
}

/// Serialize one driver's trips into `writer`.
pub fn write_driver_data<W: Write>(writer: &mut W, data: &DriverTripData) -> io::Result<()> {
    writer.write_all(&data.driver_id.to_le_bytes())?;
    writer.write_all(&(data.trips.len() as u64).to_le_bytes())?;
    for trip in &data.trips {
        writer.write_all(&trip.trip_id.to_le_bytes())?;
        writer.write_all(&(trip.points.len() as u64).to_le_bytes())?;
        for point in &trip.points {
            writer.write_all(&point.x.to_le_bytes())?;
            writer.write_all(&point.y.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Deserialize one driver's trips from `reader`.
///
/// A truncated stream fails with [`io::ErrorKind::UnexpectedEof`].
pub fn read_driver_data<R: Read>(reader: &mut R) -> io::Result<DriverTripData> {
    let driver_id = i32::from_le_bytes(read_array(reader)?);
    let trip_count = u64::from_le_bytes(read_array(reader)?);

    // Counts come from the file; never trust them for preallocation.
    let mut trips = Vec::with_capacity(trip_count.min(1024) as usize);
    for _ in 0..trip_count {
        let trip_id = i32::from_le_bytes(read_array(reader)?);
        let point_count = u64::from_le_bytes(read_array(reader)?);
        let mut points = Vec::with_capacity(point_count.min(1 << 16) as usize);
        for _ in 0..point_count {
            let x = f32::from_le_bytes(read_array(reader)?);
            let y = f32::from_le_bytes(read_array(reader)?);
            points.push(Position::new(x, y));
        }
        trips.push(RawTrip { trip_id, points });
    }

    Ok(DriverTripData { driver_id, trips })
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Parse a driver key (`"123"` or `"123.data"`) into a driver id.
pub fn parse_driver_id(key: &str) -> Result<i32> {
    let stem = key
        .strip_suffix(DRIVER_FILE_EXTENSION)
        .and_then(|s| s.strip_suffix('.'))
        .unwrap_or(key);
    stem.parse()
        .map_err(|_| TripScoreError::InvalidDriverKey(key.to_string()))
}

/// Directory of driver files.
#[derive(Debug, Clone)]
pub struct DriverStore {
    root: PathBuf,
}

impl DriverStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `driver_id`'s trips.
    pub fn path_for(&self, driver_id: i32) -> PathBuf {
        self.root
            .join(format!("{driver_id}.{DRIVER_FILE_EXTENSION}"))
    }

    /// Sorted file names of all driver files in the store (e.g. `"12.data"`).
    pub fn list_driver_keys(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| TripScoreError::io(&self.root, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| TripScoreError::io(&self.root, e))?.path();
            let is_driver_file = path
                .extension()
                .is_some_and(|ext| ext == DRIVER_FILE_EXTENSION);
            if !is_driver_file {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Read the driver file named by `key` (as returned by [`list_driver_keys`](Self::list_driver_keys)).
    pub fn read_key(&self, key: &str) -> Result<DriverTripData> {
        let driver_id = parse_driver_id(key)?;
        self.read(driver_id)
    }

    pub fn read(&self, driver_id: i32) -> Result<DriverTripData> {
        let path = self.path_for(driver_id);
        let file = File::open(&path).map_err(|e| TripScoreError::io(&path, e))?;
        let data = read_driver_data(&mut BufReader::new(file)).map_err(|e| TripScoreError::io(&path, e))?;
        debug!(
            "read driver {} ({} trips) from {}",
            data.driver_id,
            data.trips.len(),
            path.display()
        );
        Ok(data)
    }

    /// Write a driver file, creating the store directory if needed.
    pub fn write(&self, data: &DriverTripData) -> Result<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| TripScoreError::io(&self.root, e))?;
        let path = self.path_for(data.driver_id);
        let file = File::create(&path).map_err(|e| TripScoreError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        write_driver_data(&mut writer, data)
            .and_then(|_| writer.flush())
            .map_err(|e| TripScoreError::io(&path, e))?;
        Ok(path)
    }
}

// ============================================================================
// CSV import
// ============================================================================

/// Read one driver directory of CSV trip files (`<trip_id>.csv`, header line
/// then one `x,y` pair per line).
///
/// The driver id is the directory name; trips are ordered by trip id.
pub fn read_driver_csv(dir: &Path) -> Result<DriverTripData> {
    let key = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let driver_id = parse_driver_id(key)?;

    let entries = fs::read_dir(dir).map_err(|e| TripScoreError::io(dir, e))?;
    let mut trips = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TripScoreError::io(dir, e))?.path();
        if path.extension().is_none_or(|ext| ext != "csv") {
            continue;
        }
        let trip_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i32>().ok());
        let Some(trip_id) = trip_id else {
            debug!("skipping non-numeric trip file {}", path.display());
            continue;
        };
        let points = read_trip_csv(&path)?;
        trips.push(RawTrip { trip_id, points });
    }
    trips.sort_by_key(|t| t.trip_id);

    Ok(DriverTripData { driver_id, trips })
}

fn read_trip_csv(path: &Path) -> Result<Vec<Position>> {
    let file = File::open(path).map_err(|e| TripScoreError::io(path, e))?;
    let mut points = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| TripScoreError::io(path, e))?;
        if index == 0 || line.trim().is_empty() {
            continue;
        }
        let malformed = || TripScoreError::MalformedRecord {
            path: path.to_path_buf(),
            line: index + 1,
        };
        let (x, y) = line.split_once(',').ok_or_else(malformed)?;
        let x: f32 = x.trim().parse().map_err(|_| malformed())?;
        let y: f32 = y.trim().parse().map_err(|_| malformed())?;
        points.push(Position::new(x, y));
    }
    Ok(points)
}

/// Convert every driver directory under `csv_root` into a binary driver file.
///
/// Returns the number of drivers written.
pub fn convert_csv_tree(csv_root: &Path, store: &DriverStore) -> Result<usize> {
    let entries = fs::read_dir(csv_root).map_err(|e| TripScoreError::io(csv_root, e))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| TripScoreError::io(csv_root, e))?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    for dir in &dirs {
        let data = read_driver_csv(dir)?;
        store.write(&data)?;
    }
    Ok(dirs.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_packed_little_endian() {
        let data = DriverTripData {
            driver_id: 7,
            trips: vec![RawTrip {
                trip_id: 2,
                points: vec![Position::new(1.5, -2.0)],
            }],
        };
        let mut bytes = Vec::new();
        write_driver_data(&mut bytes, &data).unwrap();

        assert_eq!(bytes.len(), 4 + 8 + 4 + 8 + 8);
        assert_eq!(&bytes[0..4], &7i32.to_le_bytes());
        assert_eq!(&bytes[4..12], &1u64.to_le_bytes());
        assert_eq!(&bytes[24..28], &1.5f32.to_le_bytes());
    }

    #[test]
    fn test_truncated_stream_is_an_error() {
        let data = DriverTripData {
            driver_id: 1,
            trips: vec![RawTrip {
                trip_id: 1,
                points: vec![Position::new(0.0, 0.0); 4],
            }],
        };
        let mut bytes = Vec::new();
        write_driver_data(&mut bytes, &data).unwrap();
        bytes.truncate(bytes.len() - 3);

        let err = read_driver_data(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
