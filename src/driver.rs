//! A driver and the trips it owns.

use crate::metrics::{MetricsConfig, TripMetrics};
use crate::segmentation::SegmentationConfig;
use crate::store::DriverTripData;
use crate::trip::Trip;

/// One entity of the population, owning its trips in stored order.
#[derive(Debug, Clone)]
pub struct Driver {
    id: i32,
    trips: Vec<Trip>,
}

impl Driver {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            trips: Vec::new(),
        }
    }

    /// Build a driver from stored raw trips, segmenting with `config`.
    pub fn from_trip_data(data: DriverTripData, config: &SegmentationConfig) -> Self {
        let trips = data
            .trips
            .into_iter()
            .map(|raw| Trip::with_config(raw.trip_id, raw.points, *config))
            .collect();
        Self {
            id: data.driver_id,
            trips,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn add_trip(&mut self, trip: Trip) {
        self.trips.push(trip);
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn trip(&self, trip_id: i32) -> Option<&Trip> {
        self.trips.iter().find(|t| t.id() == trip_id)
    }

    /// One feature vector per trip, in trip order.
    pub fn trip_metrics(&self, config: &MetricsConfig) -> Vec<TripMetrics> {
        self.trips
            .iter()
            .map(|trip| trip.metrics(self.id, config))
            .collect()
    }
}
