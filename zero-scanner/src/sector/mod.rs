//! Concept board ranking and novelty detection.

pub mod ranking;

pub use ranking::{RankedSector, SectorConfig, SectorRanker, SectorScan};
