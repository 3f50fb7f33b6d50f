//! Zone system for card locations.
//!
//! ## Key Types
//!
//! - `Zone`: A player's deck, hand, Active Spot, Bench, discard pile, Prizes or Lost Zone
//! - `Location`: Where an instance is (zone, Stadium, attached, stacked)
//! - `ZoneManager`: Zone ordering and capacities
//! - `ZonePosition`: Position specifier for insertion

pub mod manager;

pub use manager::{Location, Zone, ZoneManager, ZonePosition};
