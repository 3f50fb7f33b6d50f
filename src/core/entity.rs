//! Card instance identification.
//!
//! Every physical card in a match has a unique `InstanceId`, allocated once
//! at match setup (one per deck card) and never reused. Instances are never
//! deleted, only relocated, so an id stays valid for the whole match.
//!
//! ## ID Layout
//!
//! IDs are dense and allocated deck by deck:
//! - Player 0's deck: `0..deck_size`
//! - Player 1's deck: `deck_size..2 * deck_size`
//!
//! ```
//! use ptcg_referee::core::InstanceId;
//!
//! let id = InstanceId::new(42);
//! assert_eq!(id.raw(), 42);
//! assert_eq!(id.to_string(), "Instance(42)");
//! ```

use serde::{Deserialize, Serialize};

/// Unique identifier for one physical card in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// Create a new instance ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Instance({})", self.0)
    }
}

impl From<u32> for InstanceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_id_display() {
        assert_eq!(format!("{}", InstanceId::new(7)), "Instance(7)");
    }

    #[test]
    fn test_instance_id_ordering() {
        let mut ids = vec![InstanceId(3), InstanceId(1), InstanceId(2)];
        ids.sort();
        assert_eq!(ids, vec![InstanceId(1), InstanceId(2), InstanceId(3)]);
    }

    #[test]
    fn test_instance_id_serialization() {
        let id = InstanceId::new(12345);
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: InstanceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
