//! Class offering types and derived occupancy.

use serde::{Deserialize, Serialize};

use crate::api::ClassOfferingId;

/// A scheduled class section for one academic year with a seat capacity.
///
/// Capacity is a hard bound on *confirmed* occupancy. The occupancy count is
/// derived by counting confirmed students at every use; it is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOffering {
    pub id: ClassOfferingId,
    pub name: String,
    /// Maximum number of confirmed students. Always > 0.
    pub capacity: i32,
    pub academic_year: String,
    /// Descriptive level label, e.g. "CM1". Not invariant-bearing.
    pub level: String,
    /// Descriptive time slot, e.g. "morning".
    pub time_slot: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClassOffering {
    pub name: String,
    pub capacity: i32,
    pub academic_year: String,
    pub level: String,
    pub time_slot: String,
}

/// An offering together with its current confirmed-occupancy count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassOccupancy {
    pub offering: ClassOffering,
    pub confirmed_count: i64,
}

impl ClassOccupancy {
    /// Seats still available for confirmation. Can go negative only if the
    /// capacity bound was violated, which the confirm path prevents.
    pub fn available_spots(&self) -> i64 {
        i64::from(self.offering.capacity) - self.confirmed_count
    }
}

/// Listing entry for offerings that still have seats available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableClass {
    #[serde(flatten)]
    pub offering: ClassOffering,
    pub available_spots: i64,
}
