//! Availability: free/busy, meeting slots, gap finding

pub mod availability;
pub mod gaps;

pub use availability::{AvailabilityService, CalendarBusy, MeetingSlot};
pub use gaps::{find_first_gap, find_gaps};
