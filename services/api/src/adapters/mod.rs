pub mod device;
pub mod face_llm;
pub mod geocode;
pub mod map_feed;

pub use device::{reported_location_channel, ReportedFix, ReportedLocationAdapter};
pub use face_llm::{GeminiFaceAdapter, SimulatedFaceAdapter};
pub use geocode::NominatimAdapter;
pub use map_feed::BroadcastMapDisplay;
