mod event;
mod message;

pub use event::{DeviceInfo, GeoInfo, OpenEvent, OpenRecord};
pub use message::{SendRequest, TrackedMessage};
