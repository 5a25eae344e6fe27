mod identifier;
mod registry;
mod sweeper;

pub use identifier::new_tracking_id;
pub use registry::TrackingRegistry;
pub use sweeper::RetentionSweeper;
