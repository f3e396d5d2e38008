//! Telemetry domain: typed regeneration events and the in-process bus.

mod types;

pub mod bus;
pub mod events;

pub use bus::EventBus;
pub use events::{
    percent_complete, EventEnvelope, LifecycleEvent, ProgressUpdate, RegenerationEvent,
};
pub use types::{new_run_id, now_millis};
