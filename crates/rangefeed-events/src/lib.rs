#![forbid(unsafe_code)]

//! Lifecycle signal vocabulary and event bus for the rangefeed loader.

mod bus;
mod event;
mod recorder;

pub use bus::EventBus;
pub use event::{BufferEvent, BufferListEvent, ElementEvent, Event, PipelineEvent};
pub use recorder::EventLog;
