#![forbid(unsafe_code)]

//! Progressive byte-range media loader.
//!
//! Given a remote resource with a fixed MIME/codec string and a playback
//! element, the loader discovers the resource size, slices it into
//! fixed-size byte segments, and appends each segment to the host media
//! pipeline's buffer as playback approaches the end of the previously
//! appended one. Playback can start before the download completes and
//! continues seamlessly across segment boundaries.
//!
//! The host media pipeline, the playback element and the network
//! transport are collaborators behind traits; see [`traits`] and
//! [`mock`] for scriptable in-memory implementations.

mod config;
mod controller;
mod error;
mod fetcher;
pub mod mock;
mod plan;
mod queue;
pub mod traits;
mod trigger;

pub use crate::{
    config::LoaderConfig,
    controller::{Loader, LoaderState},
    error::{LoaderError, LoaderResult},
    fetcher::RangeFetcher,
    plan::{ByteRange, Segmentation},
    queue::{AppendQueue, QueueError},
    trigger::{ProgressTrigger, TriggerAction},
};
