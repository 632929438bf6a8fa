#![doc = "qrz-rtlog-core: the event pipeline behind qrz-rtlog."]

//! Source listeners receive QSO events from N1MM+ and WSJT-X monitors,
//! normalize them into single-line records and hand them to one serialized
//! uploader, either through a bounded dispatch queue or inline.
//!
//! Network monitors and the remote logbook client are collaborators behind
//! the traits in [`contract`]; concrete implementations live in the CLI crate.
//!
//! # Usage
//! Build an [`uploader::UploaderAdapter`] around a [`contract::LogbookClient`],
//! create a [`pipeline::Pipeline`], spawn one listener per bound monitor and
//! call [`pipeline::Pipeline::run`] with a stop future.

pub mod config;
pub mod contract;
pub mod error;
pub mod listener;
pub mod normalize;
pub mod pipeline;
pub mod queue;
pub mod uploader;
