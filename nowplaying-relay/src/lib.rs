//! # nowplaying-relay — Now-Playing Relay Display
//!
//! Runs on the **display** device. Listens for frames from the sender,
//! shows title and artist on a label, and swaps the album-art surface
//! whenever a complete RGB565 canvas arrives.
//!
//! ## Layout
//!
//! - [`ui`]: the widget toolkit interface the relay renders through
//! - [`headless`]: framebuffer toolkit with PNG snapshots
//! - [`screen`]: label + single image slot
//! - [`service`]: accept loop and per-connection frame decoding
//! - [`lifecycle`]: `RelayApp` start/stop

pub mod config;
pub mod headless;
pub mod lifecycle;
pub mod screen;
pub mod service;
pub mod ui;
