//! airprox library: proximity and activity of nearby WiFi devices.
//!
//! Turns promiscuous-mode 802.11 captures into per-device observations on
//! one local network, then reports which devices come within range, leave,
//! and send or receive traffic. Optionally resolves each device's IPv4
//! address through the station's ARP table and decodes channel state
//! information.
//!
//! The crate is `no_std` with no allocator and bounded collections
//! throughout, testable on any host with `cargo test`. Platform binaries
//! (the ESP-IDF firmware in `firmware-std/`) are thin consumers that provide
//! radio access, a clock, the ARP table and an output sink.
//!
//! Layers, bottom-up:
//! - `mac`, `reader`: addresses and bounds-checked byte access
//! - `frame`, `csi`: capture parsing
//! - `device`, `tracker`, `filter`, `arp`: observation state
//! - `config`, `sniffer`: the context object the platform drives
//! - `protocol`, `comm`: NDJSON messages and host commands

#![cfg_attr(not(test), no_std)]

pub mod arp;
pub mod comm;
pub mod config;
pub mod csi;
pub mod device;
pub mod filter;
pub mod frame;
pub mod mac;
pub mod protocol;
pub mod reader;
pub mod sniffer;
pub mod tracker;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use device::{Device, DeviceEvent};
pub use frame::{Capture, FrameKind};
pub use mac::MacAddr;
pub use sniffer::{Event, EventSink, Sniffer};
