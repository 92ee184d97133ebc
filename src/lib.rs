//! Async driver for GNSS receivers speaking the UBX binary protocol.
//!
//! ubxlink owns the transport read path, resynchronizes the binary framing,
//! decodes typed navigation and configuration messages, and keeps the
//! latest fix and satellite diagnostics one read away.
//!
//! # Features
//!
//! - **Version negotiation**: resolves PROTVER from MON-VER and subscribes
//!   to the message set the firmware actually speaks
//! - **Correlated commands**: one command in flight, ACK/NAK matched to the
//!   issuer, timeouts surfaced distinctly from rejections
//! - **Fix fan-out**: every `wait_for_location` caller observes the same fix
//! - **Transport-agnostic**: any `AsyncRead`/`AsyncWrite` pair (UART
//!   adapters, TCP bridges, in-memory loopbacks)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use ubxlink::{Device, DeviceOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Split your UART or socket byte stream into halves; an in-memory
//!     // loopback stands in here.
//!     let (link, _device_side) = tokio::io::duplex(1024);
//!     let (reader, writer) = tokio::io::split(link);
//!
//!     let device = Device::attach(reader, writer, DeviceOptions::default()).await?;
//!     println!("protocol {}", device.profile().protocol_version);
//!
//!     let location = device.wait_for_location().await?;
//!     println!("{:.7}, {:.7}", location.latitude, location.longitude);
//!
//!     let mut fixes = Box::pin(device.fix_updates());
//!     while let Some(fix) = fixes.next().await {
//!         println!("{:.7}, {:.7}", fix.latitude, fix.longitude);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Protocol engine
pub mod frame;
pub mod messages;

// Driver architecture
mod command;
mod device;
mod driver;
mod negotiate;
mod state;
pub mod transport;

// Core exports
pub use error::*;
pub use types::*;

// Main API exports
pub use command::CommandOutcome;
pub use device::Device;
pub use frame::{Frame, FrameScanner};
pub use messages::Message;
