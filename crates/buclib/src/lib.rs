//! # buclib -- Control Client for ATOM Block Upconverters
//!
//! `buclib` is an asynchronous Rust library for monitoring and controlling
//! ATOM-series RF block upconverters (BUCs) over Ethernet or RS-232. Device
//! operations never block the caller: each one is queued, executed strictly
//! one at a time in submission order, and its result is delivered through a
//! callback.
//!
//! ## Quick Start
//!
//! ```no_run
//! use buclib::BucBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let driver = BucBuilder::new()
//!         .build(|result, kind| println!("Command {kind}: {result}"));
//!
//!     driver.select_network("192.168.1.50", 5353).await?;
//!     driver.get_serial_number();
//!     driver.get_attenuation();
//!     driver.wait_idle().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `buclib-core`         | [`Transport`] trait, [`CommandKind`], errors     |
//! | `buclib-transport`    | TCP and serial transport implementations         |
//! | `buclib-dispatch`     | Single-worker FIFO dispatch queue                |
//! | `buclib-atom`         | ATOM protocol codec, transport selector, driver  |
//! | `buclib-test-harness` | Mock and simulated transports for tests          |
//! | **`buclib`**          | This facade crate -- re-exports everything       |
//!
//! ## Results
//!
//! Every submitted command produces exactly one result string:
//!
//! - the parsed value (`"32"`, `"123456"`, `"1 (Muted)"`) or `"ok"`,
//! - the device's own error line (`err "Invalid Command"`), verbatim,
//! - or an `Error: ...` string when the command could not be executed
//!   (no link selected, link failure, invalid argument).
//!
//! Results also reach every subscriber ([`BucDriver::subscribe`]) as
//! [`CommandResult`]s.

pub use buclib_core::*;

pub use buclib_atom::{AtomParser, BucBuilder, BucDriver, TransportSelector};

/// ATOM protocol codec, selector, and driver.
pub mod atom {
    pub use buclib_atom::*;
}

/// Concrete TCP and serial transports.
pub mod transport {
    pub use buclib_transport::*;
}

/// The dispatch queue and its result strings.
pub mod dispatch {
    pub use buclib_dispatch::*;
}
