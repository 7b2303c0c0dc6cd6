//! Bluetooth Module
//!
//! BLE discovery and notification intake for entry-model rhythm controllers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionSession                      │
//! │  (scan -> validate -> subscribe -> stream state machine) │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ BleTransport
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - Active  │  │ - GATT     │  │ - UUIDs  │
//! │   watch   │  │ - Notify   │  │ - Address│
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Service/characteristic identifiers and address formatting
//! - [`transport`] - Platform-neutral transport trait and link events
//! - [`session`] - Connection session state machine
//! - `scanner` - WinRT advertisement watcher (Windows only)
//! - `connection` - WinRT GATT transport (Windows only)

#[cfg(windows)]
pub mod connection;
pub mod protocol;
#[cfg(windows)]
pub mod scanner;
pub mod session;
pub mod transport;
