//! Tinct Hardware Abstraction Layer
//!
//! Traits that board support crates implement so the mixing engine and its
//! drivers stay chip-agnostic.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Firmware / tinct-drivers               │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tinct-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  board flash / storage implementation   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Step pins use the `embedded-hal` digital traits directly.

#![no_std]
#![deny(unsafe_code)]

pub mod flash;

pub use flash::{FlashError, FlashStorage, StorageKey};
