//! # Printer Module
//!
//! This module provides printer-specific configurations and utilities.
//!
//! ## Modules
//!
//! - [`profile`]: Printer model table (paper geometry, GATT candidates)

pub mod profile;

pub use profile::PrinterProfile;
