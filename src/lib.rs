//! Shade bridge library.
//!
//! Bridges motorized roller shades behind a vendor WiFi/433MHz gateway to a
//! host automation platform. The core is the staleness-driven update
//! coordinator: each shade is refreshed only once it has been silent longer
//! than the configured interval, and unsolicited push notifications reset
//! its clock for free.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod freshness;
pub mod gateway;
pub mod shade;
pub mod store;
