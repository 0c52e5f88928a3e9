//! Adaptive performance governance for real-time simulations.
//!
//! [`device_profiler`] classifies the host into a capability tier and
//! measures its refresh rate, [`frame_monitor`] turns frame ticks into
//! timing metrics and a local quality tier, and [`performance_governor`]
//! converts runtime cost into lever decisions with hysteresis. A host wires
//! all three through one [`context::GovernanceContext`].

pub mod collaborators;
pub mod config;
pub mod context;
pub mod device_profiler;
pub mod error;
pub mod frame_clock;
pub mod frame_monitor;
pub mod frame_window;
pub mod logging;
pub mod metrics;
pub mod performance_governor;

pub use context::GovernanceContext;
