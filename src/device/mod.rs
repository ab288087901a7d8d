//! Host introspection

mod inspector;

pub use inspector::{DeviceInspector, THERMAL_PROGRAM};
