//! Device sessions for the load balancer
//!
//! A [`DeviceSession`] is the only way the router talks to a device. The
//! REST transport ([`IControlSession`]) and the in-memory device
//! ([`InMemoryDevice`]) are interchangeable behind it.

pub mod icontrol;
pub mod memory;
pub mod session;

pub use icontrol::IControlSession;
pub use memory::InMemoryDevice;
pub use session::{DeviceSession, Operation};
