pub mod port;

pub use port::{PortRange, DEFAULT_PORT_MAX, DEFAULT_PORT_MIN};
