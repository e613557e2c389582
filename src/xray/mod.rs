pub mod inbound;

pub use inbound::{set_inbound_port, update_inbound_port, InboundConfig};
