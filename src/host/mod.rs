pub mod command;
pub mod deploy;
pub mod firewall;
pub mod kernel;
pub mod runtime;

pub use command::CommandRunner;
pub use deploy::{deploy_config, restart_service, ComposeService, ServiceRestarter};
pub use firewall::{Firewall, FirewallBackend, PortOpener};
pub use kernel::enable_bbr;
pub use runtime::ensure_browser;
