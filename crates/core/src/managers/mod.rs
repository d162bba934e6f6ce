mod flow;
pub mod hosted;
pub mod protocol;
pub mod transport;
pub mod workspace;

pub use flow::{flow_to_config, FlowStore, ServerCatalog};
pub use hosted::{HostSettings, HostedServer, HostedServerManager, HostedServerStatus, ServerStatus};
