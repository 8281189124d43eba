pub mod protocol;
pub mod server_actor;
pub mod session;

pub use protocol::{ControlRequest, ControlResponse, Heartbeat};
pub use server_actor::NetworkServerActor;
pub use session::SessionManager;
