pub mod codec;
pub mod coordinator;
pub mod router;
pub mod session;

pub use codec::SignalingMessage;
pub use coordinator::CallCoordinator;
pub use router::Router;
pub use session::Session;
