pub mod capture;
pub mod connectivity;
pub mod feedback;
pub mod http;
pub mod server_status;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use capture::QrCapture;
pub use connectivity::{ConnectivityMonitor, LinkEvent};
pub use feedback::TerminalFeedback;
pub use http::HttpPatrolApi;
pub use server_status::ServerStatusPoller;
pub use store::LocalStore;
