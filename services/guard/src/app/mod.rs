pub mod commands;
pub mod scan_loop;
pub mod state;

pub use scan_loop::{run_scan_session, SessionEnd};
pub use state::AppContext;
