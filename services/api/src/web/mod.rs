pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod timer_task;
pub mod ws_handler;

// Re-export the handlers the binary wires into the router.
pub use middleware::identify;
pub use rest::{health_handler, leaderboard_handler, stats_handler};
pub use ws_handler::ws_handler;
