//! CLI command implementations.

mod info;
mod run;
mod send;

pub use info::show_info;
pub use run::run_service;
pub use send::send_to_partner;
