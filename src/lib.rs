pub mod api;
pub mod cli_args;
pub mod client_update;
pub mod operation;
pub mod selector;
pub mod stream;
