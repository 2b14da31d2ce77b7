pub mod client;
pub mod errors;
pub(crate) mod introspection;
pub mod json_schema;
pub mod retry;
pub mod server;
pub mod server_handler;
pub mod tools;
pub mod transport;
