mod extract;
mod identity;
mod server;

pub use identity::{Identity, IDENTITY_HEADER};
pub use server::{HttpServer, HttpServerConfig};
