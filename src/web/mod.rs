pub mod api;
pub mod server;


pub use server::WebServer;
