pub mod client;
pub mod routes;

pub use client::Upstream;
pub use routes::RouteTable;
