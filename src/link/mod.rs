pub mod freshness;
pub mod poller;
pub mod rate_limit;
pub mod session;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;

pub use freshness::LinkState;
pub use poller::TelemetryPoller;
pub use session::{LinkSession, SendOutcome};
pub use telemetry::TelemetryFrame;
pub use transport::{Transport, UdpTransport};
