pub mod client;
pub mod command;
pub mod connection;
pub mod driver;
pub mod handler;
pub mod listener;
pub mod state;
pub mod status;

pub use client::{ClientError, Response, SmtpClient};
pub use driver::{ConnectionDriver, DriverConfig, DEFAULT_MAX_MESSAGE_BYTES};
pub use handler::{BodyHandler, RecipientHandler};
pub use listener::Listener;
pub use status::Status;
