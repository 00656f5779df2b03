//! Order gateway: Alpaca REST client and an in-memory paper broker.

mod client;
mod mock;
mod traits;
mod types;

pub use client::AlpacaClient;
pub use mock::{PaperBroker, PaperPosition, PaperState};
pub use traits::*;
pub use types::*;
