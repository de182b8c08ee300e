//! Clients for external data providers

pub mod huggingface;
pub mod news;
pub mod yahoo;

pub use huggingface::HostedClassifier;
#[cfg(test)]
pub use news::MockNewsSource;
pub use news::{NewsSource, PerplexityNewsClient};
#[cfg(test)]
pub use yahoo::MockPriceSource;
pub use yahoo::{PriceSource, YahooFinanceClient};
