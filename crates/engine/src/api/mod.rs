//! Market data collaborators

pub mod source;
pub mod yahoo;

pub use source::{MarketDataSource, StaticSource};
pub use yahoo::YahooChartClient;
