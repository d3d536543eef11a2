pub mod remote;
pub mod traits;

pub use remote::YahooClient;
pub use traits::MarketDataProvider;
