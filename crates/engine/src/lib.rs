pub mod cache;
pub mod scanner;
pub mod venues;

pub use cache::ScanCache;
pub use scanner::{load_universe, ScanReport, Scanner, VenueLimits};
pub use venues::{connect, BinanceClient, BybitClient, VenueClients};
