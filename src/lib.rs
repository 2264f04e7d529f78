pub mod config;
pub mod country;
pub mod errors;
pub mod extractors;
pub mod fetcher;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use country::{Country, MacroRegion};
pub use errors::AppError;
pub use models::{ComparisonResponse, ConvertedPrice, ProductComparison};
pub use state::AppState;
