pub mod endpoint;
pub mod settings;

pub use endpoint::Endpoint;
pub use settings::Config;
