pub mod toml_loader;

pub use toml_loader::{load_queue_seed, parse_queue_seed, QueueSeed};
