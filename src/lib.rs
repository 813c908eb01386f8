pub mod config;
pub mod error;
pub mod load;
pub mod normalize;
pub mod storage;

pub use config::DbConfig;
pub use error::{Error, ErrorKind, Result};
pub use load::{LoadReport, Loader, MappingEntry};
pub use normalize::{NormalizeReport, Normalizer};
pub use storage::{LocalStorage, MemStorage, Storage};
