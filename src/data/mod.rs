pub mod loader;
pub mod types;
pub mod writer;

pub use loader::{ChainLoader, LoaderError, EXPECTED_COLUMNS};
pub use types::{OptionContractRecord, OptionType};
pub use writer::{ChainWriter, WriterError};
