pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod note;
pub mod page;
pub mod storage;
pub mod sync;

pub use error::{PostitError, Result};
pub use page::PageSession;
pub use storage::StorageAdapter;
