//! The notes of one page: URL normalization, the in-memory registry, and
//! the page session that routes user input into it.

mod registry;
mod session;
mod url;

pub use registry::{all_pages, remove_from_page, replace_page, PageRegistry};
pub use session::{Modifiers, PageSession, Platform, PointerButton, PointerEvent, Target};
pub use url::{hostname, PageUrl};
