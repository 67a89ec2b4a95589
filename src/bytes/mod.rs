//! Buffer access abstraction that packed records are read from and written to

pub mod heap;
pub mod traits;

pub use heap::HeapBytes;
pub use traits::{BytesAccess, BytesStore};
