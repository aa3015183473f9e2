//! Shared plumbing for all walkers: byte sources, the bounded cursor and
//! the error taxonomy.

pub mod cursor;
pub mod error;
pub mod io;

pub use cursor::Cursor;
pub use error::{RejectionKind, SourceError, TreeError, WalkError, WalkResult};
pub use io::{ByteSource, FileSource, MmapSource, SliceSource, Window};
