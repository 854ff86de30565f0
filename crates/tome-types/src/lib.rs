pub use id::{InvalidSourceId, SourceId};
pub use target::TargetMode;
pub use toc::TocMode;

mod id;
mod target;
mod toc;
