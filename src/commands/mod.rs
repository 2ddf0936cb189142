mod ingest;
mod render;
mod search;
mod stats;

pub use ingest::*;
pub use render::*;
pub use search::*;
pub use stats::*;
