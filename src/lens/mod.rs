pub mod catalog;
pub mod classify;
pub mod index;
pub mod filter;
pub mod resolve;
pub mod highlight;
pub mod persist;
pub mod saved;
pub mod export;
pub mod engine;

pub use catalog::*;
pub use classify::*;
pub use index::*;
pub use filter::*;
pub use resolve::*;
pub use highlight::*;
pub use persist::*;
pub use saved::*;
pub use export::*;
pub use engine::*;
