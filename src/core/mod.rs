pub mod dispatch;
pub mod eval;
pub mod executor;
pub mod format;
pub mod interpreter;
pub mod reveal;
pub mod rule;
pub mod slice;
pub mod store;
