pub mod action;
pub mod condition;
pub mod content;
pub mod document;
pub mod value;
