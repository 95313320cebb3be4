//! IRC message model and line parser.

mod parser;
mod types;

pub use self::types::Message;
