pub mod diff;
pub mod parser;
pub mod source;
