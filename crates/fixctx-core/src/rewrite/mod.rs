pub mod buffer;
pub mod expander;
pub mod pipeline;
pub mod rules;
