pub mod guards;
pub mod templates;
pub mod tokenizer;
