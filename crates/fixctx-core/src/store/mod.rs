pub mod codeql;
pub mod database;
pub mod memory;
