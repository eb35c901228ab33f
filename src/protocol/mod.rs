pub mod command;
pub mod writer;
