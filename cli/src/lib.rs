pub mod client;
pub mod codes;
