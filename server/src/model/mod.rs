pub mod artifacts;
pub mod email;
pub mod label;
pub mod store;
