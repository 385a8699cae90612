pub mod keys;
pub mod transit;
