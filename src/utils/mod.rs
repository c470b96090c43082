pub mod address;
pub mod crypto;
