pub mod authorization_registry;
pub mod credential_store;
pub mod database;
