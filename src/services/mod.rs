pub mod api_server;
pub mod audit;
pub mod credential_authority;
pub mod fallback_resolver;
