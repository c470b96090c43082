pub mod credential;
pub mod ledger;
