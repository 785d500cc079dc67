//! REST endpoints over the ledger

pub mod rest;

pub use rest::RestApi;
