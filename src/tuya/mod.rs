pub mod client;
pub mod polling;
pub mod rest;
