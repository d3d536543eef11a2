pub mod indicators;
pub mod services;
