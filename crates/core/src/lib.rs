pub mod config;
pub mod types;

pub use types::{Address, UserProfile};
