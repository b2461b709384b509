pub mod permission;
pub mod persistence;
pub mod sender;
