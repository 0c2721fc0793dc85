pub mod confirm;
pub mod providers;
pub mod tools;
