pub mod agent;
pub mod survey;
