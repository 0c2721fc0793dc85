pub mod pipeline;
pub mod setup;
pub mod survey;
pub mod workflow;
