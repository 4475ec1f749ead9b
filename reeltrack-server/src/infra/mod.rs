pub mod app_context;
pub mod errors;
pub mod scheduler;
pub mod startup;
