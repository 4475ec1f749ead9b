pub mod notifications;
pub mod progress;
pub mod search;
pub mod updater;
