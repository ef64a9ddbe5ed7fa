pub mod notifications;
pub mod queue;
