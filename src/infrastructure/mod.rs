pub mod broker_health_monitor;
pub mod broker_router;
pub mod core;
pub mod event_bus;
pub mod metrics_reporter;
pub mod mock;

pub use event_bus::EventBus;
