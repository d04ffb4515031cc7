// Tagged-sum event type carried on the event bus
pub mod events;

// Domain-specific error types
pub mod errors;

// Port interfaces implemented by infrastructure adapters
pub mod ports;

// Risk management value objects and validators
pub mod risk;

// Core trading domain entities and value objects
pub mod trading;
