// Calendar-day parsing and ranges
pub mod calendar;

// Journal entries and trade links
pub mod journal;

// Daily performance metrics
pub mod performance;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Core trading domain
pub mod trading;

// Domain-specific error types
pub mod errors;
