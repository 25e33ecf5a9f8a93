// Trade records as consumed from the trade source
pub mod types;
