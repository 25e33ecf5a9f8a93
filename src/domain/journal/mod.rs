// Journal entries and their links to trades
pub mod entry;
pub mod link;
