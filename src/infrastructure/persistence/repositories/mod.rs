pub mod journal_repository;
pub mod link_repository;
pub mod trade_repository;

pub use journal_repository::SqliteJournalRepository;
pub use link_repository::SqliteLinkRepository;
pub use trade_repository::SqliteTradeRepository;
