//! In-memory adapters, used by tests and one-shot runs without a database.

pub mod engine_state_repository;

pub use engine_state_repository::InMemoryEngineStateRepository;
