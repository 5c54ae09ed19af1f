//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - EngineStateRepository: persistence of engine snapshots between runs
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod engine_state_repository;

pub use engine_state_repository::EngineStateRepository;
