pub mod defaults;
pub mod generator;

pub use defaults::{pending_sequences, InsertValue, SequenceLookup};
pub use generator::{build_delete, build_insert, build_update, resolve_key, MutationPlan};
