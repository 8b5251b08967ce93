// ── Souschef Atoms Layer ───────────────────────────────────────────────────
// Pure constants, error types, traits, and data types — zero side effects.
// Dependency rule: atoms may only depend on std and external pure crates.
// Nothing here may import from engine/ or lib.rs.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
