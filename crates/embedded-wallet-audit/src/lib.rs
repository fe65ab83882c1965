//! Test-only crate. The invariants live in `tests/source_invariants.rs`.
