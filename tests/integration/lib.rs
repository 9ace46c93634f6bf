//! Cross-crate integration tests for plotbox. See `tests/`.
