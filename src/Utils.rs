//! Process-level helpers shared by the binary and the tests.
pub mod logger;
