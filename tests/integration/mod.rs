//! Integration test modules.

mod broadcast_test;
mod end_to_end_test;
