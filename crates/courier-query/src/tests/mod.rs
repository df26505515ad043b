//! Unit tests for `courier_query`.

mod filter_tests;
mod paging_tests;

mod behaviour;
