//! Test suites for the daemon.

mod behaviour;
