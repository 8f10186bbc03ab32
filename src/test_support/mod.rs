//! Helpers shared by unit tests.

pub(crate) mod socket_guard;
