//! Arena-backed report and test-guide structures
//!
//! A structure is a forest of container and leaf nodes exchanged as nested
//! JSON. [`domain::TreeModel`] owns the forest and offers the editing
//! operations (move up/down, make child/parent, delete); node factories map
//! JSON `type` discriminators to typed nodes.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
