//! Runtime utilities for the status monitor.
#![allow(missing_docs)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cognitive_complexity)]

pub mod health;
pub mod logging;
pub mod shutdown;
