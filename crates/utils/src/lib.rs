//! Ambient helpers shared by the scheduler and the operator.

pub mod logging;
