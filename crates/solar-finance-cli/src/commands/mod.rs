pub mod metrics;
pub mod projection;
pub mod scenarios;
pub mod solver;
