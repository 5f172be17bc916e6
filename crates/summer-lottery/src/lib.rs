//! Seeded, reproducible lottery that allocates summer-job slots among youth applicants.
//!
//! The pure pieces (eligibility, choice building, matching, audit reports) live under
//! [`lottery`]; [`lottery::LotteryService`] is the only component that touches storage.

pub mod config;
pub mod error;
pub mod lottery;
pub mod telemetry;
