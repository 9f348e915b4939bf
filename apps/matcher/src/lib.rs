//! Résumé/job match scoring pipeline.
//!
//! Two entry points share one feature-engineering contract:
//! - `train` learns the score-model ensemble and freezes every text and
//!   statistical transform into a [`features::schema::FeatureSchema`].
//! - `score` replays the frozen transforms against fresh (job, résumé)
//!   pairs and emits per-candidate predicted scores plus a match tier.
//!
//! The frozen schema is the load-bearing piece: replay-time feature columns
//! must equal training-time feature columns, by name and order, every time.

pub mod artifact;
pub mod categorize;
pub mod cluster;
pub mod config;
pub mod driver;
pub mod errors;
pub mod features;
pub mod ml;
pub mod model;
