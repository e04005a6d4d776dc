//! Campaign orchestration — the eligibility evaluator and the runner that
//! walks the drip schedule over the contact population.

pub mod evaluator;
pub mod runner;

pub use evaluator::{evaluate, Decision};
pub use runner::{CampaignRunner, RunMode, RunOptions, RunReport, StepSummary};
