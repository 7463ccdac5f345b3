//! Contract valuation - market estimates and league-wide value rankings
//!
//! Read-only over the cap ledger. The estimator prices a player against
//! comparable contracts; the evaluator scores every active contract in a
//! league against its estimate and classifies each into a rating tier.

pub mod estimator;
pub mod evaluator;

pub use estimator::{
    estimate, Comparable, Confidence, Estimate, EstimateRequest, PositionParams,
};
pub use evaluator::{
    evaluate_contract, find_ranked, league_rankings, Evaluation, RankedContract, Rating,
};
