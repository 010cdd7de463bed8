/*!
Round-by-round tabulation of ranked-choice contests.

A [`Contest`] holds the candidates, the rules and the cast ballots. [`tabulate`] cleans the
ballots, runs as many tabulations as the electoral system needs, checks the accounting of
every tabulation and returns a read-only [`RcvResults`].

See the [`manual`] for the electoral systems and the normalization rules.
*/

mod ballots;
pub mod builder;
mod config;
mod engine;
mod error;
pub mod manual;
mod outcomes;
mod policy;
mod report;
mod tabulation;
mod variants;
mod verifier;
mod weight;

use log::{debug, info};
use snafu::ensure;

use std::collections::HashSet;

pub use crate::ballots::{Ballot, CandidateId, Holder, Roster};
pub use crate::config::*;
pub use crate::engine::TabulationState;
pub use crate::error::*;
pub use crate::outcomes::{CandidateOutcomes, Outcome, RoundId};
pub use crate::policy::{break_tie, net_transfer, VariantPolicy};
pub use crate::report::*;
pub use crate::tabulation::*;
pub use crate::variants::*;
pub use crate::verifier::accounting_check;
pub use crate::weight::{ParseWeightError, Weight};

fn invalid(message: &str) -> TabulationError {
    TabulationError::InvalidContest {
        message: message.to_string(),
    }
}

/// Rejects the contests that no electoral system can count.
pub fn validate_contest(contest: &Contest) -> Result<(), TabulationError> {
    ensure!(
        contest.candidates.iter().any(|c| !c.excluded),
        InvalidContestSnafu {
            message: "no candidates".to_string()
        }
    );
    ensure!(
        contest.rules.number_of_winners > 0,
        InvalidContestSnafu {
            message: "the number of winners must be positive".to_string()
        }
    );
    let mut seen: HashSet<&str> = HashSet::new();
    for c in contest.candidates.iter() {
        if c.name == UWI || c.name == EXHAUST {
            return Err(invalid(&format!("{:?} is a reserved name", c.name)));
        }
        if c.name.is_empty() {
            return Err(invalid("empty candidate name"));
        }
        if !seen.insert(c.name.as_str()) {
            return Err(invalid(&format!("duplicate candidate {:?}", c.name)));
        }
    }
    if let WinnerElectionMode::BottomsUpPercentage(p) = contest.rules.winner_election_mode {
        ensure!(
            p > 0 && p <= 100,
            InvalidContestSnafu {
                message: format!("percentage threshold {} is not in 1..=100", p)
            }
        );
    }
    Ok(())
}

/// Tabulates a contest with the electoral system selected by its rules.
pub fn tabulate(contest: &Contest) -> Result<RcvResults, TabulationError> {
    let policy = policy_for(&contest.rules);
    tabulate_with_policy(contest, policy.as_ref())
}

/// Tabulates a contest with a custom electoral system.
///
/// The normalization rules of the contest still apply.
pub fn tabulate_with_policy(
    contest: &Contest,
    policy: &dyn VariantPolicy,
) -> Result<RcvResults, TabulationError> {
    info!(
        "Processing contest {:?}: {} ballots, candidates: {:?}, rules: {:?}",
        contest.name,
        contest.ballots.len(),
        contest.candidates,
        contest.rules
    );
    validate_contest(contest)?;
    let ballot_set = ballots::normalize(contest)?;
    ensure!(
        contest.rules.number_of_winners as usize <= ballot_set.roster.len(),
        InvalidContestSnafu {
            message: format!(
                "{} winners for {} candidates",
                contest.rules.number_of_winners,
                ballot_set.roster.len()
            )
        }
    );
    let tabulations = engine::run_contest(&ballot_set, &contest.rules, policy)?;
    let results = RcvResults::new(contest.name.clone(), policy.name(), ballot_set, tabulations);
    accounting_check(&results, contest)?;
    debug!("tabulate: winners: {:?}", results.winners());
    Ok(results)
}
