//! Recomputes the main totals of a contest a second way, and compares them with
//! the results of the tabulation.

use log::{debug, error};
use snafu::{ensure, ResultExt};

use std::collections::HashSet;

use crate::config::*;
use crate::error::*;
use crate::report::{RcvResults, TransferSummary};
use crate::weight::Weight;

// The names a raw ballot choice counts for, before any normalization rule.
fn raw_valid_name<'a>(
    choice: &'a BallotChoice,
    declared: &HashSet<&str>,
    excluded: &HashSet<&str>,
    write_in_mode: WriteInMode,
) -> Option<&'a str> {
    let write_in = match write_in_mode {
        WriteInMode::Combine => Some(UWI),
        WriteInMode::Exclude => None,
    };
    match choice {
        BallotChoice::Candidate(name) if declared.contains(name.as_str()) => Some(name.as_str()),
        BallotChoice::Candidate(name) if excluded.contains(name.as_str()) => None,
        BallotChoice::Candidate(_) | BallotChoice::UndeclaredWriteIn => write_in,
        _ => None,
    }
}

// Weight of the cast ballots with one, and more than one, distinct valid names.
fn raw_ranked_counts(contest: &Contest) -> (Weight, Weight) {
    let declared: HashSet<&str> = contest
        .candidates
        .iter()
        .filter(|c| !c.excluded)
        .map(|c| c.name.as_str())
        .collect();
    let excluded: HashSet<&str> = contest
        .candidates
        .iter()
        .filter(|c| c.excluded)
        .map(|c| c.name.as_str())
        .collect();
    let mut single = Weight::zero();
    let mut multiple = Weight::zero();
    for cast in contest.ballots.iter() {
        let names: HashSet<&str> = cast
            .choices
            .iter()
            .filter_map(|c| raw_valid_name(c, &declared, &excluded, contest.rules.write_in_mode))
            .collect();
        match names.len() {
            0 => {}
            1 => single += &cast.weight,
            _ => multiple += &cast.weight,
        }
    }
    (single, multiple)
}

fn same(w1: &Weight, w2: &Weight) -> bool {
    w1.round_thousandths() == w2.round_thousandths()
}

fn check_tabulation(
    results: &RcvResults,
    contest: &Contest,
    tabulation: u32,
) -> Result<Vec<AccountingCheck>, QueryError> {
    let n_ballots: Weight = contest.ballots.iter().map(|b| &b.weight).sum();
    let weight_distrib_sum: Weight = results
        .final_weight_distrib(tabulation)?
        .iter()
        .flat_map(|d| d.iter())
        .map(|(_, w)| w)
        .sum();

    let first_round_active = results.first_round_active_votes(tabulation)?;
    let final_round_active = results.final_round_active_votes(tabulation)?;
    let n_exhaust = results.total_exhausted(tabulation)?;

    // Ballots that only hold overvotes or skipped ranks.
    let first_round_exhausted =
        results.total_ballots() - results.total_undervote() - first_round_active.clone();

    let mut cumulative_exhaust = Weight::zero();
    for round in 1..=results.n_rounds(tabulation)? {
        if let TransferSummary::Flows(flows) = results.round_transfer(round, tabulation)? {
            if let Some(w) = flows.get(EXHAUST) {
                cumulative_exhaust += w;
            }
        }
    }

    let exhaust_crosscheck1 =
        first_round_active.clone() - final_round_active + &first_round_exhausted;
    let exhaust_crosscheck2 = cumulative_exhaust + &first_round_exhausted;
    let undervote_crosscheck =
        n_ballots.clone() - first_round_active - first_round_exhausted;
    let (ranked_single_crosscheck, ranked_multiple_crosscheck) = raw_ranked_counts(contest);

    debug!(
        "check_tabulation: tabulation {}: ballots {} distributed {} exhaust {} ({} / {}) undervote {}",
        tabulation,
        n_ballots,
        weight_distrib_sum,
        n_exhaust,
        exhaust_crosscheck1,
        exhaust_crosscheck2,
        undervote_crosscheck
    );

    let mut failed: Vec<AccountingCheck> = Vec::new();
    if weight_distrib_sum != n_ballots {
        failed.push(AccountingCheck::BallotTotal);
    }
    if !same(&exhaust_crosscheck1, &n_exhaust) || !same(&exhaust_crosscheck2, &n_exhaust) {
        failed.push(AccountingCheck::ExhaustTotal);
    }
    if !same(&undervote_crosscheck, &results.total_undervote()) {
        failed.push(AccountingCheck::Undervote);
    }
    if !same(&ranked_single_crosscheck, &results.ranked_single()) {
        failed.push(AccountingCheck::RankedSingle);
    }
    if !same(&ranked_multiple_crosscheck, &results.ranked_multiple()) {
        failed.push(AccountingCheck::RankedMultiple);
    }
    Ok(failed)
}

/// Runs the accounting checks over every tabulation of the results.
///
/// All the failed checks are reported together.
pub fn accounting_check(results: &RcvResults, contest: &Contest) -> Result<(), TabulationError> {
    let mut problems: Vec<AccountingProblem> = Vec::new();
    for tabulation in 1..=results.n_tabulations() {
        let failed = check_tabulation(results, contest, tabulation).context(ResultQuerySnafu)?;
        problems.extend(
            failed
                .into_iter()
                .map(|check| AccountingProblem { tabulation, check }),
        );
    }
    if !problems.is_empty() {
        error!("accounting_check: {:?}", problems);
    }
    ensure!(problems.is_empty(), AccountingMismatchSnafu { problems });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::tabulate;

    fn contest() -> Contest {
        let mut builder = Builder::new(&VoteRules::default())
            .unwrap()
            .candidates(&["A".to_string(), "B".to_string(), "C".to_string()])
            .unwrap();
        builder.add_vote_simple(&["A", "B"]).unwrap();
        builder.add_vote_simple(&["A"]).unwrap();
        builder.add_vote_simple(&["B", "C"]).unwrap();
        builder.add_vote_simple(&["B"]).unwrap();
        builder.add_vote_simple(&["C", "A"]).unwrap();
        builder.add_vote(&[], 1).unwrap();
        builder.build("test")
    }

    #[test]
    fn checks_pass_on_tabulated_results() {
        let c = contest();
        let results = tabulate(&c).unwrap();
        assert_eq!(accounting_check(&results, &c), Ok(()));
    }

    #[test]
    fn checks_detect_a_different_ballot_set() {
        let c = contest();
        let results = tabulate(&c).unwrap();
        let mut other = c.clone();
        other.ballots.push(CastBallot {
            choices: vec![BallotChoice::Candidate("C".to_string())],
            weight: Weight::one(),
        });
        match accounting_check(&results, &other) {
            Err(TabulationError::AccountingMismatch { problems }) => {
                let checks: Vec<AccountingCheck> = problems.iter().map(|p| p.check).collect();
                assert_eq!(
                    checks,
                    vec![
                        AccountingCheck::BallotTotal,
                        AccountingCheck::Undervote,
                        AccountingCheck::RankedSingle
                    ]
                );
                assert!(problems.iter().all(|p| p.tabulation == 1));
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn raw_recount_follows_write_in_mode() {
        let mut c = contest();
        c.ballots.push(CastBallot {
            choices: vec![
                BallotChoice::Candidate("Z".to_string()),
                BallotChoice::UndeclaredWriteIn,
            ],
            weight: Weight::from_count(2),
        });
        let (single, multiple) = raw_ranked_counts(&c);
        assert_eq!(single, Weight::from_count(4));
        assert_eq!(multiple, Weight::from_count(3));

        c.rules.write_in_mode = WriteInMode::Exclude;
        let (single, _) = raw_ranked_counts(&c);
        assert_eq!(single, Weight::from_count(2));
    }
}
