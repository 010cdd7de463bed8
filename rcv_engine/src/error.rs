use std::fmt::Display;

use snafu::Snafu;

/// One of the independent recomputations done after tabulation.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AccountingCheck {
    BallotTotal,
    ExhaustTotal,
    Undervote,
    RankedSingle,
    RankedMultiple,
}

impl Display for AccountingCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountingCheck::BallotTotal => "ballot total mismatch",
            AccountingCheck::ExhaustTotal => "exhaust total mismatch",
            AccountingCheck::Undervote => "undervote mismatch",
            AccountingCheck::RankedSingle => "ranked single mismatch",
            AccountingCheck::RankedMultiple => "ranked multiple mismatch",
        };
        write!(f, "{}", s)
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AccountingProblem {
    pub tabulation: u32,
    pub check: AccountingCheck,
}

impl Display for AccountingProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(tabulation={}) {}", self.tabulation, self.check)
    }
}

fn describe(problems: &[AccountingProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<String>>()
        .join(", ")
}

/// Errors that prevent the algorithm from completing successfully.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum TabulationError {
    #[snafu(display("invalid contest: {message}"))]
    InvalidContest { message: String },

    #[snafu(display("ballot {index} does not have a positive weight"))]
    InvalidBallotWeight { index: usize },

    #[snafu(display("(tabulation={tabulation}) all effectively blank ballots"))]
    AllBlankBallots { tabulation: u32 },

    #[snafu(display("(tabulation={tabulation}, round={round}) inconsistent variant decision: {message}"))]
    InconsistentPolicy {
        tabulation: u32,
        round: u32,
        message: String,
    },

    #[snafu(display("(tabulation={tabulation}, round={round}) the round did not change any candidate"))]
    Stalled { tabulation: u32, round: u32 },

    #[snafu(display("accounting check failed: {}", describe(problems)))]
    AccountingMismatch { problems: Vec<AccountingProblem> },

    #[snafu(display("could not read the results back: {source}"))]
    ResultQuery { source: QueryError },
}

/// Errors of the read-only query surface. They never invalidate the results.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    #[snafu(display("no tabulation {tabulation}"))]
    NoSuchTabulation { tabulation: u32 },

    #[snafu(display("no round {round} in tabulation {tabulation}"))]
    NoSuchRound { tabulation: u32, round: u32 },

    #[snafu(display("ballot filter has length {actual}, expected {expected}"))]
    BallotFilterLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_names_every_problem() {
        let err = TabulationError::AccountingMismatch {
            problems: vec![
                AccountingProblem {
                    tabulation: 1,
                    check: AccountingCheck::ExhaustTotal,
                },
                AccountingProblem {
                    tabulation: 2,
                    check: AccountingCheck::RankedSingle,
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "accounting check failed: (tabulation=1) exhaust total mismatch, (tabulation=2) ranked single mismatch"
        );
    }
}
