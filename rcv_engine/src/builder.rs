use snafu::ensure;

use crate::config::*;
use crate::error::*;
use crate::weight::Weight;

/// A builder for contests.
///
/// ```
/// use rcv_engine::builder::Builder;
/// use rcv_engine::{tabulate, TabulationError, VoteRules};
///
/// let mut builder = Builder::new(&VoteRules::DEFAULT_RULES)?
///     .candidates(&["Anna".to_string(), "Bob".to_string()])?;
///
/// builder.add_vote_simple(&["Anna", "Clara", ""])?;
/// builder.add_vote_simple(&["Bob"])?;
/// builder.add_vote(&[vec!["Anna".to_string()]], 2)?;
///
/// let results = tabulate(&builder.build("mayor"))?;
/// assert_eq!(results.winners(), vec!["Anna".to_string()]);
/// # Ok::<(), TabulationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    rules: VoteRules,
    candidates: Option<Vec<Candidate>>,
    ballots: Vec<CastBallot>,
}

impl Builder {
    pub fn new(rules: &VoteRules) -> Result<Builder, TabulationError> {
        Ok(Builder {
            rules: rules.clone(),
            candidates: None,
            ballots: Vec::new(),
        })
    }

    /// Declares the candidates. Any name on a ballot outside of this list is a write-in.
    pub fn candidates(self, cands: &[String]) -> Result<Builder, TabulationError> {
        self.candidate_list(
            cands
                .iter()
                .map(|name| Candidate {
                    name: name.clone(),
                    code: None,
                    excluded: false,
                })
                .collect(),
        )
    }

    pub fn candidate_list(self, cands: Vec<Candidate>) -> Result<Builder, TabulationError> {
        ensure!(
            !cands.is_empty(),
            InvalidContestSnafu {
                message: "no candidates".to_string()
            }
        );
        Ok(Builder {
            rules: self.rules,
            candidates: Some(cands),
            ballots: Vec::new(),
        })
    }

    /// Adds a vote with a single name per rank. An empty name is a blank rank.
    pub fn add_vote_simple<S: AsRef<str>>(&mut self, candidates: &[S]) -> Result<(), TabulationError> {
        let ranks: Vec<Vec<String>> = candidates
            .iter()
            .map(|s| vec![s.as_ref().to_string()])
            .collect();
        self.add_vote(&ranks, 1)
    }

    /// Adds the same vote `count` times, as a single ballot of that weight.
    ///
    /// candidates: the names marked at each rank, in order. A rank with no name is an
    /// undervote and a rank with several names is an overvote. Choices do not need to
    /// be unique, distinct or non-empty.
    pub fn add_vote(&mut self, candidates: &[Vec<String>], count: u32) -> Result<(), TabulationError> {
        self.add_weighted_vote(candidates, Weight::from_count(count as u64))
    }

    pub fn add_weighted_vote(
        &mut self,
        candidates: &[Vec<String>],
        weight: Weight,
    ) -> Result<(), TabulationError> {
        ensure!(
            weight.is_positive(),
            InvalidBallotWeightSnafu {
                index: self.ballots.len()
            }
        );
        let choices: Vec<BallotChoice> = candidates.iter().map(|c| self.choice(c)).collect();
        self.ballots.push(CastBallot { choices, weight });
        Ok(())
    }

    fn choice(&self, names: &[String]) -> BallotChoice {
        match names {
            [] => BallotChoice::Undervote,
            [s] if s.is_empty() => BallotChoice::Blank,
            [s] => match self.candidates.as_deref() {
                Some(valid) if !valid.iter().any(|cd| cd.name == *s) => {
                    BallotChoice::UndeclaredWriteIn
                }
                _ => BallotChoice::Candidate(s.clone()),
            },
            _ => BallotChoice::Overvote,
        }
    }

    pub fn build(self, name: &str) -> Contest {
        Contest {
            name: name.to_string(),
            candidates: self.candidates.unwrap_or_default(),
            rules: self.rules,
            ballots: self.ballots,
        }
    }
}
