use log::debug;
use snafu::ensure;

use std::collections::HashSet;

use crate::config::*;
use crate::error::*;
use crate::weight::Weight;

// **** Candidates ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub(crate) u32);

/// The candidates taking part in a contest, in declared order.
///
/// Excluded candidates are not part of the roster. The combined write-in
/// candidate is appended last when at least one ballot marks a write-in.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    pub(crate) fn new(names: Vec<String>) -> Roster {
        Roster { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The name of a candidate. Ids from another roster read as `"?"`.
    pub fn name(&self, cid: CandidateId) -> &str {
        self.names
            .get(cid.0 as usize)
            .map(|s| s.as_str())
            .unwrap_or("?")
    }

    pub fn id_of(&self, name: &str) -> Option<CandidateId> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| CandidateId(idx as u32))
    }

    /// All the candidate ids, in declared order.
    pub fn ids(&self) -> impl Iterator<Item = CandidateId> {
        (0..self.names.len() as u32).map(CandidateId)
    }
}

// **** Ballots ****

/// Who holds a piece of ballot weight at the end of a tabulation.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Holder {
    Candidate(CandidateId),
    Exhausted,
}

/// A working ballot, owned by a single tabulation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub(crate) ranks: Vec<CandidateId>,
    pub(crate) weight: Weight,
    pub(crate) weight_distrib: Vec<(Holder, Weight)>,
}

impl Ballot {
    pub(crate) fn new(ranks: Vec<CandidateId>, weight: Weight) -> Ballot {
        Ballot {
            ranks,
            weight,
            weight_distrib: Vec::new(),
        }
    }

    pub fn ranks(&self) -> &[CandidateId] {
        &self.ranks
    }

    /// The candidate currently counting this ballot, if it is not exhausted.
    pub fn top(&self) -> Option<CandidateId> {
        self.ranks.first().cloned()
    }

    pub fn weight(&self) -> &Weight {
        &self.weight
    }

    pub fn weight_distrib(&self) -> &[(Holder, Weight)] {
        &self.weight_distrib
    }

    /// Keeps the fraction `keep` of the weight moving with the ballot. The rest stays
    /// with `holder` and is recorded in the weight distribution.
    ///
    /// The total weight of the ballot is unchanged.
    pub fn retain_with(&mut self, holder: CandidateId, keep: &Weight) {
        let moving = &self.weight * keep;
        let retained = &self.weight - &moving;
        debug!(
            "retain_with: {:?} retains {} of {}, {} moves on",
            holder, retained, self.weight, moving
        );
        self.weight_distrib
            .push((Holder::Candidate(holder), retained));
        self.weight = moving;
    }

    pub(crate) fn remove_candidate(&mut self, cid: CandidateId) {
        self.ranks.retain(|c| *c != cid);
    }
}

/// The output of the normalizer: the working ballots and the per-ballot facts
/// that the reports and the accounting checks rely on.
#[derive(Eq, PartialEq, Debug, Clone)]
pub(crate) struct BallotSet {
    pub(crate) roster: Roster,
    pub(crate) ballots: Vec<Ballot>,
    /// No valid candidate and no overvote on the ballot.
    pub(crate) undervote: Vec<bool>,
    /// Number of distinct valid candidates marked anywhere on the ballot.
    pub(crate) ranked_candidates: Vec<usize>,
}

// One position of a cast ballot, once the candidate names are resolved.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Mark {
    Filled(CandidateId),
    Skipped,
    Overvote,
    // Excluded candidates and dropped write-ins.
    Ignored,
}

fn is_write_in(
    choice: &BallotChoice,
    declared: &HashSet<&str>,
    excluded: &HashSet<&str>,
) -> bool {
    match choice {
        BallotChoice::UndeclaredWriteIn => true,
        BallotChoice::Candidate(name) => {
            !declared.contains(name.as_str()) && !excluded.contains(name.as_str())
        }
        _ => false,
    }
}

fn build_roster(contest: &Contest) -> Roster {
    let mut names: Vec<String> = contest
        .candidates
        .iter()
        .filter(|c| !c.excluded)
        .map(|c| c.name.clone())
        .collect();
    let declared: HashSet<&str> = names.iter().map(|s| s.as_str()).collect();
    let excluded: HashSet<&str> = contest
        .candidates
        .iter()
        .filter(|c| c.excluded)
        .map(|c| c.name.as_str())
        .collect();
    let has_write_ins = contest
        .ballots
        .iter()
        .flat_map(|b| b.choices.iter())
        .any(|c| is_write_in(c, &declared, &excluded));
    if has_write_ins && contest.rules.write_in_mode == WriteInMode::Combine {
        names.push(UWI.to_string());
    }
    Roster::new(names)
}

fn to_marks(
    choices: &[BallotChoice],
    roster: &Roster,
    excluded: &HashSet<&str>,
    write_in_mode: WriteInMode,
) -> Vec<Mark> {
    let uwi = roster.id_of(UWI);
    let write_in = match uwi {
        Some(uwi_id) if write_in_mode == WriteInMode::Combine => Mark::Filled(uwi_id),
        _ => Mark::Ignored,
    };
    choices
        .iter()
        .map(|choice| match choice {
            BallotChoice::Candidate(name) if excluded.contains(name.as_str()) => Mark::Ignored,
            BallotChoice::Candidate(name) => match roster.id_of(name) {
                Some(cid) if Some(cid) != uwi => Mark::Filled(cid),
                _ => write_in,
            },
            BallotChoice::UndeclaredWriteIn => write_in,
            BallotChoice::Overvote => Mark::Overvote,
            BallotChoice::Undervote | BallotChoice::Blank => Mark::Skipped,
        })
        .collect()
}

// Reads the ranks of a ballot, stopping at the first position that exhausts it.
fn read_ranks(marks: &[Mark], rules: &VoteRules) -> Vec<CandidateId> {
    let limit = rules
        .max_rankings_allowed
        .map(|m| m as usize)
        .unwrap_or(marks.len());
    let mut ranks: Vec<CandidateId> = Vec::new();
    let mut skipped: u32 = 0;
    for mark in marks.iter().take(limit) {
        match *mark {
            Mark::Ignored => {}
            Mark::Skipped => {
                skipped += 1;
            }
            Mark::Overvote => {
                if rules.overvote_rule == OverVoteRule::ExhaustImmediately {
                    break;
                }
            }
            Mark::Filled(cid) => {
                let too_many_skips = match rules.max_skipped_rank_allowed {
                    MaxSkippedRank::Unlimited => false,
                    MaxSkippedRank::ExhaustOnFirstOccurence => skipped > 0,
                    MaxSkippedRank::MaxAllowed(n) => skipped > n,
                };
                if too_many_skips {
                    break;
                }
                skipped = 0;
                if ranks.contains(&cid) {
                    match rules.duplicate_candidate_mode {
                        DuplicateCandidateMode::Exhaust => break,
                        DuplicateCandidateMode::SkipDuplicate => continue,
                    }
                }
                ranks.push(cid);
            }
        }
    }
    ranks
}

/// Turns the cast ballots of a contest into working ballots.
pub(crate) fn normalize(contest: &Contest) -> Result<BallotSet, TabulationError> {
    let roster = build_roster(contest);
    let excluded: HashSet<&str> = contest
        .candidates
        .iter()
        .filter(|c| c.excluded)
        .map(|c| c.name.as_str())
        .collect();

    let mut ballots: Vec<Ballot> = Vec::with_capacity(contest.ballots.len());
    let mut undervote: Vec<bool> = Vec::with_capacity(contest.ballots.len());
    let mut ranked_candidates: Vec<usize> = Vec::with_capacity(contest.ballots.len());
    for (index, cast) in contest.ballots.iter().enumerate() {
        ensure!(cast.weight.is_positive(), InvalidBallotWeightSnafu { index });
        let marks = to_marks(
            &cast.choices,
            &roster,
            &excluded,
            contest.rules.write_in_mode,
        );
        let distinct: HashSet<CandidateId> = marks
            .iter()
            .filter_map(|m| match m {
                Mark::Filled(cid) => Some(*cid),
                _ => None,
            })
            .collect();
        let has_overvote = marks.iter().any(|m| *m == Mark::Overvote);
        let ranks = read_ranks(&marks, &contest.rules);
        if ranks.is_empty() && !distinct.is_empty() {
            debug!(
                "normalize: ballot {} exhausted before the first round: {:?}",
                index, cast.choices
            );
        }
        undervote.push(distinct.is_empty() && !has_overvote);
        ranked_candidates.push(distinct.len());
        ballots.push(Ballot::new(ranks, cast.weight.clone()));
    }
    debug!(
        "normalize: {} ballots, roster: {:?}",
        ballots.len(),
        roster
    );
    Ok(BallotSet {
        roster,
        ballots,
        undervote,
        ranked_candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(s: &str) -> BallotChoice {
        BallotChoice::Candidate(s.to_string())
    }

    fn contest(rules: VoteRules, ballots: Vec<Vec<BallotChoice>>) -> Contest {
        Contest {
            name: "test".to_string(),
            candidates: ["A", "B", "C"]
                .iter()
                .map(|n| Candidate {
                    name: n.to_string(),
                    code: None,
                    excluded: false,
                })
                .collect(),
            rules,
            ballots: ballots
                .into_iter()
                .map(|choices| CastBallot {
                    choices,
                    weight: Weight::one(),
                })
                .collect(),
        }
    }

    fn names(bs: &BallotSet, idx: usize) -> Vec<String> {
        bs.ballots[idx]
            .ranks
            .iter()
            .map(|cid| bs.roster.name(*cid).to_string())
            .collect()
    }

    #[test]
    fn overvote_skip_and_exhaust() {
        let ballot = vec![cand("A"), BallotChoice::Overvote, cand("B")];
        let bs = normalize(&contest(VoteRules::DEFAULT_RULES, vec![ballot.clone()])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A", "B"]);

        let rules = VoteRules {
            overvote_rule: OverVoteRule::ExhaustImmediately,
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(rules, vec![ballot])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A"]);
        assert!(!bs.undervote[0]);
    }

    #[test]
    fn skipped_ranks() {
        let ballot = vec![
            cand("A"),
            BallotChoice::Blank,
            BallotChoice::Undervote,
            cand("B"),
        ];
        let bs = normalize(&contest(VoteRules::DEFAULT_RULES, vec![ballot.clone()])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A", "B"]);

        let rules = VoteRules {
            max_skipped_rank_allowed: MaxSkippedRank::MaxAllowed(1),
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(rules, vec![ballot.clone()])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A"]);

        let rules = VoteRules {
            max_skipped_rank_allowed: MaxSkippedRank::MaxAllowed(2),
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(rules, vec![ballot])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A", "B"]);
    }

    #[test]
    fn duplicates() {
        let ballot = vec![cand("A"), cand("A"), cand("C")];
        let bs = normalize(&contest(VoteRules::DEFAULT_RULES, vec![ballot.clone()])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A", "C"]);
        assert_eq!(bs.ranked_candidates[0], 2);

        let rules = VoteRules {
            duplicate_candidate_mode: DuplicateCandidateMode::Exhaust,
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(rules, vec![ballot])).unwrap();
        assert_eq!(names(&bs, 0), vec!["A"]);
        // The count of marked candidates is about the ballot as cast.
        assert_eq!(bs.ranked_candidates[0], 2);
    }

    #[test]
    fn write_ins_are_combined_or_dropped() {
        let ballot = vec![cand("Zed"), BallotChoice::UndeclaredWriteIn, cand("B")];
        let bs = normalize(&contest(VoteRules::DEFAULT_RULES, vec![ballot.clone()])).unwrap();
        assert_eq!(bs.roster.len(), 4);
        assert_eq!(names(&bs, 0), vec![UWI, "B"]);

        let rules = VoteRules {
            write_in_mode: WriteInMode::Exclude,
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(rules, vec![ballot])).unwrap();
        assert_eq!(bs.roster.len(), 3);
        assert_eq!(names(&bs, 0), vec!["B"]);
    }

    #[test]
    fn undervotes_and_max_rankings() {
        let rules = VoteRules {
            max_rankings_allowed: Some(2),
            ..VoteRules::DEFAULT_RULES
        };
        let bs = normalize(&contest(
            rules,
            vec![
                vec![BallotChoice::Blank, BallotChoice::Undervote],
                vec![BallotChoice::Overvote],
                vec![cand("A"), cand("B"), cand("C")],
            ],
        ))
        .unwrap();
        assert_eq!(bs.undervote, vec![true, false, false]);
        assert!(bs.ballots[1].ranks.is_empty());
        assert_eq!(names(&bs, 2), vec!["A", "B"]);
        assert_eq!(bs.ranked_candidates, vec![0, 0, 3]);
    }

    #[test]
    fn excluded_candidates_are_dropped() {
        let mut c = contest(VoteRules::DEFAULT_RULES, vec![vec![cand("B"), cand("A")]]);
        c.candidates[1].excluded = true;
        let bs = normalize(&c).unwrap();
        assert_eq!(bs.roster.len(), 2);
        assert_eq!(names(&bs, 0), vec!["A"]);
    }

    #[test]
    fn non_positive_weights_are_rejected() {
        let mut c = contest(VoteRules::DEFAULT_RULES, vec![vec![cand("A")]]);
        c.ballots[0].weight = Weight::zero();
        assert_eq!(
            normalize(&c),
            Err(TabulationError::InvalidBallotWeight { index: 0 })
        );
    }

    #[test]
    fn retained_weight_is_conserved() {
        let mut b = Ballot::new(vec![CandidateId(0), CandidateId(1)], Weight::from_count(3));
        b.retain_with(CandidateId(0), &Weight::from_fraction(1, 3).unwrap());
        assert_eq!(b.weight, Weight::one());
        assert_eq!(
            b.weight_distrib,
            vec![(Holder::Candidate(CandidateId(0)), Weight::from_count(2))]
        );
    }
}
