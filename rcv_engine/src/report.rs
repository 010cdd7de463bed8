use snafu::{ensure, OptionExt};

use std::collections::{BTreeMap, BTreeSet};

use crate::ballots::{BallotSet, CandidateId, Holder, Roster};
use crate::config::EXHAUST;
use crate::error::*;
use crate::outcomes::RoundId;
use crate::tabulation::*;
use crate::weight::Weight;

// ******** Output data structures *********

/// The outcome of a candidate, by name.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateOutcome {
    pub name: String,
    pub round_elected: Option<RoundId>,
    pub round_eliminated: Option<RoundId>,
}

/// Who holds a piece of ballot weight at the end of a tabulation, by name.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub enum WeightHolder {
    Candidate(String),
    Exhausted,
}

/// The transfers of a round, keyed by candidate name and `exhaust`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TransferSummary {
    Flows(BTreeMap<String, Weight>),
    NotApplicable,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TieBreakSummary {
    pub round: RoundId,
    pub tied: Vec<String>,
    pub chosen: String,
}

/// The results of a contest: every tabulation, frozen, plus the facts about the
/// ballots. All the accessors are read-only, except for the ballot filter.
///
/// Tabulation and round numbers start at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct RcvResults {
    contest_name: String,
    variant: &'static str,
    ballot_set: BallotSet,
    tabulations: Vec<Tabulation>,
    ballot_filter: Vec<bool>,
}

impl RcvResults {
    pub(crate) fn new(
        contest_name: String,
        variant: &'static str,
        ballot_set: BallotSet,
        tabulations: Vec<Tabulation>,
    ) -> RcvResults {
        let ballot_filter = vec![true; ballot_set.ballots.len()];
        RcvResults {
            contest_name,
            variant,
            ballot_set,
            tabulations,
            ballot_filter,
        }
    }

    pub fn contest_name(&self) -> &str {
        &self.contest_name
    }

    pub fn variant_name(&self) -> &'static str {
        self.variant
    }

    pub fn roster(&self) -> &Roster {
        &self.ballot_set.roster
    }

    pub fn n_tabulations(&self) -> u32 {
        self.tabulations.len() as u32
    }

    pub fn tabulation(&self, tabulation: u32) -> Result<&Tabulation, QueryError> {
        let idx = (tabulation as usize).checked_sub(1);
        idx.and_then(|i| self.tabulations.get(i))
            .context(NoSuchTabulationSnafu { tabulation })
    }

    fn round(&self, round: RoundId, tabulation: u32) -> Result<&Round, QueryError> {
        let tab = self.tabulation(tabulation)?;
        let idx = (round as usize).checked_sub(1);
        idx.and_then(|i| tab.rounds.get(i))
            .context(NoSuchRoundSnafu { tabulation, round })
    }

    fn names(&self, cids: &[CandidateId]) -> Vec<String> {
        cids.iter()
            .map(|cid| self.roster().name(*cid).to_string())
            .collect()
    }

    fn holder_name(&self, holder: &Holder) -> WeightHolder {
        match holder {
            Holder::Candidate(cid) => WeightHolder::Candidate(self.roster().name(*cid).to_string()),
            Holder::Exhausted => WeightHolder::Exhausted,
        }
    }

    pub fn n_rounds(&self, tabulation: u32) -> Result<u32, QueryError> {
        Ok(self.tabulation(tabulation)?.rounds.len() as u32)
    }

    /// The tally of a round as two index-matched sequences.
    ///
    /// With `only_active`, the candidates that left the race before this round are
    /// dropped. With `desc_sort`, candidates are sorted by decreasing tally; ties are in
    /// name order, so that among tied candidates the last one is the one the default
    /// tie-break eliminates.
    pub fn round_tally(
        &self,
        round: RoundId,
        tabulation: u32,
        only_active: bool,
        desc_sort: bool,
    ) -> Result<(Vec<String>, Vec<Weight>), QueryError> {
        let r = self.round(round, tabulation)?;
        let outcomes = &self.tabulation(tabulation)?.outcomes;
        let mut entries: Vec<(&str, Weight)> = r
            .candidates
            .iter()
            .zip(r.tallies.iter())
            .filter(|(cid, _)| !only_active || outcomes.get(**cid).active_in(round))
            .map(|(cid, w)| (self.roster().name(*cid), w.clone()))
            .collect();
        if desc_sort {
            entries.sort_by(|(n1, w1), (n2, w2)| w2.cmp(w1).then_with(|| n1.cmp(n2)));
        }
        Ok(entries
            .into_iter()
            .map(|(n, w)| (n.to_string(), w))
            .unzip())
    }

    pub fn round_tally_map(
        &self,
        round: RoundId,
        tabulation: u32,
        only_active: bool,
    ) -> Result<BTreeMap<String, Weight>, QueryError> {
        let (names, tallies) = self.round_tally(round, tabulation, only_active, false)?;
        Ok(names.into_iter().zip(tallies.into_iter()).collect())
    }

    /// Candidates and the `exhaust` key, with their net transfer in this round.
    pub fn round_transfer(
        &self,
        round: RoundId,
        tabulation: u32,
    ) -> Result<TransferSummary, QueryError> {
        let tab = self.tabulation(tabulation)?;
        let transfer = (round as usize)
            .checked_sub(1)
            .and_then(|i| tab.transfers.get(i))
            .context(NoSuchRoundSnafu { tabulation, round })?;
        Ok(match transfer {
            RoundTransfer::NotApplicable => TransferSummary::NotApplicable,
            RoundTransfer::Flows(t) => {
                let mut flows: BTreeMap<String, Weight> = t
                    .candidates
                    .iter()
                    .map(|(cid, w)| (self.roster().name(*cid).to_string(), w.clone()))
                    .collect();
                flows.insert(EXHAUST.to_string(), t.exhaust.clone());
                TransferSummary::Flows(flows)
            }
        })
    }

    pub fn candidate_outcomes(&self, tabulation: u32) -> Result<Vec<CandidateOutcome>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab
            .outcomes
            .iter()
            .map(|(cid, o)| CandidateOutcome {
                name: self.roster().name(*cid).to_string(),
                round_elected: o.round_elected,
                round_eliminated: o.round_eliminated,
            })
            .collect())
    }

    /// All the candidates elected in the contest, in the order they were elected.
    pub fn winners(&self) -> Vec<String> {
        let mut winners: Vec<String> = Vec::new();
        for tab in self.tabulations.iter() {
            let mut elected: Vec<(RoundId, &str)> = tab
                .outcomes
                .iter()
                .filter_map(|(cid, o)| o.round_elected.map(|r| (r, self.roster().name(*cid))))
                .filter(|(r, _)| *r > 0)
                .collect();
            elected.sort();
            winners.extend(elected.into_iter().map(|(_, n)| n.to_string()));
        }
        winners
    }

    /// Ballot ranks after the initial cleaning of a tabulation.
    pub fn initial_ranks(&self, tabulation: u32) -> Result<Vec<Vec<String>>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab.initial_ranks.iter().map(|r| self.names(r)).collect())
    }

    pub fn initial_weights(&self, tabulation: u32) -> Result<&[Weight], QueryError> {
        Ok(&self.tabulation(tabulation)?.initial_weights)
    }

    pub fn final_ranks(&self, tabulation: u32) -> Result<Vec<Vec<String>>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab.final_ranks.iter().map(|r| self.names(r)).collect())
    }

    pub fn final_weights(&self, tabulation: u32) -> Result<&[Weight], QueryError> {
        Ok(&self.tabulation(tabulation)?.final_weights)
    }

    /// For every ballot, where its weight ended up.
    pub fn final_weight_distrib(
        &self,
        tabulation: u32,
    ) -> Result<Vec<Vec<(WeightHolder, Weight)>>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab
            .final_weight_distrib
            .iter()
            .map(|d| {
                d.iter()
                    .map(|(h, w)| (self.holder_name(h), w.clone()))
                    .collect()
            })
            .collect())
    }

    /// Same as `final_weight_distrib`, restricted to the ballots of the ballot filter.
    pub fn filtered_final_weight_distrib(
        &self,
        tabulation: u32,
    ) -> Result<Vec<Vec<(WeightHolder, Weight)>>, QueryError> {
        Ok(self
            .final_weight_distrib(tabulation)?
            .into_iter()
            .zip(self.ballot_filter.iter())
            .filter(|(_, keep)| **keep)
            .map(|(d, _)| d)
            .collect())
    }

    pub fn win_threshold(&self, tabulation: u32) -> Result<&WinThreshold, QueryError> {
        Ok(&self.tabulation(tabulation)?.win_threshold)
    }

    /// The candidates holding some weight at the end of the tabulation.
    pub fn finalist_candidates(&self, tabulation: u32) -> Result<BTreeSet<String>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        let mut held: BTreeMap<CandidateId, Weight> = BTreeMap::new();
        for (holder, w) in tab.final_weight_distrib.iter().flatten() {
            if let Holder::Candidate(cid) = holder {
                *held.entry(*cid).or_default() += w;
            }
        }
        Ok(held
            .into_iter()
            .filter(|(_, w)| !w.is_zero())
            .map(|(cid, _)| self.roster().name(cid).to_string())
            .collect())
    }

    pub fn tie_breaks(&self, tabulation: u32) -> Result<Vec<TieBreakSummary>, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab
            .tie_breaks
            .iter()
            .map(|t| TieBreakSummary {
                round: t.round,
                tied: self.names(&t.tied),
                chosen: self.roster().name(t.chosen).to_string(),
            })
            .collect())
    }

    // ******** Ballot statistics *********

    pub fn total_ballots(&self) -> Weight {
        self.ballot_set.ballots.iter().map(|b| b.weight()).sum()
    }

    pub fn total_undervote(&self) -> Weight {
        self.ballot_set
            .ballots
            .iter()
            .zip(self.ballot_set.undervote.iter())
            .filter(|(_, u)| **u)
            .map(|(b, _)| b.weight())
            .sum()
    }

    /// Weight of the ballots marking exactly one valid candidate.
    pub fn ranked_single(&self) -> Weight {
        self.ranked_weight(|n| n == 1)
    }

    /// Weight of the ballots marking more than one valid candidate.
    pub fn ranked_multiple(&self) -> Weight {
        self.ranked_weight(|n| n > 1)
    }

    fn ranked_weight(&self, pred: impl Fn(usize) -> bool) -> Weight {
        self.ballot_set
            .ballots
            .iter()
            .zip(self.ballot_set.ranked_candidates.iter())
            .filter(|(_, n)| pred(**n))
            .map(|(b, _)| b.weight())
            .sum()
    }

    pub fn first_round_active_votes(&self, tabulation: u32) -> Result<Weight, QueryError> {
        Ok(self.round(1, tabulation)?.total())
    }

    pub fn final_round_active_votes(&self, tabulation: u32) -> Result<Weight, QueryError> {
        let last = self.n_rounds(tabulation)?;
        Ok(self.round(last, tabulation)?.total())
    }

    /// Weight of the ballots that could not count in the first round, undervotes aside.
    pub fn total_pretally_exhausted(&self, tabulation: u32) -> Result<Weight, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab
            .initial_ranks
            .iter()
            .zip(tab.initial_weights.iter())
            .zip(self.ballot_set.undervote.iter())
            .filter(|((ranks, _), undervote)| ranks.is_empty() && !**undervote)
            .map(|((_, w), _)| w)
            .sum())
    }

    /// Weight of the ballots that counted in the first round and exhausted afterwards.
    pub fn total_posttally_exhausted(&self, tabulation: u32) -> Result<Weight, QueryError> {
        let tab = self.tabulation(tabulation)?;
        Ok(tab
            .final_weight_distrib
            .iter()
            .zip(tab.initial_ranks.iter())
            .filter(|(_, ranks)| !ranks.is_empty())
            .flat_map(|(d, _)| d.iter())
            .filter(|(h, _)| *h == Holder::Exhausted)
            .map(|(_, w)| w)
            .sum())
    }

    pub fn total_exhausted(&self, tabulation: u32) -> Result<Weight, QueryError> {
        Ok(self.total_pretally_exhausted(tabulation)? + self.total_posttally_exhausted(tabulation)?)
    }

    // ******** Ballot filter *********

    /// Selects the ballots used by the filtered statistics. The filter has one entry
    /// per ballot; a filter of the wrong length is rejected and the current one kept.
    ///
    /// The filter may be set again: a new filter replaces the previous one. It only
    /// affects the filtered queries, never the tabulations.
    pub fn set_ballot_filter(&mut self, ballot_filter: Vec<bool>) -> Result<(), QueryError> {
        ensure!(
            ballot_filter.len() == self.ballot_filter.len(),
            BallotFilterLengthSnafu {
                expected: self.ballot_filter.len(),
                actual: ballot_filter.len(),
            }
        );
        self.ballot_filter = ballot_filter;
        Ok(())
    }

    pub fn ballot_filter(&self) -> &[bool] {
        &self.ballot_filter
    }
}
