use std::collections::BTreeMap;

use crate::ballots::{CandidateId, Holder};
use crate::outcomes::{CandidateOutcomes, RoundId};
use crate::weight::Weight;

/// The tally of one round.
///
/// Every candidate of the roster appears, including the ones that already left the
/// race (at zero, or at the quota they hold). Candidates are sorted by decreasing
/// tally, ties in name order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Round {
    pub(crate) candidates: Vec<CandidateId>,
    pub(crate) tallies: Vec<Weight>,
}

impl Round {
    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn tallies(&self) -> &[Weight] {
        &self.tallies
    }

    pub fn tally_of(&self, cid: CandidateId) -> Weight {
        self.candidates
            .iter()
            .position(|c| *c == cid)
            .map(|idx| self.tallies[idx].clone())
            .unwrap_or_else(Weight::zero)
    }

    pub fn total(&self) -> Weight {
        self.tallies.iter().sum()
    }
}

/// The net movement of weight between two consecutive rounds.
///
/// The candidate deltas and the exhausted weight always sum to zero.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Transfer {
    pub candidates: BTreeMap<CandidateId, Weight>,
    pub exhaust: Weight,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RoundTransfer {
    Flows(Transfer),
    /// The round ended the tabulation: nothing moves after it.
    NotApplicable,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum WinThreshold {
    Fixed(Weight),
    /// The threshold changes with every round.
    Dynamic,
    NotApplicable,
}

/// A tie settled by the tie-break order, and the candidate it went against.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TieBreakEvent {
    pub round: RoundId,
    pub tied: Vec<CandidateId>,
    pub chosen: CandidateId,
}

/// One complete run of the round loop. Never modified once built.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Tabulation {
    pub(crate) rounds: Vec<Round>,
    pub(crate) transfers: Vec<RoundTransfer>,
    pub(crate) outcomes: CandidateOutcomes,
    pub(crate) initial_ranks: Vec<Vec<CandidateId>>,
    pub(crate) initial_weights: Vec<Weight>,
    pub(crate) final_ranks: Vec<Vec<CandidateId>>,
    pub(crate) final_weights: Vec<Weight>,
    pub(crate) final_weight_distrib: Vec<Vec<(Holder, Weight)>>,
    pub(crate) win_threshold: WinThreshold,
    pub(crate) tie_breaks: Vec<TieBreakEvent>,
}

impl Tabulation {
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn transfers(&self) -> &[RoundTransfer] {
        &self.transfers
    }

    pub fn outcomes(&self) -> &CandidateOutcomes {
        &self.outcomes
    }

    pub fn win_threshold(&self) -> &WinThreshold {
        &self.win_threshold
    }

    pub fn tie_breaks(&self) -> &[TieBreakEvent] {
        &self.tie_breaks
    }
}
