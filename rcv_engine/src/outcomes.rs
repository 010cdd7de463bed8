use std::collections::BTreeMap;

use crate::ballots::{CandidateId, Roster};

pub type RoundId = u32;

/// Where a candidate stands in a tabulation.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct Outcome {
    pub round_elected: Option<RoundId>,
    pub round_eliminated: Option<RoundId>,
}

impl Outcome {
    pub fn is_active(&self) -> bool {
        self.round_elected.is_none() && self.round_eliminated.is_none()
    }

    /// True if the candidate was still in the race when the given round was counted.
    pub fn active_in(&self, round: RoundId) -> bool {
        self.round_elected.map(|r| r >= round).unwrap_or(true)
            && self.round_eliminated.map(|r| r >= round).unwrap_or(true)
    }
}

/// The lifecycle of every candidate of a tabulation.
///
/// This is the only place that says whether a candidate is still in the race.
/// Candidates leave the active set in the order they are marked, which is also the
/// order in which they get cleaned from the ballots.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateOutcomes {
    outcomes: BTreeMap<CandidateId, Outcome>,
    inactive: Vec<CandidateId>,
}

impl CandidateOutcomes {
    pub(crate) fn new(roster: &Roster) -> CandidateOutcomes {
        CandidateOutcomes {
            outcomes: roster.ids().map(|cid| (cid, Outcome::default())).collect(),
            inactive: Vec::new(),
        }
    }

    pub fn get(&self, cid: CandidateId) -> Outcome {
        self.outcomes.get(&cid).cloned().unwrap_or_default()
    }

    /// False for candidates outside of the roster.
    pub fn is_active(&self, cid: CandidateId) -> bool {
        self.outcomes
            .get(&cid)
            .map(|o| o.is_active())
            .unwrap_or(false)
    }

    /// The active candidates, in declared order.
    pub fn active(&self) -> Vec<CandidateId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_active())
            .map(|(cid, _)| *cid)
            .collect()
    }

    /// All the elected candidates, in declared order.
    pub fn elected(&self) -> Vec<CandidateId> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.round_elected.is_some())
            .map(|(cid, _)| *cid)
            .collect()
    }

    /// Candidates elected during the rounds of this tabulation, which excludes the
    /// winners carried over from a previous tabulation.
    pub fn elected_in_rounds(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o.round_elected, Some(r) if r > 0))
            .count()
    }

    /// Candidates that left the race, in the order they did.
    pub fn inactive(&self) -> &[CandidateId] {
        &self.inactive
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CandidateId, &Outcome)> {
        self.outcomes.iter()
    }

    // Marking an inactive candidate again is a no-op: a candidate leaves the race once.
    pub(crate) fn elect(&mut self, cid: CandidateId, round: RoundId) {
        if let Some(o) = self.outcomes.get_mut(&cid) {
            if o.is_active() {
                o.round_elected = Some(round);
                self.inactive.push(cid);
            }
        }
    }

    pub(crate) fn eliminate(&mut self, cid: CandidateId, round: RoundId) {
        if let Some(o) = self.outcomes.get_mut(&cid) {
            if o.is_active() {
                o.round_eliminated = Some(round);
                self.inactive.push(cid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster::new(vec!["A".to_string(), "B".to_string(), "C".to_string()])
    }

    #[test]
    fn candidates_leave_once() {
        let mut outcomes = CandidateOutcomes::new(&roster());
        outcomes.eliminate(CandidateId(2), 1);
        outcomes.elect(CandidateId(2), 2);
        outcomes.elect(CandidateId(0), 2);
        assert_eq!(outcomes.inactive(), &[CandidateId(2), CandidateId(0)]);
        assert_eq!(outcomes.active(), vec![CandidateId(1)]);
        assert_eq!(outcomes.get(CandidateId(2)).round_elected, None);
        assert_eq!(outcomes.elected(), vec![CandidateId(0)]);
    }

    #[test]
    fn activity_by_round() {
        let mut outcomes = CandidateOutcomes::new(&roster());
        outcomes.eliminate(CandidateId(1), 2);
        outcomes.elect(CandidateId(0), 0);
        let b = outcomes.get(CandidateId(1));
        assert!(b.active_in(1));
        assert!(b.active_in(2));
        assert!(!b.active_in(3));
        assert!(!outcomes.get(CandidateId(0)).active_in(1));
        assert_eq!(outcomes.elected_in_rounds(), 0);
    }

    #[test]
    fn unknown_candidates_are_never_active() {
        let outcomes = CandidateOutcomes::new(&roster());
        assert!(!outcomes.is_active(CandidateId(3)));
        assert!(outcomes.is_active(CandidateId(2)));
        assert_eq!(roster().name(CandidateId(3)), "?");
    }
}
