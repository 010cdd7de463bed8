use log::{debug, info, warn};
use snafu::ensure;

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::ballots::*;
use crate::config::{TieBreakMode, VoteRules};
use crate::error::*;
use crate::outcomes::{CandidateOutcomes, RoundId};
use crate::policy::VariantPolicy;
use crate::tabulation::*;
use crate::weight::Weight;

static NO_ROUND: Round = Round {
    candidates: Vec::new(),
    tallies: Vec::new(),
};

/// The state of a tabulation in progress, as seen by the variant policies.
///
/// A state belongs to a single tabulation of a single contest.
pub struct TabulationState<'a> {
    roster: &'a Roster,
    tiebreak_mode: TieBreakMode,
    tabulation: u32,
    round: RoundId,
    ballots: Vec<Ballot>,
    outcomes: CandidateOutcomes,
    // Number of inactive candidates already removed from the ballots.
    cleaned: usize,
    // Weight held by candidates outside of the ballots, such as a quota kept by a winner.
    extra_votes: BTreeMap<CandidateId, Weight>,
    rounds: Vec<Round>,
    round_winners: Vec<CandidateId>,
    tie_breaks: RefCell<Vec<TieBreakEvent>>,
}

impl<'a> TabulationState<'a> {
    pub fn roster(&self) -> &Roster {
        self.roster
    }

    pub fn tiebreak_mode(&self) -> TieBreakMode {
        self.tiebreak_mode
    }

    pub fn tabulation(&self) -> u32 {
        self.tabulation
    }

    pub fn round(&self) -> RoundId {
        self.round
    }

    pub fn ballots(&self) -> &[Ballot] {
        &self.ballots
    }

    pub fn ballots_mut(&mut self) -> &mut [Ballot] {
        &mut self.ballots
    }

    pub fn outcomes(&self) -> &CandidateOutcomes {
        &self.outcomes
    }

    pub fn extra_votes(&self) -> &BTreeMap<CandidateId, Weight> {
        &self.extra_votes
    }

    pub fn set_extra_votes(&mut self, cid: CandidateId, weight: Weight) {
        self.extra_votes.insert(cid, weight);
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// The round being counted. Empty before the first tally.
    pub fn current_round(&self) -> &Round {
        self.rounds.last().unwrap_or(&NO_ROUND)
    }

    /// The winners of the current round, once they are known.
    pub fn round_winners(&self) -> &[CandidateId] {
        &self.round_winners
    }

    /// The active candidates and their tally in the current round, by decreasing tally.
    pub fn active_tallies(&self) -> Vec<(CandidateId, Weight)> {
        let round = self.current_round();
        round
            .candidates
            .iter()
            .zip(round.tallies.iter())
            .filter(|(cid, _)| self.outcomes.is_active(**cid))
            .map(|(cid, w)| (*cid, w.clone()))
            .collect()
    }

    /// The tally the next round would have if the ballots were cleaned now.
    pub fn next_round_tally(&self) -> BTreeMap<CandidateId, Weight> {
        let mut tally: BTreeMap<CandidateId, Weight> =
            self.roster.ids().map(|cid| (cid, Weight::zero())).collect();
        for b in self.ballots.iter() {
            if let Some(cid) = b.ranks.iter().find(|cid| self.outcomes.is_active(**cid)) {
                if let Some(w) = tally.get_mut(cid) {
                    *w += &b.weight;
                }
            }
        }
        for (cid, extra) in self.extra_votes.iter() {
            if let Some(w) = tally.get_mut(cid) {
                *w += extra;
            }
        }
        tally
    }

    /// Records a tie settled by the tie-break order. `chosen` is the candidate the
    /// tie went against.
    pub fn record_tie_break(&self, tied: &[CandidateId], chosen: CandidateId) {
        let roster = self.roster;
        warn!(
            "Round {}: tie between {:?}, settled against {}",
            self.round,
            tied.iter().map(|cid| roster.name(*cid)).collect::<Vec<&str>>(),
            roster.name(chosen)
        );
        self.tie_breaks.borrow_mut().push(TieBreakEvent {
            round: self.round,
            tied: tied.to_vec(),
            chosen,
        });
    }

    fn clean_ballots(&mut self) {
        let newly_inactive: Vec<CandidateId> = self.outcomes.inactive()[self.cleaned..].to_vec();
        for cid in newly_inactive.iter() {
            debug!("clean_ballots: removing {}", self.roster.name(*cid));
            for b in self.ballots.iter_mut() {
                b.remove_candidate(*cid);
            }
        }
        self.cleaned += newly_inactive.len();
    }

    fn tally_active_ballots(&mut self) {
        let mut tally: BTreeMap<CandidateId, Weight> =
            self.roster.ids().map(|cid| (cid, Weight::zero())).collect();
        for b in self.ballots.iter() {
            if let Some(w) = b.top().and_then(|cid| tally.get_mut(&cid)) {
                *w += &b.weight;
            }
        }
        for (cid, extra) in self.extra_votes.iter() {
            if let Some(w) = tally.get_mut(cid) {
                *w += extra;
            }
        }
        let roster = self.roster;
        let mut sorted: Vec<(CandidateId, Weight)> = tally.into_iter().collect();
        sorted.sort_by(|(c1, w1), (c2, w2)| {
            w2.cmp(w1)
                .then_with(|| roster.name(*c1).cmp(roster.name(*c2)))
        });
        let (candidates, tallies): (Vec<CandidateId>, Vec<Weight>) = sorted.into_iter().unzip();
        self.rounds.push(Round {
            candidates,
            tallies,
        });
    }
}

/// Runs one tabulation from the initial ballots to a terminal state.
///
/// `carried_winners` are candidates elected in a previous tabulation of the same
/// contest. They are marked as elected in round 0 and removed from the ballots.
pub(crate) fn run_tabulation(
    ballot_set: &BallotSet,
    rules: &VoteRules,
    policy: &dyn VariantPolicy,
    tabulation: u32,
    carried_winners: &[CandidateId],
) -> Result<Tabulation, TabulationError> {
    let roster = &ballot_set.roster;
    let mut state = TabulationState {
        roster,
        tiebreak_mode: rules.tiebreak_mode,
        tabulation,
        round: 0,
        ballots: ballot_set.ballots.clone(),
        outcomes: CandidateOutcomes::new(roster),
        cleaned: 0,
        extra_votes: BTreeMap::new(),
        rounds: Vec::new(),
        round_winners: Vec::new(),
        tie_breaks: RefCell::new(Vec::new()),
    };
    for cid in carried_winners.iter() {
        state.outcomes.elect(*cid, 0);
    }

    state.clean_ballots();
    let has_candidates = state.ballots.iter().any(|b| !b.ranks.is_empty());
    ensure!(has_candidates, AllBlankBallotsSnafu { tabulation });

    info!(
        "Tabulation {} ({}): {} ballots, {} candidates",
        tabulation,
        policy.name(),
        state.ballots.len(),
        roster.len()
    );

    let initial_ranks: Vec<Vec<CandidateId>> =
        state.ballots.iter().map(|b| b.ranks.clone()).collect();
    let initial_weights: Vec<Weight> = state.ballots.iter().map(|b| b.weight.clone()).collect();

    let mut transfers: Vec<RoundTransfer> = Vec::new();
    let mut zero_vote_rule_applied = false;
    loop {
        state.round += 1;
        let round = state.round;
        state.round_winners.clear();
        let inactive_before = state.outcomes.inactive().len();

        state.tally_active_ballots();
        debug!(
            "run_tabulation: round {} tally: {:?}",
            round,
            state.current_round()
        );

        let mut winners = checked_round_winners(&state, policy)?;

        // The first round without a winner drops every candidate with no vote at all,
        // along with the regular loser of the round.
        let mut zero_vote_losers: Vec<CandidateId> = Vec::new();
        if !zero_vote_rule_applied && winners.is_empty() {
            zero_vote_rule_applied = true;
            let active = state.active_tallies();
            zero_vote_losers = active
                .iter()
                .filter(|(_, w)| w.is_zero())
                .map(|(cid, _)| *cid)
                .collect();
            if zero_vote_losers.len() == active.len() {
                zero_vote_losers.clear();
            }
            for cid in zero_vote_losers.iter() {
                state.outcomes.eliminate(*cid, round);
            }
            if !zero_vote_losers.is_empty() {
                winners = checked_round_winners(&state, policy)?;
            }
        }

        for cid in winners.iter() {
            state.outcomes.elect(*cid, round);
        }
        state.round_winners = winners;

        let mut continues = policy.contest_continues(&state);
        let mut round_loser: Option<CandidateId> = None;
        if continues && state.round_winners.is_empty() {
            round_loser = find_round_loser(&state, policy)?;
            if let Some(cid) = round_loser {
                state.outcomes.eliminate(cid, round);
            }
            continues = policy.contest_continues(&state);
        }

        info!(
            "Round {} elected: {:?} eliminated: {:?}",
            round,
            state
                .round_winners
                .iter()
                .map(|cid| roster.name(*cid))
                .collect::<Vec<&str>>(),
            zero_vote_losers
                .iter()
                .chain(round_loser.iter())
                .map(|cid| roster.name(*cid))
                .collect::<Vec<&str>>()
        );

        if !continues {
            // There is no next round: everyone still standing is out now.
            for cid in state.outcomes.active() {
                state.outcomes.eliminate(cid, round);
            }
            transfers.push(RoundTransfer::NotApplicable);
            break;
        }

        ensure!(
            state.outcomes.inactive().len() > inactive_before,
            StalledSnafu { tabulation, round }
        );

        policy.update_weights(&mut state);
        transfers.push(RoundTransfer::Flows(policy.round_transfer(&state)));
        state.clean_ballots();
    }

    let final_weight_distrib: Vec<Vec<(Holder, Weight)>> = state
        .ballots
        .iter()
        .map(|b| {
            let holder = match b.top() {
                Some(cid) => Holder::Candidate(cid),
                None => Holder::Exhausted,
            };
            let mut distrib = b.weight_distrib.clone();
            distrib.push((holder, b.weight.clone()));
            distrib
        })
        .collect();
    let win_threshold = policy.win_threshold(&state);
    info!(
        "Tabulation {} complete after {} rounds, threshold: {:?}",
        tabulation,
        state.rounds.len(),
        win_threshold
    );

    Ok(Tabulation {
        final_ranks: state.ballots.iter().map(|b| b.ranks.clone()).collect(),
        final_weights: state.ballots.iter().map(|b| b.weight.clone()).collect(),
        final_weight_distrib,
        win_threshold,
        rounds: state.rounds,
        transfers,
        outcomes: state.outcomes,
        initial_ranks,
        initial_weights,
        tie_breaks: state.tie_breaks.into_inner(),
    })
}

// The winners named by the policy, which must all still be in the race.
fn checked_round_winners(
    state: &TabulationState,
    policy: &dyn VariantPolicy,
) -> Result<Vec<CandidateId>, TabulationError> {
    let winners = policy.round_winners(state);
    for cid in winners.iter() {
        ensure!(
            state.outcomes.is_active(*cid),
            InconsistentPolicySnafu {
                tabulation: state.tabulation,
                round: state.round,
                message: format!("{} is not an active candidate", state.roster.name(*cid)),
            }
        );
    }
    Ok(winners)
}

// The active candidate with the lowest non-zero tally. Zero-tally candidates are only
// considered when nobody else is left.
fn find_round_loser(
    state: &TabulationState,
    policy: &dyn VariantPolicy,
) -> Result<Option<CandidateId>, TabulationError> {
    let active = state.active_tallies();
    let with_votes: Vec<(CandidateId, Weight)> = active
        .iter()
        .filter(|(_, w)| !w.is_zero())
        .cloned()
        .collect();
    let pool = if with_votes.is_empty() {
        active
    } else {
        with_votes
    };
    let min_count = match pool.iter().map(|(_, w)| w).min() {
        Some(w) => w.clone(),
        None => return Ok(None),
    };
    let tied: Vec<CandidateId> = pool
        .iter()
        .filter(|(_, w)| *w == min_count)
        .map(|(cid, _)| *cid)
        .collect();
    if tied.len() == 1 {
        return Ok(tied.first().cloned());
    }

    let chosen = policy.break_loser_tie(state, &tied);
    let chosen = match chosen {
        Some(cid) if tied.contains(&cid) => cid,
        _ => {
            return InconsistentPolicySnafu {
                tabulation: state.tabulation,
                round: state.round,
                message: format!("tie-break picked {:?} outside of {:?}", chosen, tied),
            }
            .fail();
        }
    };
    debug!("find_round_loser: {:?} tied at {}", tied, min_count);
    state.record_tie_break(&tied, chosen);
    Ok(Some(chosen))
}

/// Runs all the tabulations a contest needs, as decided by the policy.
pub(crate) fn run_contest(
    ballot_set: &BallotSet,
    rules: &VoteRules,
    policy: &dyn VariantPolicy,
) -> Result<Vec<Tabulation>, TabulationError> {
    let mut tabulations: Vec<Tabulation> = Vec::new();
    while let Some(carried) = policy.next_tabulation(&tabulations) {
        let tabulation = tabulations.len() as u32 + 1;
        let tab = run_tabulation(ballot_set, rules, policy, tabulation, &carried)?;
        tabulations.push(tab);
    }
    Ok(tabulations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::policy::net_transfer;
    use crate::tabulate_with_policy;
    use crate::variants::SingleWinnerMajority;

    fn ballot_set() -> (BallotSet, VoteRules) {
        let rules = VoteRules::default();
        let mut builder = Builder::new(&rules)
            .unwrap()
            .candidates(&["A".to_string(), "B".to_string(), "C".to_string()])
            .unwrap();
        builder.add_vote_simple(&["A", "B"]).unwrap();
        builder.add_vote_simple(&["B", "C"]).unwrap();
        builder.add_vote_simple(&["C", "B"]).unwrap();
        builder.add_vote_simple(&["C"]).unwrap();
        let contest = builder.build("engine");
        (crate::ballots::normalize(&contest).unwrap(), rules)
    }

    #[test]
    fn rounds_and_transfers() {
        let (bs, rules) = ballot_set();
        let tab = run_tabulation(&bs, &rules, &SingleWinnerMajority, 1, &[]).unwrap();
        // Round 1: C=2 A=1 B=1, B goes on the tie. Round 2: C=3 A=1.
        assert_eq!(tab.rounds().len(), 2);
        let names: Vec<&str> = tab.rounds()[0]
            .candidates()
            .iter()
            .map(|cid| bs.roster.name(*cid))
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(tab.tie_breaks().len(), 1);
        match &tab.transfers()[0] {
            RoundTransfer::Flows(t) => {
                let total: Weight = t.candidates.values().sum::<Weight>() + &t.exhaust;
                assert!(total.is_zero());
                assert!(t.exhaust.is_zero());
            }
            x => panic!("unexpected {:?}", x),
        }
        assert_eq!(tab.transfers()[1], RoundTransfer::NotApplicable);
        assert_eq!(tab.outcomes().active(), Vec::<CandidateId>::new());
    }

    #[test]
    fn carried_winners_are_cleaned_first() {
        let (bs, rules) = ballot_set();
        let c = bs.roster.id_of("C").unwrap();
        let tab = run_tabulation(&bs, &rules, &SingleWinnerMajority, 2, &[c]).unwrap();
        assert_eq!(tab.outcomes().get(c).round_elected, Some(0));
        assert!(tab.initial_ranks.iter().all(|r| !r.contains(&c)));
        // The ballot that only ranked C is exhausted from the start.
        assert!(tab.initial_ranks[3].is_empty());
    }

    // Elects the first candidate of the roster, whether it is still running or not.
    struct AlwaysFirst;

    impl VariantPolicy for AlwaysFirst {
        fn name(&self) -> &'static str {
            "always_first"
        }

        fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
            state.roster().ids().take(1).collect()
        }

        fn contest_continues(&self, _state: &TabulationState) -> bool {
            true
        }

        fn round_transfer(&self, state: &TabulationState) -> Transfer {
            net_transfer(state)
        }
    }

    #[test]
    fn winners_must_be_active() {
        let (bs, rules) = ballot_set();
        assert!(matches!(
            run_tabulation(&bs, &rules, &AlwaysFirst, 1, &[]),
            Err(TabulationError::InconsistentPolicy {
                tabulation: 1,
                round: 2,
                ..
            })
        ));
    }

    // Names a candidate that does not exist in the contest.
    struct ForeignWinner;

    impl VariantPolicy for ForeignWinner {
        fn name(&self) -> &'static str {
            "foreign_winner"
        }

        fn round_winners(&self, _state: &TabulationState) -> Vec<CandidateId> {
            vec![CandidateId(7)]
        }

        fn contest_continues(&self, _state: &TabulationState) -> bool {
            true
        }

        fn round_transfer(&self, state: &TabulationState) -> Transfer {
            net_transfer(state)
        }
    }

    #[test]
    fn winners_outside_the_roster_are_an_error() {
        let (bs, rules) = ballot_set();
        let err = run_tabulation(&bs, &rules, &ForeignWinner, 1, &[]).unwrap_err();
        assert_eq!(
            err,
            TabulationError::InconsistentPolicy {
                tabulation: 1,
                round: 1,
                message: "? is not an active candidate".to_string(),
            }
        );
    }

    // Picks a loser outside of the tied candidates.
    struct BadTieBreak;

    impl VariantPolicy for BadTieBreak {
        fn name(&self) -> &'static str {
            "bad_tie_break"
        }

        fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
            SingleWinnerMajority.round_winners(state)
        }

        fn contest_continues(&self, state: &TabulationState) -> bool {
            SingleWinnerMajority.contest_continues(state)
        }

        fn round_transfer(&self, state: &TabulationState) -> Transfer {
            net_transfer(state)
        }

        fn break_loser_tie(
            &self,
            state: &TabulationState,
            _tied: &[CandidateId],
        ) -> Option<CandidateId> {
            state.roster().id_of("C")
        }
    }

    #[test]
    fn tie_break_must_pick_a_tied_candidate() {
        let (bs, rules) = ballot_set();
        let err = run_tabulation(&bs, &rules, &BadTieBreak, 1, &[]).unwrap_err();
        assert!(matches!(
            err,
            TabulationError::InconsistentPolicy { round: 1, .. }
        ));
    }

    #[test]
    fn custom_policies_go_through_the_checks() {
        let rules = VoteRules::default();
        let mut builder = Builder::new(&rules)
            .unwrap()
            .candidates(&["A".to_string(), "B".to_string()])
            .unwrap();
        builder.add_vote_simple(&["A"]).unwrap();
        builder.add_vote_simple(&["B", "A"]).unwrap();
        builder.add_vote_simple(&["A", "B"]).unwrap();
        let results = tabulate_with_policy(&builder.build("custom"), &BadTieBreak).unwrap();
        assert_eq!(results.variant_name(), "bad_tie_break");
        assert_eq!(results.winners(), vec!["A".to_string()]);
    }
}
