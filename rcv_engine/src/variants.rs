//! The electoral systems supported out of the box.

use log::debug;

use crate::ballots::CandidateId;
use crate::config::{VoteRules, WinnerElectionMode};
use crate::engine::TabulationState;
use crate::policy::{net_transfer, VariantPolicy};
use crate::tabulation::{Tabulation, Transfer, WinThreshold};
use crate::weight::Weight;

/// Builds the policy selected by the rules.
pub fn policy_for(rules: &VoteRules) -> Box<dyn VariantPolicy> {
    let number_of_winners = rules.number_of_winners;
    match rules.winner_election_mode {
        WinnerElectionMode::SingleWinnerMajority => Box::new(SingleWinnerMajority),
        WinnerElectionMode::Sequential => Box::new(Sequential { number_of_winners }),
        WinnerElectionMode::BottomsUp => Box::new(BottomsUp { number_of_winners }),
        WinnerElectionMode::BottomsUpPercentage(percentage) => {
            Box::new(BottomsUpPercentage { percentage })
        }
        WinnerElectionMode::FractionalStv => Box::new(FractionalStv {
            number_of_winners,
            multi_winner_rounds: rules.multi_winner_rounds,
        }),
        WinnerElectionMode::UntilTwo => Box::new(UntilTwo),
    }
}

fn active_total(tallies: &[(CandidateId, Weight)]) -> Weight {
    tallies.iter().map(|(_, w)| w).sum()
}

fn seats_left(state: &TabulationState, number_of_winners: u32) -> usize {
    (number_of_winners as usize).saturating_sub(state.outcomes().elected_in_rounds())
}

fn single_winner_found(state: &TabulationState) -> bool {
    state.outcomes().elected_in_rounds() > 0 || state.outcomes().active().is_empty()
}

// The top candidate wins with a strict majority of the active votes, or alone.
fn majority_winner(state: &TabulationState) -> Vec<CandidateId> {
    let tallies = state.active_tallies();
    let total = active_total(&tallies);
    match tallies.first() {
        Some((cid, w)) if tallies.len() == 1 || w.clone() * 2 > total => vec![*cid],
        _ => Vec::new(),
    }
}

// The `n` first candidates of a tally sorted by decreasing weight. Candidates tied at
// the cut are dropped with the tie-break order of the policy, one recorded tie at a time.
// Nobody wins if the policy does not drop one of the tied candidates.
fn take_with_ties(
    policy: &dyn VariantPolicy,
    state: &TabulationState,
    tallies: Vec<(CandidateId, Weight)>,
    n: usize,
) -> Vec<CandidateId> {
    if tallies.len() <= n {
        return tallies.into_iter().map(|(cid, _)| cid).collect();
    }
    let cutoff = match n.checked_sub(1).and_then(|idx| tallies.get(idx)) {
        Some((_, w)) => w.clone(),
        None => return Vec::new(),
    };
    let mut winners: Vec<CandidateId> = tallies
        .iter()
        .filter(|(_, w)| *w > cutoff)
        .map(|(cid, _)| *cid)
        .collect();
    let mut tied: Vec<CandidateId> = tallies
        .iter()
        .filter(|(_, w)| *w == cutoff)
        .map(|(cid, _)| *cid)
        .collect();
    while winners.len() + tied.len() > n {
        match policy.break_loser_tie(state, &tied) {
            Some(loser) if tied.contains(&loser) => {
                state.record_tie_break(&tied, loser);
                tied.retain(|cid| *cid != loser);
            }
            _ => return Vec::new(),
        }
    }
    winners.extend(tied);
    winners
}

/// Instant runoff voting for a single seat.
#[derive(Debug, Clone, Copy)]
pub struct SingleWinnerMajority;

impl VariantPolicy for SingleWinnerMajority {
    fn name(&self) -> &'static str {
        "single_winner_majority"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        majority_winner(state)
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        !single_winner_found(state)
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }

    fn win_threshold(&self, _state: &TabulationState) -> WinThreshold {
        WinThreshold::Dynamic
    }
}

/// Multi-pass instant runoff: one single-winner tabulation per seat. The winners of
/// the previous passes are removed from the ballots before the next pass.
#[derive(Debug, Clone, Copy)]
pub struct Sequential {
    pub number_of_winners: u32,
}

impl VariantPolicy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        majority_winner(state)
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        !single_winner_found(state)
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }

    fn win_threshold(&self, _state: &TabulationState) -> WinThreshold {
        WinThreshold::Dynamic
    }

    fn next_tabulation(&self, completed: &[Tabulation]) -> Option<Vec<CandidateId>> {
        let last = match completed.last() {
            None => return Some(Vec::new()),
            Some(t) => t,
        };
        let winners = last.outcomes().elected();
        let candidates = last.outcomes().iter().count();
        let new_winner = last.outcomes().elected_in_rounds() > 0;
        debug!(
            "sequential: {} winners after {} tabulations",
            winners.len(),
            completed.len()
        );
        if new_winner && winners.len() < self.number_of_winners as usize && winners.len() < candidates
        {
            Some(winners)
        } else {
            None
        }
    }
}

/// Eliminates candidates until only as many as there are seats remain.
#[derive(Debug, Clone, Copy)]
pub struct BottomsUp {
    pub number_of_winners: u32,
}

impl VariantPolicy for BottomsUp {
    fn name(&self) -> &'static str {
        "bottoms_up"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        let active = state.outcomes().active();
        if active.len() <= seats_left(state, self.number_of_winners) {
            state
                .active_tallies()
                .into_iter()
                .map(|(cid, _)| cid)
                .collect()
        } else {
            Vec::new()
        }
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        seats_left(state, self.number_of_winners) > 0 && !state.outcomes().active().is_empty()
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }
}

/// Eliminates candidates until every remaining one holds at least a percentage of
/// the active votes. All of them win.
#[derive(Debug, Clone, Copy)]
pub struct BottomsUpPercentage {
    pub percentage: u32,
}

impl VariantPolicy for BottomsUpPercentage {
    fn name(&self) -> &'static str {
        "bottoms_up_percentage"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        let tallies = state.active_tallies();
        let total = active_total(&tallies);
        let all_above = tallies
            .iter()
            .all(|(_, w)| w.clone() * 100 >= total.clone() * self.percentage as u64);
        if tallies.len() == 1 || all_above {
            tallies.into_iter().map(|(cid, _)| cid).collect()
        } else {
            Vec::new()
        }
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        !single_winner_found(state)
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }

    fn win_threshold(&self, _state: &TabulationState) -> WinThreshold {
        WinThreshold::Dynamic
    }
}

/// Single transferable vote, Droop quota, surplus transferred as a fraction of
/// every ballot held by the winner.
#[derive(Debug, Clone, Copy)]
pub struct FractionalStv {
    pub number_of_winners: u32,
    pub multi_winner_rounds: bool,
}

impl FractionalStv {
    /// floor(first round active votes / (seats + 1)) + 1
    pub fn quota(&self, state: &TabulationState) -> Weight {
        let first_round_total = state
            .rounds()
            .first()
            .map(|r| r.total())
            .unwrap_or_else(Weight::zero);
        (first_round_total / (self.number_of_winners as u64 + 1)).floor() + Weight::one()
    }
}

impl VariantPolicy for FractionalStv {
    fn name(&self) -> &'static str {
        "fractional_stv"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        let seats = seats_left(state, self.number_of_winners);
        let tallies = state.active_tallies();
        if tallies.len() <= seats {
            return tallies.into_iter().map(|(cid, _)| cid).collect();
        }
        let quota = self.quota(state);
        let per_round = if self.multi_winner_rounds { seats } else { 1 };
        let above_quota: Vec<(CandidateId, Weight)> =
            tallies.into_iter().filter(|(_, w)| *w >= quota).collect();
        take_with_ties(self, state, above_quota, per_round)
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        seats_left(state, self.number_of_winners) > 0 && !state.outcomes().active().is_empty()
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }

    fn win_threshold(&self, state: &TabulationState) -> WinThreshold {
        WinThreshold::Fixed(self.quota(state))
    }

    fn update_weights(&self, state: &mut TabulationState) {
        let quota = self.quota(state);
        let winners: Vec<CandidateId> = state.round_winners().to_vec();
        for winner in winners {
            let tally = state.current_round().tally_of(winner);
            let keep = if tally > quota {
                (&tally - &quota)
                    .checked_div(&tally)
                    .unwrap_or_else(Weight::zero)
            } else {
                Weight::zero()
            };
            debug!(
                "fractional_stv: {:?} has {} for a quota of {}, transfer fraction {}",
                winner, tally, quota, keep
            );
            for b in state.ballots_mut().iter_mut() {
                if b.top() == Some(winner) {
                    b.retain_with(winner, &keep);
                }
            }
            let held = &tally - &(&tally * &keep);
            state.set_extra_votes(winner, held);
        }
    }
}

/// Eliminates candidates until two remain, the larger one wins.
#[derive(Debug, Clone, Copy)]
pub struct UntilTwo;

impl VariantPolicy for UntilTwo {
    fn name(&self) -> &'static str {
        "until_two"
    }

    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId> {
        let tallies = state.active_tallies();
        if tallies.len() <= 2 {
            take_with_ties(self, state, tallies, 1)
        } else {
            Vec::new()
        }
    }

    fn contest_continues(&self, state: &TabulationState) -> bool {
        !single_winner_found(state)
    }

    fn round_transfer(&self, state: &TabulationState) -> Transfer {
        net_transfer(state)
    }
}
