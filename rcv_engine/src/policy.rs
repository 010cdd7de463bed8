use log::debug;

use std::collections::BTreeMap;

use crate::ballots::CandidateId;
use crate::config::TieBreakMode;
use crate::engine::TabulationState;
use crate::tabulation::{Tabulation, Transfer, WinThreshold};
use crate::weight::Weight;

/// The rules that make one electoral system different from another.
///
/// The round engine is the same for every system. It consults the policy at each
/// decision point and passes it the state of the tabulation explicitly.
pub trait VariantPolicy {
    fn name(&self) -> &'static str;

    /// The candidates elected in the current round. They must all be active.
    fn round_winners(&self, state: &TabulationState) -> Vec<CandidateId>;

    /// Whether another round should be counted.
    fn contest_continues(&self, state: &TabulationState) -> bool;

    /// The movement of weight from the current round to the next one.
    fn round_transfer(&self, state: &TabulationState) -> Transfer;

    fn win_threshold(&self, _state: &TabulationState) -> WinThreshold {
        WinThreshold::NotApplicable
    }

    /// Rescales ballots before the next round. The total weight must not change.
    fn update_weights(&self, _state: &mut TabulationState) {}

    /// Picks the candidate to eliminate among candidates tied for the lowest tally.
    fn break_loser_tie(
        &self,
        state: &TabulationState,
        tied: &[CandidateId],
    ) -> Option<CandidateId> {
        break_tie(state, tied)
    }

    /// The candidates to carry over as already elected into the next tabulation, or
    /// None when the contest is complete. The default runs a single tabulation.
    fn next_tabulation(&self, completed: &[Tabulation]) -> Option<Vec<CandidateId>> {
        if completed.is_empty() {
            Some(Vec::new())
        } else {
            None
        }
    }
}

/// Generates a "random" ordering of the candidates. Random in this context means hard
/// to guess in advance: it relies on a cryptographic hash that is resilient to collisions.
fn hash_key(seed: u32, round: u32, name: &str) -> String {
    sha256::digest(format!("{:08}{:08}{}", seed, round, name))
}

/// The tie-break configured in the rules: the last candidate of the order loses.
pub fn break_tie(state: &TabulationState, tied: &[CandidateId]) -> Option<CandidateId> {
    let roster = state.roster();
    let chosen = match state.tiebreak_mode() {
        TieBreakMode::Alphabetical => tied.iter().max_by_key(|cid| roster.name(**cid)),
        TieBreakMode::UseCandidateOrder => tied.iter().max(),
        TieBreakMode::Random(seed) => tied
            .iter()
            .max_by_key(|cid| hash_key(seed, state.round(), roster.name(**cid))),
    };
    debug!(
        "break_tie: mode {:?} picks {:?} among {:?}",
        state.tiebreak_mode(),
        chosen,
        tied
    );
    chosen.cloned()
}

/// The net change of every candidate's tally between the current round and the
/// next one, the exhausted weight being what leaves the active count.
pub fn net_transfer(state: &TabulationState) -> Transfer {
    let current = state.current_round();
    let next = state.next_round_tally();
    let mut candidates: BTreeMap<CandidateId, Weight> = BTreeMap::new();
    for cid in state.roster().ids() {
        let after = next.get(&cid).cloned().unwrap_or_default();
        candidates.insert(cid, &after - &current.tally_of(cid));
    }
    let next_total: Weight = next.values().sum();
    let exhaust = current.total() - next_total;
    debug!(
        "net_transfer: round {}: {:?} exhaust: {}",
        state.round(),
        candidates,
        exhaust
    );
    Transfer {
        candidates,
        exhaust,
    }
}
