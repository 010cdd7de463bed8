// ********* Input data structures ***********

use crate::weight::Weight;

/// The name under which all the undeclared write-ins are combined.
pub const UWI: &str = "Undeclared Write-ins";

/// The reserved transfer key for the weight leaving the count.
pub const EXHAUST: &str = "exhaust";

/// All the possible states corresponding to a choice in a ballot.
///
/// In most cases, it is enough to use the higher-level builder API.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum BallotChoice {
    /// A candidate, which may or may not be declared.
    Candidate(String),
    /// A name that has been already written out as not being a
    /// declared candidate.
    UndeclaredWriteIn,
    /// More than one candidate marked at the same rank.
    Overvote,
    /// A missing vote.
    Undervote,
    /// A blank content in the vote or some content that is not valid.
    Blank,
}

/// A ballot as cast, before any of the normalization rules apply.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CastBallot {
    pub choices: Vec<BallotChoice>,
    pub weight: Weight,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: bool,
}

/// Everything the engine needs to know about one contest.
///
/// The contest is never modified by the tabulation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Contest {
    pub name: String,
    pub candidates: Vec<Candidate>,
    pub rules: VoteRules,
    pub ballots: Vec<CastBallot>,
}

// ********* Configuration **********

// The configuration options follow the vocabulary of the RCTab configuration file:
// https://github.com/BrightSpots/rcv/blob/develop/config_file_documentation.txt

/// How a tie between the candidates with the lowest tally is resolved.
///
/// In every mode the candidate eliminated is the *last* one of the order.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Eliminate the candidate whose name sorts last.
    Alphabetical,
    /// Eliminate the candidate declared last.
    UseCandidateOrder,
    /// A permutation that is hard to predict in advance: candidates are ordered by the
    /// SHA-256 hash of the seed, the round number and their name.
    Random(u32),
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum OverVoteRule {
    ExhaustImmediately,
    AlwaysSkipToNextRank,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum DuplicateCandidateMode {
    Exhaust,
    SkipDuplicate,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WriteInMode {
    /// All the undeclared write-ins count for a single pseudo-candidate.
    Combine,
    /// Undeclared write-ins are ignored, as if the rank was never filled.
    Exclude,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MaxSkippedRank {
    Unlimited,
    ExhaustOnFirstOccurence,
    MaxAllowed(u32),
}

/// The electoral system.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum WinnerElectionMode {
    /// Instant runoff: a strict majority of the active votes wins.
    SingleWinnerMajority,
    /// Multi-pass instant runoff: one single-winner tabulation per seat, each pass
    /// removing the candidates elected before.
    Sequential,
    /// Eliminate until no more candidates than seats remain.
    BottomsUp,
    /// Eliminate until every remaining candidate holds at least the given percentage
    /// of the active votes.
    BottomsUpPercentage(u32),
    /// Single transferable vote with a Droop quota and fractional surplus transfer.
    FractionalStv,
    /// Eliminate until two candidates remain, the larger of the two wins.
    UntilTwo,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRules {
    pub tiebreak_mode: TieBreakMode,
    pub overvote_rule: OverVoteRule,
    pub winner_election_mode: WinnerElectionMode,
    pub number_of_winners: u32,
    /// If false, at most one candidate is elected per round.
    pub multi_winner_rounds: bool,
    pub max_skipped_rank_allowed: MaxSkippedRank,
    pub max_rankings_allowed: Option<u32>,
    pub duplicate_candidate_mode: DuplicateCandidateMode,
    pub write_in_mode: WriteInMode,
}

impl VoteRules {
    pub const DEFAULT_RULES: VoteRules = VoteRules {
        tiebreak_mode: TieBreakMode::Alphabetical,
        overvote_rule: OverVoteRule::AlwaysSkipToNextRank,
        winner_election_mode: WinnerElectionMode::SingleWinnerMajority,
        number_of_winners: 1,
        multi_winner_rounds: false,
        max_skipped_rank_allowed: MaxSkippedRank::Unlimited,
        max_rankings_allowed: None,
        duplicate_candidate_mode: DuplicateCandidateMode::SkipDuplicate,
        write_in_mode: WriteInMode::Combine,
    };
}

impl Default for VoteRules {
    fn default() -> Self {
        VoteRules::DEFAULT_RULES
    }
}
