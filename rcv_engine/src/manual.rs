/*!

This is the long-form manual for `rcv_engine` and `rcvcrunch`.

## Electoral systems

The system is selected by `winnerElectionMode` in the contest file
([`WinnerElectionMode`](crate::WinnerElectionMode) in the library).

| contest file                          | library                  | seats |
|---------------------------------------|--------------------------|-------|
| `singleWinnerMajority`                | `SingleWinnerMajority`   | 1     |
| `multiPassIrv`                        | `Sequential`             | n     |
| `bottomsUp`                           | `BottomsUp`              | n     |
| `bottomsUpUsingPercentageThreshold`   | `BottomsUpPercentage(p)` | any   |
| `multiWinnerFractionalThreshold`      | `FractionalStv`          | n     |
| `continueUntilTwoCandidatesRemain`    | `UntilTwo`               | 1     |

### `singleWinnerMajority`

Instant runoff. A candidate with a strict majority of the active votes of a round wins.
Otherwise the candidate with the lowest tally is eliminated and the ballots move to their
next choice.

### `multiPassIrv`

One instant-runoff tabulation per seat. Every new tabulation starts from the original
ballots, with the winners of the previous tabulations removed. The winners of the previous
tabulations are reported as elected in round 0.

### `bottomsUp`

Candidates are eliminated one by one until only as many candidates as seats remain. They
all win in the last round.

### `bottomsUpUsingPercentageThreshold`

Candidates are eliminated until every remaining candidate holds at least the given
percentage of the active votes (`multiSeatBottomsUpPercentageThreshold`, from 1 to 100).

### `multiWinnerFractionalThreshold`

Single transferable vote. The threshold is the Droop quota:
`floor(first round active votes / (seats + 1)) + 1`. The candidates at or above the quota
win: only the top one per round, unless `multiWinnerRounds` is set. The surplus of a winner
moves on by scaling all the ballots it holds by `(tally - quota) / tally`; the winner keeps
exactly the quota for the rest of the count. Weights are exact fractions.

### `continueUntilTwoCandidatesRemain`

Candidates are eliminated even when one of them holds a majority, until two remain. The
larger of the two wins.

## Rounds

In every round:
1. the ballots are tallied for their highest-ranked active candidate;
2. the electoral system names the winners of the round;
3. on the first round without a winner, all the candidates without a single vote are
   eliminated at once, and the electoral system is asked again for winners;
4. if nobody won, the active candidate with the lowest tally is eliminated, in the same
   round as the candidates without votes. Candidates with no vote are only considered
   when no other candidate is left.

When the count stops, the candidates still active are eliminated in the last round.

## Ties

A tie for the lowest tally is resolved with `tiebreakMode`:
- `useCandidateOrder`: the candidate declared last is eliminated;
- `random` with a `randomSeed`: the candidates are ordered by the SHA-256 hash of the
  seed, the round and their name, and the last one is eliminated;
- `alphabetical` (the default): the candidate whose name sorts last is eliminated.

The same order settles ties for a seat: in `continueUntilTwoCandidatesRemain` between
the last two candidates, and in `multiWinnerFractionalThreshold` between candidates
reaching the quota in the same round when only one of them can win.

Every tie is reported in the results, and logged.

## Ballots

A ballot is a list of ranks, with a weight (1 by default). A rank is either a name, an
empty string (a skipped rank), or a list of names (an overvote if it has more than one
distinct name).

The ranks are read in order, with the following rules:
- `overvoteRule`: `exhaustImmediately` stops reading the ballot at the first overvote,
  `alwaysSkipToNextRank` ignores the rank;
- `maxSkippedRanksAllowed`: `unlimited`, or a number of consecutive skipped ranks. Past that
  number the ballot is exhausted. `0` exhausts the ballot on the first skipped rank
  followed by a name;
- `exhaustOnDuplicateCandidate`: when true, a candidate ranked twice exhausts the ballot,
  otherwise the duplicate is ignored;
- `maxRankingsAllowed`: only the first ranks are read.

Names that are not declared are undeclared write-ins. They are combined into a single
candidate named `Undeclared Write-ins`, unless `excludeWriteIns` is set. Candidates marked
`excluded` are dropped from every ballot.

A ballot without any valid candidate and without an overvote is an undervote.

## Checks

After the count, the following totals are computed a second way, for every tabulation:
- the ballot total;
- the exhausted ballots, from the first and last rounds and from the transfers;
- the undervotes;
- the ballots ranking a single candidate, and several candidates.

Any difference is an error and no result is returned.

## Contest file

```text
{
  "outputSettings": { "contestName": "Mayor" },
  "candidates": [
    { "name": "Anna" },
    { "name": "Bob", "code": "B" },
    { "name": "Carl", "excluded": true }
  ],
  "rules": {
    "winnerElectionMode": "singleWinnerMajority",
    "tiebreakMode": "useCandidateOrder",
    "numberOfWinners": "1"
  },
  "ballots": [
    { "ranks": ["Anna", "Bob"] },
    { "ranks": ["Bob", ["Anna", "Bob"], ""], "weight": 2 },
    { "ranks": [], "weight": 0.5 }
  ]
}
```

Numbers in `rules` may be written as strings, following the RCTab configuration file.

 */
