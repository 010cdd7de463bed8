use log::{debug, info, warn};

use rcv_engine::builder::Builder;
use rcv_engine::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::rcv::config_reader::*;

pub mod config_reader;

#[derive(Debug, Snafu)]
pub enum RcvError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a positive number"))]
    ParsingJsonNumber {},
    #[snafu(display("Error reading a ballot weight"))]
    ParsingWeight { source: ParseWeightError },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Tabulation failed: {source}"))]
    Tabulation { source: TabulationError },
    #[snafu(display("Could not read the results: {source}"))]
    Query { source: QueryError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type RcvResult<T> = Result<T, RcvError>;

fn threshold_to_json(threshold: &WinThreshold) -> JSValue {
    match threshold {
        WinThreshold::Fixed(w) => json!(w.to_string()),
        WinThreshold::Dynamic => json!("dynamic"),
        WinThreshold::NotApplicable => json!("n/a"),
    }
}

fn tabulation_to_json(results: &RcvResults, tabulation: u32) -> RcvResult<JSValue> {
    let outcomes = results.candidate_outcomes(tabulation).context(QuerySnafu)?;
    let mut rounds: Vec<JSValue> = Vec::new();
    for round in 1..=results.n_rounds(tabulation).context(QuerySnafu)? {
        let (names, tallies) = results
            .round_tally(round, tabulation, true, true)
            .context(QuerySnafu)?;
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for (name, count) in names.iter().zip(tallies.iter()) {
            tally.insert(name.clone(), json!(count.to_string()));
        }

        let mut tally_results: Vec<JSValue> = Vec::new();
        for o in outcomes.iter().filter(|o| o.round_elected == Some(round)) {
            tally_results.push(json!({ "elected": o.name }));
        }
        for o in outcomes.iter().filter(|o| o.round_eliminated == Some(round)) {
            tally_results.push(json!({ "eliminated": o.name }));
        }

        // Only the weight that actually moved.
        let mut transfers: JSMap<String, JSValue> = JSMap::new();
        if let TransferSummary::Flows(flows) =
            results.round_transfer(round, tabulation).context(QuerySnafu)?
        {
            for (name, w) in flows.iter().filter(|(_, w)| !w.is_zero()) {
                transfers.insert(name.clone(), json!(w.to_string()));
            }
        }

        rounds.push(json!({
            "round": round,
            "tally": tally,
            "tallyResults": tally_results,
            "transfers": transfers
        }));
    }
    let threshold = results.win_threshold(tabulation).context(QuerySnafu)?;
    Ok(json!({
        "tabulation": tabulation,
        "threshold": threshold_to_json(threshold),
        "rounds": rounds
    }))
}

fn build_summary_js(config: &RcvConfig, results: &RcvResults) -> RcvResult<JSValue> {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        jurisdiction: config.output_settings.contest_juridiction.clone(),
        office: config.output_settings.contest_office.clone(),
        variant: results.variant_name().to_string(),
    };
    let mut tabulations: Vec<JSValue> = Vec::new();
    for tabulation in 1..=results.n_tabulations() {
        tabulations.push(tabulation_to_json(results, tabulation)?);
    }
    Ok(json!({
        "config": c,
        "results": tabulations,
        "winners": results.winners()
    }))
}

fn validate_rules(rcv_rules: &RcvRules) -> RcvResult<VoteRules> {
    let number_of_winners = match &rcv_rules.number_of_winners {
        Some(x) => read_js_int(x)?,
        None => 1,
    };
    let res = VoteRules {
        tiebreak_mode: match rcv_rules.tiebreak_mode.as_deref() {
            None | Some("alphabetical") => TieBreakMode::Alphabetical,
            Some("useCandidateOrder") => TieBreakMode::UseCandidateOrder,
            Some("random") => {
                let seed = match &rcv_rules.random_seed {
                    Some(x) => read_js_int(x)?,
                    None => {
                        whatever!("Tiebreak mode random requires a randomSeed")
                    }
                };
                TieBreakMode::Random(seed)
            }
            Some(x) => {
                whatever!("Cannot use tiebreak mode {:?}: currently not implemented", x)
            }
        },
        overvote_rule: match rcv_rules.overvote_rule.as_deref() {
            None | Some("alwaysSkipToNextRank") => OverVoteRule::AlwaysSkipToNextRank,
            Some("exhaustImmediately") => OverVoteRule::ExhaustImmediately,
            Some(x) => {
                whatever!("Cannot use overvote rule {:?}: currently not implemented", x)
            }
        },
        winner_election_mode: match rcv_rules.winner_election_mode.as_str() {
            "singleWinnerMajority" => WinnerElectionMode::SingleWinnerMajority,
            "multiPassIrv" => WinnerElectionMode::Sequential,
            "bottomsUp" => WinnerElectionMode::BottomsUp,
            "bottomsUpUsingPercentageThreshold" => {
                let p = match &rcv_rules.bottoms_up_percentage_threshold {
                    Some(x) => read_js_int(x)?,
                    None => {
                        whatever!("bottomsUpUsingPercentageThreshold requires multiSeatBottomsUpPercentageThreshold")
                    }
                };
                WinnerElectionMode::BottomsUpPercentage(p)
            }
            "multiWinnerFractionalThreshold" => WinnerElectionMode::FractionalStv,
            "continueUntilTwoCandidatesRemain" => WinnerElectionMode::UntilTwo,
            x => {
                whatever!("Cannot use election mode {:?}: currently not implemented", x)
            }
        },
        number_of_winners,
        multi_winner_rounds: rcv_rules.multi_winner_rounds.unwrap_or(false),
        max_skipped_rank_allowed: match &rcv_rules.max_skipped_ranks_allowed {
            None => MaxSkippedRank::Unlimited,
            Some(JSValue::String(s)) if s == "unlimited" => MaxSkippedRank::Unlimited,
            Some(x) => match read_js_int(x)? {
                0 => MaxSkippedRank::ExhaustOnFirstOccurence,
                n => MaxSkippedRank::MaxAllowed(n),
            },
        },
        max_rankings_allowed: match &rcv_rules.max_rankings_allowed {
            None => None,
            Some(JSValue::String(s)) if s == "max" => None,
            Some(x) => match read_js_int(x)? {
                0 => {
                    whatever!("maxRankingsAllowed must be positive")
                }
                n => Some(n),
            },
        },
        duplicate_candidate_mode: match rcv_rules.exhaust_on_duplicate_candidate {
            Some(true) => DuplicateCandidateMode::Exhaust,
            _ => DuplicateCandidateMode::SkipDuplicate,
        },
        write_in_mode: match rcv_rules.exclude_write_ins {
            Some(true) => WriteInMode::Exclude,
            _ => WriteInMode::Combine,
        },
    };
    Ok(res)
}

fn build_contest(config: &RcvConfig) -> RcvResult<Contest> {
    let rules = validate_rules(&config.rules)?;
    debug!("build_contest: rules: {:?}", rules);

    let candidates: Vec<Candidate> = config
        .candidates
        .iter()
        .map(|c| Candidate {
            name: c.name.clone(),
            code: match c.code.clone() {
                Some(x) if x.is_empty() => None,
                x => x,
            },
            excluded: c.excluded.unwrap_or(false),
        })
        .collect();

    let mut builder = Builder::new(&rules)
        .context(TabulationSnafu)?
        .candidate_list(candidates)
        .context(TabulationSnafu)?;
    for b in config.ballots.iter() {
        let ranks: Vec<Vec<String>> = b.ranks.iter().map(|r| r.names()).collect();
        builder
            .add_weighted_vote(&ranks, b.weight()?)
            .context(TabulationSnafu)?;
    }
    Ok(builder.build(&config.output_settings.contest_name))
}

fn write_summary(pretty_js_stats: &str, out: Option<String>) -> RcvResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty_js_stats);
        }
        Some(path) => {
            info!("Writing the summary to {}", path);
            fs::write(path, pretty_js_stats).context(WritingOutputSnafu { path })?;
        }
    }
    Ok(())
}

pub fn run_election(
    contest_path: &str,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> RcvResult<()> {
    let config = read_config(contest_path)?;
    info!(
        "config: {:?}, {} ballots",
        config.output_settings,
        config.ballots.len()
    );

    let contest = build_contest(&config)?;
    let results = tabulate(&contest).context(TabulationSnafu)?;
    info!("winners: {:?}", results.winners());

    // Assemble the final json
    let result_js = build_summary_js(&config, &results)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_summary(&pretty_js_stats, out)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}
