use crate::rcv::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "contestDate")]
    pub contest_date: Option<String>,
    #[serde(rename = "contestJurisdiction")]
    pub contest_juridiction: Option<String>,
    #[serde(rename = "contestOffice")]
    pub contest_office: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub date: Option<String>,
    pub jurisdiction: Option<String>,
    pub office: Option<String>,
    pub variant: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvCandidate {
    pub name: String,
    pub code: Option<String>,
    pub excluded: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvRules {
    #[serde(rename = "tiebreakMode")]
    pub tiebreak_mode: Option<String>,
    #[serde(rename = "overvoteRule")]
    pub overvote_rule: Option<String>,
    #[serde(rename = "winnerElectionMode")]
    pub winner_election_mode: String,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<JSValue>,
    #[serde(rename = "numberOfWinners")]
    pub number_of_winners: Option<JSValue>,
    #[serde(rename = "multiSeatBottomsUpPercentageThreshold")]
    pub bottoms_up_percentage_threshold: Option<JSValue>,
    #[serde(rename = "multiWinnerRounds")]
    pub multi_winner_rounds: Option<bool>,
    #[serde(rename = "maxSkippedRanksAllowed")]
    pub max_skipped_ranks_allowed: Option<JSValue>,
    #[serde(rename = "maxRankingsAllowed")]
    pub max_rankings_allowed: Option<JSValue>,
    #[serde(rename = "rulesDescription")]
    pub rules_description: Option<String>,
    #[serde(rename = "exhaustOnDuplicateCandidate")]
    pub exhaust_on_duplicate_candidate: Option<bool>,
    #[serde(rename = "excludeWriteIns")]
    pub exclude_write_ins: Option<bool>,
}

/// One rank of a ballot: a single name, or all the names marked at that rank.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RcvRank {
    Single(String),
    Multiple(Vec<String>),
}

impl RcvRank {
    /// The distinct names of the rank, in order.
    pub fn names(&self) -> Vec<String> {
        match self {
            RcvRank::Single(s) => vec![s.clone()],
            RcvRank::Multiple(l) => {
                let mut names: Vec<String> = Vec::new();
                for s in l.iter() {
                    if !names.contains(s) {
                        names.push(s.clone());
                    }
                }
                names
            }
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvBallot {
    pub ranks: Vec<RcvRank>,
    pub weight: Option<JSValue>,
}

impl RcvBallot {
    pub fn weight(&self) -> RcvResult<Weight> {
        match &self.weight {
            None => Ok(Weight::one()),
            Some(JSValue::Number(n)) => n.to_string().parse::<Weight>().context(ParsingWeightSnafu {}),
            Some(JSValue::String(s)) => s.parse::<Weight>().context(ParsingWeightSnafu {}),
            Some(x) => whatever!("Cannot read the weight of a ballot: {:?}", x),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RcvConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub candidates: Vec<RcvCandidate>,
    pub rules: RcvRules,
    pub ballots: Vec<RcvBallot>,
}

pub fn read_config(path: &str) -> RcvResult<RcvConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: RcvConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> RcvResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    debug!("read content: {:?}", contents);
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Numbers in the rules may be written as strings.
pub fn read_js_int(x: &JSValue) -> RcvResult<u32> {
    match x {
        JSValue::Number(n) => n
            .as_u64()
            .and_then(|x| u32::try_from(x).ok())
            .context(ParsingJsonNumberSnafu {}),
        JSValue::String(s) => s.trim().parse::<u32>().ok().context(ParsingJsonNumberSnafu {}),
        _ => None.context(ParsingJsonNumberSnafu {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_and_weights() {
        let b: RcvBallot =
            serde_json::from_str(r#"{"ranks": ["A", ["B", "C", "B"], [], ""], "weight": 0.5}"#)
                .unwrap();
        assert_eq!(
            b.ranks.iter().map(|r| r.names()).collect::<Vec<_>>(),
            vec![
                vec!["A".to_string()],
                vec!["B".to_string(), "C".to_string()],
                vec![],
                vec!["".to_string()],
            ]
        );
        assert_eq!(b.weight().unwrap(), Weight::from_fraction(1, 2).unwrap());

        let b: RcvBallot = serde_json::from_str(r#"{"ranks": [], "weight": "1/3"}"#).unwrap();
        assert_eq!(b.weight().unwrap(), Weight::from_fraction(1, 3).unwrap());
        let b: RcvBallot = serde_json::from_str(r#"{"ranks": []}"#).unwrap();
        assert_eq!(b.weight().unwrap(), Weight::one());
    }

    #[test]
    fn numbers_as_strings() {
        assert_eq!(read_js_int(&serde_json::json!("3")).unwrap(), 3);
        assert_eq!(read_js_int(&serde_json::json!(4)).unwrap(), 4);
        assert!(read_js_int(&serde_json::json!("max")).is_err());
        assert!(read_js_int(&serde_json::json!(-1)).is_err());
    }
}
