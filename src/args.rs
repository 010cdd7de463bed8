use clap::Parser;

/// This is a tabulation program for ranked-choice contests.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the contest: candidates, rules and ballots.
    /// For more information about the file format, read the manual of the rcv_engine crate.
    #[clap(short, long, value_parser)]
    pub contest: String,

    /// (file path) A reference file containing the outcome of the contest in JSON format. If provided,
    /// rcvcrunch will check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the contest will be written in JSON
    /// format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
