//! Command line interface.

use argh::FromArgs;
use rsmcheck_check::ExpansionHeuristic;
use std::path::PathBuf;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// Check a recursive state machine against CTL properties.
pub struct Opts {
    /// input .rsm file
    #[argh(positional)]
    pub rsm_file: PathBuf,

    /// input .ctl file
    #[argh(positional)]
    pub ctl_file: PathBuf,

    /// use the exhaustive checking approach
    #[argh(switch)]
    pub exhaustive: bool,

    /// expansion heuristic for lazy checking (getnext | random | all).
    /// getnext searches for a single box and enables faster cycle
    /// detection; random picks a contextualisable box at random; all
    /// contextualises every contextualisable box
    #[argh(option, default = "ExpansionHeuristic::GetNext")]
    pub expansion_heuristic: ExpansionHeuristic,

    /// randomize nondeterministic choices in the getnext expansion when
    /// deciding in which operand or successor to continue the search
    #[argh(switch)]
    pub randomize_nondeterminism: bool,

    /// maximal amount of MB before memout (default: 0 = no limit)
    #[argh(option, default = "0")]
    pub maxmem: u64,

    /// maximal time in minutes before timeout (default: 0 = no limit)
    #[argh(option, default = "0")]
    pub maxtime: u64,

    /// logfile name
    #[argh(option, default = "PathBuf::from(\"log.log\")")]
    pub logfile: PathBuf,

    /// overwrite the existing logging file
    #[argh(switch)]
    pub overwrite: bool,
}
