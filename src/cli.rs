//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "scrc", about = "court decision corpus enrichment.")]
/// Holds every command that is callable by the `scrc` command.
pub enum Scrc {
    #[structopt(about = "Run the NLP pipeline on every chamber partition")]
    Nlp(Run),
    #[structopt(about = "Extract lower courts from decision headers")]
    LowerCourt(Run),
}

#[derive(Debug, StructOpt)]
pub struct Run {
    #[structopt(
        parse(from_os_str),
        long = "config",
        short = "c",
        default_value = "config.ini",
        help = "configuration file"
    )]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_path() {
        match Scrc::from_iter(&["scrc", "nlp"]) {
            Scrc::Nlp(run) => assert_eq!(run.config, PathBuf::from("config.ini")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn explicit_config_path() {
        match Scrc::from_iter(&["scrc", "lower-court", "--config", "/etc/scrc.ini"]) {
            Scrc::LowerCourt(run) => assert_eq!(run.config, PathBuf::from("/etc/scrc.ini")),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
