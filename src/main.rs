//! # scrc
//!
//! Enrichment of a court decision corpus split by language and chamber.
//!
//! ```sh
//! scrc 0.3.0
//! court decision corpus enrichment.
//!
//! USAGE:
//!     scrc <SUBCOMMAND>
//!
//! SUBCOMMANDS:
//!     help           Prints this message or the help of the given subcommand(s)
//!     lower-court    Extract lower courts from decision headers
//!     nlp            Run the NLP pipeline on every chamber partition
//! ```
//!
//! Every subcommand reads its settings from `config.ini` (see `--config`),
//! which can be overridden with `SCRC__<SECTION>__<KEY>` environment variables.
use structopt::StructOpt;

use scrc::alert::Alerter;
use scrc::config::Settings;
use scrc::error::Error;
use scrc::extractors::{lower_court, ExtractorRunner, LowerCourtExtractor};
use scrc::pipelines::{NlpPipeline, Pipeline};

#[macro_use]
extern crate log;

mod cli;

fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = cli::Scrc::from_args();
    debug!("cli args\n{:#?}", opt);

    match opt {
        cli::Scrc::Nlp(run) => {
            let settings = Settings::load(&run.config)?;
            let alerter = Alerter::new(&settings.alert);
            let summary = alerter.guard("nlp", || NlpPipeline::new(&settings).run())?;
            info!("{} chunks written", summary.chunks_written());
        }

        cli::Scrc::LowerCourt(run) => {
            let settings = Settings::load(&run.config)?;
            let alerter = Alerter::new(&settings.alert);
            let runner = ExtractorRunner::new(
                LowerCourtExtractor,
                lower_court::default_functions(),
                &settings,
            );
            let summary = alerter.guard("lower-court", || runner.run())?;
            info!(
                "extracted lower courts of {} spider(s), {} without extraction function",
                summary.spiders.len(),
                summary.skipped.len()
            );
        }
    };
    Ok(())
}
