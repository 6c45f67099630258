/*! Field extractors.

An [Extractor] describes which rows to select and what to hand to the extraction
function of a spider, [ExtractorRunner] does the rest.
!*/
mod extractor;
pub mod lower_court;
mod runner;
mod source;

pub use extractor::{
    ExtractionContext, ExtractionFn, ExtractionFunctions, Extractor, Row, Selection,
    SPIDER_COLUMN,
};
pub use lower_court::LowerCourtExtractor;
pub use runner::{ExtractionSummary, ExtractorRunner, SpiderSummary};
pub use source::DecisionSource;
