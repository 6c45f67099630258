/*! Lower court extraction.

Finds the court whose decision was appealed from the header of a decision, e.g.

```text
Beschwerde gegen das Urteil des Obergerichts des Kantons Zürich vom 3. Mai 2020
recours contre l'arrêt de la Cour de justice du canton de Genève du 12 mars 2021
ricorso contro la sentenza del Tribunale d'appello del Cantone Ticino del 5 maggio 2021
```

and stores it as `{"court": "<name>"}`.
!*/
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};

use super::extractor::{ExtractionContext, ExtractionFunctions, Extractor, Row, Selection};

/// Column holding the header of a decision.
pub const HEADER_COLUMN: &str = "header";

lazy_static! {
    static ref DE: Regex = Regex::new(
        r"(?i)gegen (?:den Entscheid|das Urteil|den Beschluss|die Verfügung) (?:des|der) (?P<court>[^,;.\n(]+)"
    )
    .unwrap();
    static ref FR: Regex = Regex::new(
        r"(?i)contre (?:l['’]arrêt|le jugement|la décision|l['’]ordonnance) (?:du |de la |de l['’]|des )(?P<court>[^,;.\n(]+)"
    )
    .unwrap();
    static ref IT: Regex = Regex::new(
        r"(?i)contro (?:la sentenza|la decisione|il giudizio|l['’]ordinanza) (?:del |della |dello |dell['’])(?P<court>[^,;.\n(]+)"
    )
    .unwrap();
    static ref DATE: Regex = Regex::new(r"\s+(?:vom|du|del|dell['’])\s*\d").unwrap();
}

/// Spiders handled by [default_functions].
pub const DEFAULT_SPIDERS: [&str; 3] = ["CH_BGer", "CH_BVGer", "CH_BStGer"];

pub struct LowerCourtExtractor;

impl Extractor for LowerCourtExtractor {
    fn col_name(&self) -> &str {
        "lower_court"
    }

    fn selection(&self, spider: &str, _lang: &str) -> Selection {
        Selection::new(spider).non_empty(HEADER_COLUMN)
    }

    fn required_data<'a>(&self, row: &Row<'a>) -> Option<&'a str> {
        row.str(HEADER_COLUMN)
    }

    fn check_condition_before_process(
        &self,
        _spider: &str,
        data: Option<&str>,
        _ctx: &ExtractionContext,
    ) -> bool {
        data.map_or(false, |header| !header.trim().is_empty())
    }
}

fn patterns(lang: &str) -> Vec<&'static Regex> {
    match lang {
        "de" => vec![&*DE],
        "fr" => vec![&*FR],
        "it" => vec![&*IT],
        _ => vec![&*DE, &*FR, &*IT],
    }
}

/// Name of the lower court mentioned in `header`, if any.
pub fn find_lower_court(header: &str, lang: &str) -> Option<String> {
    let court = patterns(lang)
        .into_iter()
        .find_map(|re| re.captures(header))?
        .name("court")?
        .as_str();

    let court = match DATE.find(court) {
        Some(date) => &court[..date.start()],
        None => court,
    };
    let court = court.trim();

    if court.is_empty() {
        None
    } else {
        Some(court.to_string())
    }
}

pub fn extract_lower_court(header: &str, ctx: &ExtractionContext) -> Option<Value> {
    find_lower_court(header, ctx.lang).map(|court| json!({ "court": court }))
}

/// Extraction functions of the federal courts.
pub fn default_functions() -> ExtractionFunctions {
    DEFAULT_SPIDERS
        .iter()
        .fold(ExtractionFunctions::new(), |functions, spider| {
            functions.with(spider, extract_lower_court)
        })
}
