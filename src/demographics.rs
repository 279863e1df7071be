//! Fixed demographic tables used to bias taste-graph recommendations.
//!
//! The knowledge graph accepts a small closed set of age buckets and two
//! gender values. Free-text profile fields are mapped onto them here.

use serde::{Deserialize, Serialize};

/// Age bucket understood by the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBucket {
    /// `24_and_younger`.
    TwentyFourAndYounger,
    /// `35_and_younger`.
    ThirtyFiveAndYounger,
    /// `36_to_55`.
    ThirtySixToFiftyFive,
    /// `55_and_older`.
    FiftyFiveAndOlder,
}

impl AgeBucket {
    /// Wire value sent as `signal.demographics.age`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwentyFourAndYounger => "24_and_younger",
            Self::ThirtyFiveAndYounger => "35_and_younger",
            Self::ThirtySixToFiftyFive => "36_to_55",
            Self::FiftyFiveAndOlder => "55_and_older",
        }
    }

    /// Parse a wire value back into a bucket.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24_and_younger" => Some(Self::TwentyFourAndYounger),
            "35_and_younger" => Some(Self::ThirtyFiveAndYounger),
            "36_to_55" => Some(Self::ThirtySixToFiftyFive),
            "55_and_older" => Some(Self::FiftyFiveAndOlder),
            _ => None,
        }
    }
}

/// Gender value understood by the knowledge graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// `male`.
    Male,
    /// `female`.
    Female,
}

impl Gender {
    /// Wire value sent as `signal.demographics.gender`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

/// Map a profile age range like `"25-29"` onto an [`AgeBucket`].
///
/// En and em dashes are accepted in place of `-`. Unknown ranges map to `None`
/// so no age bias is sent.
pub fn map_age_range(range: &str) -> Option<AgeBucket> {
    let normalized: String = range
        .trim()
        .chars()
        .map(|c| if c == '\u{2013}' || c == '\u{2014}' { '-' } else { c })
        .filter(|c| !c.is_whitespace())
        .collect();

    match normalized.as_str() {
        "20-24" | "18-24" => Some(AgeBucket::TwentyFourAndYounger),
        "25-29" | "30-34" => Some(AgeBucket::ThirtyFiveAndYounger),
        "35-39" | "40-44" | "45-49" | "50-54" => Some(AgeBucket::ThirtySixToFiftyFive),
        "55+" | "55-59" | "60-64" | "60+" | "65+" => Some(AgeBucket::FiftyFiveAndOlder),
        _ => None,
    }
}

/// Map a free-text gender identity onto the two-valued [`Gender`] table.
///
/// Exact matches win, then substrings. The female substrings are checked
/// first because `"woman"` and `"female"` contain `"man"` and `"male"`.
/// Anything unrecognised, including `"non-binary"`, maps to [`Gender::Female`].
pub fn map_gender(identity: &str) -> Gender {
    let lower = identity.trim().to_lowercase();
    match lower.as_str() {
        "male" | "man" => return Gender::Male,
        "female" | "woman" => return Gender::Female,
        _ => {}
    }
    if lower.contains("woman") || lower.contains("female") {
        return Gender::Female;
    }
    if lower.contains("man") || lower.contains("male") {
        return Gender::Male;
    }
    Gender::Female
}
