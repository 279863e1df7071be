//! Free-text extraction for the housing dialogue: intent detection, location
//! extraction and preference parsing.

use regex::Regex;

/// Phrases that start a housing conversation (matched on word boundaries,
/// case-insensitive).
const HOUSING_INTENT: &[&str] = &[
    "relocate",
    "relocating",
    "relocation",
    "moving to",
    "move to",
    "housing",
    "apartment",
    "apartments",
    "where to live",
    "place to live",
    "places to live",
    "neighborhood",
    "neighborhoods",
    "neighbourhood",
    "rent",
    "renting",
    "find a home",
    "find a house",
];

/// Commands that clear the conversation and its memory. A reset must be the
/// whole message, optionally with "please" and a short object ("forget
/// everything"), so ordinary sentences using these words do not cancel.
const RESET_INTENT: &[&str] = &["clear", "reset", "start over", "forget"];

/// Objects allowed after a reset command.
const RESET_OBJECTS: &[&str] = &[
    "it",
    "that",
    "this",
    "me",
    "all",
    "everything",
    "the conversation",
    "our conversation",
    "my data",
];

/// Preference vocabulary recognised in free text.
const PREFERENCE_TERMS: &[&str] = &[
    "quiet",
    "nightlife",
    "walkable",
    "family",
    "parks",
    "outdoors",
    "hiking",
    "beach",
    "coffee",
    "food",
    "restaurants",
    "music",
    "arts",
    "museums",
    "shopping",
    "transit",
    "affordable",
    "luxury",
    "pets",
    "gym",
];

/// Known cities, lowercase. Checked in order after the regex patterns fail.
const GAZETTEER: &[&str] = &[
    "san francisco",
    "new york",
    "los angeles",
    "san diego",
    "san jose",
    "salt lake city",
    "washington",
    "philadelphia",
    "chicago",
    "austin",
    "seattle",
    "boston",
    "denver",
    "miami",
    "atlanta",
    "portland",
    "nashville",
    "dallas",
    "houston",
    "phoenix",
    "oakland",
    "brooklyn",
    "london",
    "toronto",
    "vancouver",
    "berlin",
    "paris",
    "dublin",
    "amsterdam",
    "singapore",
    "sydney",
    "tokyo",
];

/// Words that look like place names to the patterns but are not.
const NOT_PLACES: &[&str] = &["I", "The", "A", "An", "My", "Our", "We"];

/// Month, weekday and season names, which follow "in" as often as cities do.
const CALENDAR_WORDS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
    "Spring",
    "Summer",
    "Fall",
    "Autumn",
    "Winter",
];

/// Values parsed from a preferences answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPreferences {
    /// Age range as written, e.g. `25-29` or `55+`.
    pub age_range: Option<String>,
    /// Gender word, if one was given.
    pub gender: Option<String>,
    /// Recognised preference terms in text order.
    pub preferences: Vec<String>,
}

/// Compiled extraction patterns.
#[derive(Debug, Clone)]
pub struct Extractor {
    housing: Vec<Regex>,
    reset: Option<Regex>,
    location_patterns: Vec<Regex>,
    age: Option<Regex>,
    gender: Option<Regex>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Compile every pattern.
    pub fn new() -> Self {
        // Capitalized words: "Denver", "Salt Lake City".
        let place = r"[A-Z][A-Za-z.'-]*(?:\s+[A-Z][A-Za-z.'-]*)*";
        let location_patterns = [
            format!(r"\b({place},\s*[A-Z]{{2}})\b"),
            format!(r"\b(?:to|To|into)\s+({place})"),
            format!(r"\b(?:in|In|near|Near)\s+({place})"),
        ];

        Self {
            housing: word_patterns(HOUSING_INTENT),
            reset: reset_pattern(),
            location_patterns: location_patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            age: Regex::new(r"\b(\d{2})\s*(?:-|–|to)\s*(\d{2})\b|\b(\d{2})\s*\+").ok(),
            gender: Regex::new(r"(?i)\b(male|female|man|woman|non-binary|nonbinary)\b").ok(),
        }
    }

    /// Whether text expresses a housing or relocation intent.
    pub fn is_housing_intent(&self, text: &str) -> bool {
        self.housing.iter().any(|r| r.is_match(text))
    }

    /// Whether the whole message is a command to clear the conversation.
    pub fn is_reset_intent(&self, text: &str) -> bool {
        self.reset.as_ref().is_some_and(|r| r.is_match(text.trim()))
    }

    /// Extract a location: ordered regex patterns first, then the gazetteer.
    pub fn location(&self, text: &str) -> Option<String> {
        for pattern in &self.location_patterns {
            for caps in pattern.captures_iter(text) {
                let Some(found) = caps.get(1) else {
                    continue;
                };
                let candidate = found.as_str().trim().trim_end_matches('.');
                if !candidate.is_empty() && !is_excluded(candidate) {
                    return Some(candidate.to_owned());
                }
            }
        }

        let lower = text.to_lowercase();
        GAZETTEER
            .iter()
            .find(|city| contains_word(&lower, city))
            .map(|city| title_case(city))
    }

    /// Parse an age range, gender word and preference terms from text.
    pub fn preferences(&self, text: &str) -> ParsedPreferences {
        let age_range = self.age.as_ref().and_then(|r| r.captures(text)).and_then(|c| {
            match (c.get(1), c.get(2), c.get(3)) {
                (Some(lo), Some(hi), _) => Some(format!("{}-{}", lo.as_str(), hi.as_str())),
                (_, _, Some(lo)) => Some(format!("{}+", lo.as_str())),
                _ => None,
            }
        });
        let gender = self
            .gender
            .as_ref()
            .and_then(|r| r.captures(text))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());

        let lower = text.to_lowercase();
        let mut hits: Vec<(usize, &str)> = PREFERENCE_TERMS
            .iter()
            .filter_map(|term| find_word(&lower, term).map(|pos| (pos, *term)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        ParsedPreferences {
            age_range,
            gender,
            preferences: hits.into_iter().map(|(_, t)| t.to_owned()).collect(),
        }
    }
}

/// Every word of the capture is a pronoun, article or calendar word.
fn is_excluded(candidate: &str) -> bool {
    candidate
        .split_whitespace()
        .all(|word| NOT_PLACES.contains(&word) || CALENDAR_WORDS.contains(&word))
}

fn alternation(phrases: &[&str]) -> String {
    phrases
        .iter()
        .map(|p| regex::escape(p).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

fn reset_pattern() -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)^(?:please\s+)?(?:{})(?:\s+(?:{}))?(?:,?\s+please)?[\s.!]*$",
        alternation(RESET_INTENT),
        alternation(RESET_OBJECTS),
    ))
    .ok()
}

fn word_patterns(phrases: &[&str]) -> Vec<Regex> {
    phrases
        .iter()
        .filter_map(|p| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(p))).ok())
        .collect()
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    Regex::new(&format!(r"\b{}\b", regex::escape(word)))
        .ok()
        .and_then(|r| r.find(haystack))
        .map(|m| m.start())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    find_word(haystack, word).is_some()
}

/// `"salt lake city"` → `"Salt Lake City"`.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
