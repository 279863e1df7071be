//! Prompt templates and their templated fallbacks.
//!
//! Every prompt here has a matching fallback function so a failed generation
//! call still produces user-facing text.

use crate::profile::Profile;

/// System prompt shared by all generation calls.
pub const SYSTEM_PROMPT: &str = "You are a warm, concise workplace connector. \
You help colleagues discover what they have in common and help new hires settle \
into a city. Never invent facts that are not in the context you are given.";

/// Build the prompt for a one-sentence connection insight.
pub fn insight_prompt(
    employee: &Profile,
    candidate: &Profile,
    workplace: &[String],
    taste: &[String],
) -> String {
    format!(
        "Write ONE friendly sentence explaining why {} ({}) and {} ({}) should connect.\n\n\
         Workplace commonalities:\n{}\n\nTaste commonalities:\n{}\n\n\
         Reply with the sentence only.",
        employee.name,
        employee.role,
        candidate.name,
        candidate.role,
        bullet_list(workplace),
        bullet_list(taste),
    )
}

/// Fallback insight when generation fails.
pub fn fallback_insight(workplace: &[String]) -> String {
    match workplace.first() {
        Some(first) => format!(
            "You already share some common ground ({}), which makes for an easy first conversation.",
            first.to_lowercase()
        ),
        None => "You work at the same company and might enjoy getting to know each other."
            .to_owned(),
    }
}

/// Build the prompt for an introduction message sent to a candidate.
pub fn introduction_prompt(
    employee: &Profile,
    candidate: &Profile,
    commonalities: &[String],
    insight: &str,
) -> String {
    format!(
        "Write a short, friendly message (max 3 sentences) introducing {} ({}, {}) to {}.\n\
         Mention at most two of these commonalities:\n{}\n\nContext: {}\n\n\
         Reply with the message only.",
        employee.name,
        employee.role,
        employee.department,
        candidate.name,
        bullet_list(commonalities),
        insight,
    )
}

/// Fallback introduction message when generation fails.
pub fn fallback_introduction(
    employee: &Profile,
    candidate: &Profile,
    commonalities: &[String],
) -> String {
    let mut text = format!(
        "Hi {}! Meet {}, {} in {}.",
        candidate.name, employee.name, employee.role, employee.department
    );
    let shared: Vec<&str> = commonalities.iter().take(2).map(String::as_str).collect();
    if !shared.is_empty() {
        text.push_str(&format!(" A few things you have in common: {}.", shared.join("; ")));
    }
    text.push_str(" Say hello!");
    text
}

/// Build the prompt for a housing recommendation reply.
pub fn housing_prompt(location: &str, preferences: &[String], places: &[String]) -> String {
    format!(
        "Someone is relocating to {location}. Their preferences: {}.\n\
         These places scored highest for them:\n{}\n\n\
         Write a short, friendly reply (max 5 sentences) suggesting where to look first.",
        if preferences.is_empty() {
            "none given".to_owned()
        } else {
            preferences.join(", ")
        },
        bullet_list(places),
    )
}

/// Fallback housing reply when generation fails but places are known.
pub fn fallback_housing(location: &str, places: &[String]) -> String {
    if places.is_empty() {
        return degraded_housing(location);
    }
    let listed: Vec<&str> = places.iter().take(5).map(String::as_str).collect();
    format!(
        "Here are some spots in {location} worth exploring as you look for a place: {}.",
        listed.join(", ")
    )
}

/// Reply used when the housing pipeline fails outright.
pub fn degraded_housing(location: &str) -> String {
    format!(
        "Sorry, I couldn't pull personalized recommendations right now. In the meantime, \
         local neighborhood guides for {location} are a good place to start."
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_owned();
    }
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
