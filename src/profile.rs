//! Person profiles: the employee asking for introductions and the candidate
//! colleagues they may be introduced to.

use serde::{Deserialize, Serialize};

/// A person-like entity fetched from the caller or the directory.
///
/// Profiles are read-only once fetched. The only mutation is
/// [`Profile::enrich`], which merges non-empty fields from a secondary lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Contact address (usually a work email) used for directory and
    /// messaging lookups.
    pub contact: Option<String>,
    /// Job title, e.g. "VP Engineering".
    pub role: String,
    /// Department or team.
    pub department: String,
    /// Free-text location, e.g. "Austin, TX".
    pub location: String,
    /// Cultural-heritage terms, e.g. `["korean", "irish"]`.
    pub cultural_heritage: Vec<String>,
    /// Age range as entered, e.g. "25-29" or "55+".
    pub age_range: Option<String>,
    /// Free-text gender identity.
    pub gender_identity: Option<String>,
}

impl Profile {
    /// Create a profile with the workplace fields set and everything else empty.
    pub fn new(name: &str, role: &str, department: &str, location: &str) -> Self {
        Self {
            name: name.to_owned(),
            role: role.to_owned(),
            department: department.to_owned(),
            location: location.to_owned(),
            ..Self::default()
        }
    }

    /// Merge fields from a directory record into this profile.
    ///
    /// A field from `other` only overrides when it is present and non-empty
    /// after trimming. The heritage list is replaced wholesale when `other`
    /// carries at least one non-blank term.
    pub fn enrich(&mut self, other: &Profile) {
        merge_text(&mut self.name, &other.name);
        merge_text(&mut self.role, &other.role);
        merge_text(&mut self.department, &other.department);
        merge_text(&mut self.location, &other.location);
        merge_optional(&mut self.contact, other.contact.as_deref());
        merge_optional(&mut self.age_range, other.age_range.as_deref());
        merge_optional(&mut self.gender_identity, other.gender_identity.as_deref());

        let heritage: Vec<String> = other
            .cultural_heritage
            .iter()
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_owned)
            .collect();
        if !heritage.is_empty() {
            self.cultural_heritage = heritage;
        }
    }

    /// The first comma-separated segment of the location, trimmed.
    ///
    /// `"Austin, TX"` yields `Some("Austin")`; a blank location yields `None`.
    pub fn primary_location(&self) -> Option<&str> {
        self.location
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Label used in logs and delivery reports: the contact if known, else the name.
    pub fn label(&self) -> &str {
        self.contact
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.name)
    }
}

fn merge_text(target: &mut String, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *target = value.to_owned();
    }
}

fn merge_optional(target: &mut Option<String>, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *target = Some(v.to_owned());
    }
}
