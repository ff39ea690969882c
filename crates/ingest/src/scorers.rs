//! Pure per-category scorers.
//!
//! Each scorer looks at a path and up to a handful of sampled values and
//! returns `0.0..=100.0`. Value-shape signals carry [`VALUE_WEIGHT`], path-name
//! signals [`PATH_WEIGHT`]; category-specific penalties are subtracted before
//! clamping. Frequency weighting happens in the discoverer, not here.

use routegrid_core::normalize::{
    is_public_email_provider, is_social_host, is_valid_email, linkedin_profile_slug,
    looks_like_url, normalize_domain,
};
use serde::{Deserialize, Serialize};

pub const VALUE_WEIGHT: f64 = 70.0;
pub const PATH_WEIGHT: f64 = 30.0;

/// The semantic categories a path can be scored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    Email,
    Domain,
    Website,
    CompanyName,
    PersonName,
    Title,
    LinkedinUrl,
    Phone,
}

impl FieldCategory {
    pub const ALL: [FieldCategory; 8] = [
        FieldCategory::Email,
        FieldCategory::Domain,
        FieldCategory::Website,
        FieldCategory::CompanyName,
        FieldCategory::PersonName,
        FieldCategory::Title,
        FieldCategory::LinkedinUrl,
        FieldCategory::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::Email => "email",
            FieldCategory::Domain => "domain",
            FieldCategory::Website => "website",
            FieldCategory::CompanyName => "company_name",
            FieldCategory::PersonName => "person_name",
            FieldCategory::Title => "title",
            FieldCategory::LinkedinUrl => "linkedin_url",
            FieldCategory::Phone => "phone",
        }
    }

    /// Dispatch to the category's scorer.
    pub fn score(&self, path: &str, samples: &[String]) -> f64 {
        match self {
            FieldCategory::Email => score_email(path, samples),
            FieldCategory::Domain => score_domain(path, samples),
            FieldCategory::Website => score_website(path, samples),
            FieldCategory::CompanyName => score_company_name(path, samples),
            FieldCategory::PersonName => score_person_name(path, samples),
            FieldCategory::Title => score_title(path, samples),
            FieldCategory::LinkedinUrl => score_linkedin_url(path, samples),
            FieldCategory::Phone => score_phone(path, samples),
        }
    }
}

impl std::fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

const CORPORATE_SUFFIXES: &[&str] = &[
    "inc", "inc.", "llc", "l.l.c.", "ltd", "ltd.", "limited", "corp", "corp.", "corporation",
    "co", "co.", "company", "gmbh", "plc", "lp", "llp", "sa", "ag", "bv", "group", "holdings",
    "partners", "labs", "technologies",
];

const TITLE_WORDS: &[&str] = &[
    "ceo", "cto", "cfo", "coo", "cmo", "cro", "founder", "co-founder", "cofounder", "owner",
    "president", "chief", "head", "director", "vp", "vice", "manager", "lead", "partner",
    "principal", "officer", "recruiter", "engineer", "analyst", "consultant", "associate",
    "specialist", "coordinator", "executive", "advisor",
];

fn lower(path: &str) -> String {
    path.to_lowercase()
}

/// Last key of a rendered path (`$.a.b[]` → `b`), lowercased.
fn leaf(path: &str) -> String {
    let p = lower(path);
    let last = p.rsplit('.').next().unwrap_or("");
    last.trim_end_matches("[]").to_string()
}

fn fraction(samples: &[String], pred: impl Fn(&str) -> bool) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().filter(|s| pred(s)).count() as f64 / samples.len() as f64
}

fn combine(value_signal: f64, path_signal: f64, penalty: f64) -> f64 {
    (value_signal * VALUE_WEIGHT + path_signal * PATH_WEIGHT - penalty).clamp(0.0, 100.0)
}

fn has_corporate_suffix(s: &str) -> bool {
    s.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .last()
        .map(|t| CORPORATE_SUFFIXES.contains(&t))
        .unwrap_or(false)
}

fn is_plain_text(s: &str) -> bool {
    !s.contains('@')
        && !looks_like_url(s)
        && s.len() <= 120
        && s.chars().any(|c| c.is_alphabetic())
}

fn is_bare_host(s: &str) -> bool {
    !s.contains('/') && !s.contains('@') && !s.contains(' ') && normalize_domain(s).is_some()
}

// ---------------------------------------------------------------------------
// Scorers
// ---------------------------------------------------------------------------

pub fn score_email(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, is_valid_email);
    let name = leaf(path);
    let path_signal = if name.contains("email") || name == "mail" || name.ends_with("_mail") {
        1.0
    } else if lower(path).contains("email") {
        0.6
    } else {
        0.0
    };
    combine(value, path_signal, 0.0)
}

pub fn score_domain(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, is_bare_host);
    let name = leaf(path);
    let path_signal = if name.contains("domain") {
        1.0
    } else if name == "host" || name == "hostname" {
        0.7
    } else {
        0.0
    };
    let junk = fraction(samples, |s| {
        normalize_domain(s)
            .map(|d| is_social_host(&d) || is_public_email_provider(&d))
            .unwrap_or(false)
    });
    let mut penalty = junk * 60.0;
    if ["linkedin", "facebook", "twitter", "instagram"].iter().any(|s| name.contains(s)) {
        penalty += 40.0;
    }
    combine(value, path_signal, penalty)
}

pub fn score_website(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, |s| looks_like_url(s) && normalize_domain(s).is_some())
        .max(fraction(samples, is_bare_host) * 0.5);
    let name = leaf(path);
    let path_signal = if name.contains("website") || name.contains("homepage") || name == "site" {
        1.0
    } else if name.contains("url") {
        0.6
    } else {
        0.0
    };
    let social = fraction(samples, |s| {
        normalize_domain(s).map(|d| is_social_host(&d)).unwrap_or(false)
    });
    let mut penalty = social * 60.0;
    if ["linkedin", "twitter", "facebook", "logo", "image", "avatar", "photo", "apply"]
        .iter()
        .any(|s| name.contains(s))
    {
        penalty += 40.0;
    }
    combine(value, path_signal, penalty)
}

pub fn score_company_name(path: &str, samples: &[String]) -> f64 {
    let text = fraction(samples, is_plain_text);
    let suffix = fraction(samples, has_corporate_suffix);
    let value = text * 0.4 + suffix * 0.6;
    let name = leaf(path);
    let full = lower(path);
    let path_signal = if ["company", "organization", "organisation", "employer", "business", "firm"]
        .iter()
        .any(|s| name.contains(s))
        || name == "org"
        || name == "org_name"
    {
        1.0
    } else if name == "name" && (full.contains("company") || full.contains("org")) {
        1.0
    } else if name == "name" {
        0.3
    } else {
        0.0
    };
    let mut penalty = 0.0;
    if ["first", "last", "full", "person", "contact", "title", "user", "url", "domain", "email", "id"]
        .iter()
        .any(|s| name.contains(s))
    {
        penalty += 40.0;
    }
    combine(value, path_signal, penalty)
}

pub fn score_person_name(path: &str, samples: &[String]) -> f64 {
    let shape = fraction(samples, |s| {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        (1..=4).contains(&tokens.len())
            && tokens.iter().all(|t| {
                t.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
                    && t.chars().all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.'))
            })
    });
    let name = leaf(path);
    let full = lower(path);
    let path_signal = if ["full_name", "fullname", "person_name", "contact_name", "first", "last"]
        .iter()
        .any(|s| name.contains(s))
    {
        1.0
    } else if name == "name" && (full.contains("person") || full.contains("contact") || full.contains("people")) {
        1.0
    } else if name == "name" {
        0.4
    } else {
        0.0
    };
    let mut penalty = fraction(samples, has_corporate_suffix) * 50.0;
    if [
        "company", "org", "employer", "business", "title", "file", "user_name", "username",
        "industry", "sector", "category", "type", "status", "city", "country", "location",
        "state", "tag", "skill",
    ]
    .iter()
    .any(|s| name.contains(s))
    {
        penalty += 40.0;
    }
    combine(shape * 0.7, path_signal, penalty)
}

pub fn score_title(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, |s| {
        s.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .any(|t| TITLE_WORDS.contains(&t))
    });
    let name = leaf(path);
    let path_signal = if ["title", "position", "role", "headline", "designation"]
        .iter()
        .any(|s| name.contains(s))
    {
        1.0
    } else {
        0.0
    };
    let mut penalty = fraction(samples, |s| s.len() > 100) * 40.0;
    if ["page", "meta", "seo", "subtitle"].iter().any(|s| name.contains(s)) {
        penalty += 40.0;
    }
    combine(value, path_signal, penalty)
}

pub fn score_linkedin_url(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, |s| {
        linkedin_profile_slug(s).is_some() || s.to_lowercase().contains("linkedin.com/company/")
    });
    let name = leaf(path);
    let path_signal = if name.contains("linkedin") {
        1.0
    } else if name.contains("profile") && name.contains("url") {
        0.4
    } else {
        0.0
    };
    combine(value, path_signal, 0.0)
}

pub fn score_phone(path: &str, samples: &[String]) -> f64 {
    let value = fraction(samples, |s| {
        let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
        (7..=15).contains(&digits)
            && s.chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '(' | ')' | '-' | '.'))
    });
    let name = leaf(path);
    let path_signal = if ["phone", "tel", "mobile", "cell"].iter().any(|s| name.contains(s)) {
        1.0
    } else {
        0.0
    };
    let mut penalty = 0.0;
    if ["id", "zip", "postal", "year", "count", "salary", "revenue", "employees", "date", "time"]
        .iter()
        .any(|s| name.contains(s))
    {
        penalty += 40.0;
    }
    combine(value, path_signal, penalty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn email_value_beats_path() {
        let by_value = score_email("$.contact", &s(&["a@acme.com", "b@acme.com"]));
        let by_path = score_email("$.email", &s(&["n/a"]));
        assert!(by_value > by_path);
        assert_eq!(score_email("$.email", &s(&["a@acme.com"])), 100.0);
    }

    #[test]
    fn domain_penalizes_social_hosts() {
        let clean = score_domain("$.domain", &s(&["acme.com", "globex.io"]));
        let social = score_domain("$.domain", &s(&["linkedin.com", "facebook.com"]));
        assert_eq!(clean, 100.0);
        assert!(social < 50.0);
    }

    #[test]
    fn domain_scorer_rejects_public_providers() {
        let score = score_domain("$.company_domain", &s(&["gmail.com"]));
        assert!(score <= 40.0, "got {score}");
    }

    #[test]
    fn website_prefers_url_shapes() {
        let url = score_website("$.website", &s(&["https://acme.com", "http://www.globex.io/about"]));
        let bare = score_website("$.website", &s(&["acme.com"]));
        let li = score_website("$.linkedin_url", &s(&["https://linkedin.com/in/ada"]));
        assert!(url > bare);
        assert!(li < 30.0);
    }

    #[test]
    fn company_name_vs_person_name() {
        let company = s(&["Acme Inc", "Globex LLC"]);
        let person = s(&["Ada Lovelace", "Grace Hopper"]);
        assert!(score_company_name("$.company_name", &company) > score_person_name("$.company_name", &company));
        assert!(score_person_name("$.full_name", &person) > score_company_name("$.full_name", &person));
    }

    #[test]
    fn title_keywords() {
        assert!(score_title("$.title", &s(&["VP of Sales", "Head of Talent"])) > 90.0);
        assert!(score_title("$.meta_title", &s(&["Acme | Home"])) < 10.0);
    }

    #[test]
    fn linkedin_and_phone() {
        assert_eq!(score_linkedin_url("$.li", &s(&["https://www.linkedin.com/in/ada"])), 70.0);
        assert!(score_phone("$.phone", &s(&["+1 (415) 555-0100"])) > 99.0);
        assert!(score_phone("$.employee_count", &s(&["1200000"])) < 40.0);
    }

    #[test]
    fn scores_are_bounded() {
        for cat in FieldCategory::ALL {
            let v = cat.score("$.x", &[]);
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
