//! Domain, email and name normalization shared by the mapper, the cache and
//! contact completion.

use std::sync::OnceLock;

use regex::Regex;

/// Hosts that identify a social profile, never a company.
pub const SOCIAL_HOSTS: &[&str] = &[
    "linkedin.com",
    "lnkd.in",
    "facebook.com",
    "fb.com",
    "twitter.com",
    "x.com",
    "t.co",
    "instagram.com",
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "pinterest.com",
    "threads.net",
    "angel.co",
    "wellfound.com",
    "crunchbase.com",
];

/// Consumer mailbox providers. A company is never identified by these.
pub const PUBLIC_EMAIL_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "ymail.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.net",
    "mail.com",
    "yandex.com",
    "zoho.com",
];

fn hostname_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*\.[a-z]{2,24}$")
            .expect("hostname regex")
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+'\-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
            .expect("email regex")
    })
}

// ---------------------------------------------------------------------------
// Domains
// ---------------------------------------------------------------------------

/// Why a candidate value was not accepted as a company domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainRejection {
    Empty,
    Malformed,
    EmailAddress,
    SocialHost,
    PublicEmailProvider,
}

impl DomainRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainRejection::Empty => "empty",
            DomainRejection::Malformed => "malformed",
            DomainRejection::EmailAddress => "email_address",
            DomainRejection::SocialHost => "social_host",
            DomainRejection::PublicEmailProvider => "public_email_provider",
        }
    }
}

/// Reduce a URL or host to a bare lowercase host.
///
/// Strips scheme, `www.`, userinfo-free path/query/fragment and port.
/// Returns `None` for anything that doesn't look like a hostname afterwards.
pub fn normalize_domain(input: &str) -> Option<String> {
    let mut s = input.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if let Some(idx) = s.find("://") {
        s = s[idx + 3..].to_string();
    } else if let Some(rest) = s.strip_prefix("//") {
        s = rest.to_string();
    }
    if let Some(end) = s.find(['/', '?', '#']) {
        s.truncate(end);
    }
    if let Some(colon) = s.find(':') {
        s.truncate(colon);
    }
    while let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    let s = s.trim_end_matches('.').to_string();
    if hostname_re().is_match(&s) {
        Some(s)
    } else {
        None
    }
}

fn host_in(domain: &str, list: &[&str]) -> bool {
    list.iter()
        .any(|h| domain == *h || domain.ends_with(&format!(".{h}")))
}

pub fn is_social_host(domain: &str) -> bool {
    host_in(domain, SOCIAL_HOSTS)
}

pub fn is_public_email_provider(domain: &str) -> bool {
    host_in(domain, PUBLIC_EMAIL_PROVIDERS)
}

/// Normalize and validate a company-domain candidate.
pub fn company_domain(input: &str) -> Result<String, DomainRejection> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DomainRejection::Empty);
    }
    if !trimmed.contains("://") && trimmed.contains('@') {
        return Err(DomainRejection::EmailAddress);
    }
    let domain = normalize_domain(trimmed).ok_or(DomainRejection::Malformed)?;
    if is_social_host(&domain) {
        return Err(DomainRejection::SocialHost);
    }
    if is_public_email_provider(&domain) {
        return Err(DomainRejection::PublicEmailProvider);
    }
    Ok(domain)
}

/// True for values with a scheme or a `www.` prefix.
pub fn looks_like_url(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
}

// ---------------------------------------------------------------------------
// Emails
// ---------------------------------------------------------------------------

pub fn is_valid_email(s: &str) -> bool {
    let s = s.trim();
    !s.is_empty() && s.len() <= 254 && email_re().is_match(s)
}

pub fn normalize_email(s: &str) -> String {
    s.trim().trim_start_matches("mailto:").to_lowercase()
}

pub fn email_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, d)| d)
}

/// Append `candidate` unless an address equal ignoring ASCII case is present.
pub fn push_unique_email(emails: &mut Vec<String>, candidate: &str) -> bool {
    if emails.iter().any(|e| e.eq_ignore_ascii_case(candidate)) {
        return false;
    }
    emails.push(candidate.to_string());
    true
}

// ---------------------------------------------------------------------------
// Names, titles, LinkedIn
// ---------------------------------------------------------------------------

/// Lowercase, drop punctuation, collapse whitespace. Used for cache keys.
pub fn normalize_key_text(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a full name into (first, last). Single tokens have no last name.
pub fn split_full_name(full: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = full.split_whitespace().collect();
    match tokens.as_slice() {
        [] => (None, None),
        [only] => (Some((*only).to_string()), None),
        [first, rest @ ..] => (Some((*first).to_string()), Some(rest.join(" "))),
    }
}

/// Profile slug of a LinkedIn person URL (`/in/<slug>` or `/pub/<slug>`).
pub fn linkedin_profile_slug(url: &str) -> Option<String> {
    let lower = url.trim().to_lowercase();
    if !lower.contains("linkedin.com") {
        return None;
    }
    let start = ["/in/", "/pub/"]
        .iter()
        .find_map(|marker| lower.find(marker).map(|i| i + marker.len()))?;
    let rest = &lower[start..];
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let slug = rest[..end].trim();
    if slug.is_empty() {
        None
    } else {
        Some(slug.to_string())
    }
}

pub fn is_linkedin_company_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("linkedin.com/company/") || lower.contains("linkedin.com/school/")
}
