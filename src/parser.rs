use crate::{
    grammar::{self, DateFormat, Field, Grammar},
    record::{Event, EventAction, Nameserver, WhoisRecord},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;
use tracing::debug;

/// Responses this short cannot be real registry data
const MIN_RESPONSE_LENGTH: usize = 10;

/// Expected ways a WHOIS response fails to yield a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No Whois data received")]
    NoData,

    #[error("Bad WHOIS Data: \"{0}\"")]
    Malformed(String),

    #[error("We were unable to complete the lookup as the server appears to be rate limiting queries")]
    RateLimited,

    #[error("{0} does not appear to be a registered domain name, IP address or ASN")]
    NotFound(String),

    #[error(
        "{0} is not supported by RDAP. This may be because the domain belongs to a ccTLD, or the gTLD has not deployed RDAP"
    )]
    UnsupportedTld(String),
}

impl ParseError {
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::NoData => "no-data",
            ParseError::Malformed(_) => "malformed",
            ParseError::RateLimited => "rate-limited",
            ParseError::NotFound(_) => "not-found",
            ParseError::UnsupportedTld(_) => "unsupported-tld",
        }
    }
}

fn event_action(field: Field) -> Option<EventAction> {
    match field {
        Field::CreationDate => Some(EventAction::Registration),
        Field::UpdatedDate => Some(EventAction::LastChanged),
        Field::ExpirationDate => Some(EventAction::Expiration),
        _ => None,
    }
}

fn final_label(domain: &str) -> Option<&str> {
    let (_, tld) = domain.rsplit_once('.')?;
    if tld.is_empty() {
        None
    } else {
        Some(tld)
    }
}

/// Maps WHOIS text onto the RDAP domain shape using per-TLD grammars
#[derive(Debug, Default, Clone, Copy)]
pub struct WhoisParser;

impl WhoisParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str, domain: &str) -> Result<WhoisRecord, ParseError> {
        if raw.chars().count() <= MIN_RESPONSE_LENGTH {
            return Err(ParseError::Malformed(raw.to_string()));
        }

        if raw.trim().is_empty() {
            return Err(ParseError::NoData);
        }

        let tld = final_label(domain).ok_or_else(|| ParseError::UnsupportedTld(domain.to_string()))?;
        let (grammar, bespoke) = match grammar::grammar_for(tld) {
            Some(grammar) => (grammar, true),
            None => (grammar::default_grammar(), false),
        };
        debug!("Parsing WHOIS for {} with .{} grammar", domain, grammar.tld);

        if grammar.pattern(Field::RateLimited).is_some_and(|re| re.is_match(raw)) {
            return Err(ParseError::RateLimited);
        }

        if grammar.pattern(Field::NotFound).is_some_and(|re| re.is_match(raw)) {
            return Err(ParseError::NotFound(domain.to_string()));
        }

        let record = extract(grammar, raw, domain);

        // Guessing with the default grammar is only trusted when it found something
        if !bespoke && record.registrar.is_none() && record.events.is_empty() {
            return Err(ParseError::UnsupportedTld(domain.to_string()));
        }

        Ok(record)
    }
}

fn extract(grammar: &Grammar, raw: &str, domain: &str) -> WhoisRecord {
    let mut record = WhoisRecord::new(domain);

    for (field, regex) in &grammar.fields {
        if field.is_terminal() {
            continue;
        }

        if field.is_multi_value() {
            let values = regex
                .captures_iter(raw)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .filter(|v| !v.is_empty());

            for value in values {
                match field {
                    Field::Nameservers => record.nameservers.push(Nameserver::new(value)),
                    _ => record.status.push(value.to_string()),
                }
            }
            continue;
        }

        let Some(caps) = regex.captures(raw) else {
            continue;
        };
        let Some(value) = caps.get(caps.len() - 1).map(|m| m.as_str().trim()) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }

        if let Some(action) = event_action(*field) {
            match parse_event_date(value, grammar.date_format) {
                Some(event_date) => record.events.push(Event {
                    event_action: action,
                    event_date,
                }),
                None => debug!("Skipping unparseable {:?} value {:?} for {}", field, value, domain),
            }
            continue;
        }

        if *field == Field::Registrar {
            record.registrar = Some(value.to_string());
        }
    }

    record
}

/// Parses a WHOIS date and renders it as ISO-8601 UTC with milliseconds.
/// Returns `None` rather than an invalid timestamp.
pub fn parse_event_date(value: &str, format: Option<DateFormat>) -> Option<String> {
    let value = value.trim();
    let parsed = match format {
        Some(DateFormat::Iso8601) => parse_iso8601(value),
        Some(DateFormat::Pattern(pattern)) => parse_with_pattern(value, pattern),
        None => parse_freeform(value),
    }?;
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok((naive, _)) = NaiveDateTime::parse_and_remainder(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_and_remainder(value, "%Y-%m-%d")
        .ok()
        .and_then(|(date, _)| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Registry formats are matched as a prefix; trailing annotations are ignored
fn parse_with_pattern(value: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok((dt, _)) = DateTime::parse_and_remainder(value, pattern) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok((naive, _)) = NaiveDateTime::parse_and_remainder(value, pattern) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_and_remainder(value, pattern)
        .ok()
        .and_then(|(date, _)| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_freeform(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    // Common whois date formats to try
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.fZ",  // 2025-05-18T13:36:06.0Z
        "%Y-%m-%dT%H:%M:%S%.f%z", // 2025-05-18T13:36:06+0000
        "%Y-%m-%d %H:%M:%S%.f",   // 2025-05-18 13:36:06
        "%Y.%m.%d %H:%M:%S",      // 2025.05.18 13:36:06
        "%d-%b-%Y %H:%M:%S",      // 18-May-2025 13:36:06
    ];

    for format in &formats {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    // Date only, midnight UTC
    let date_only_formats = ["%Y-%m-%d", "%d-%b-%Y", "%d %b %Y", "%Y/%m/%d", "%d.%m.%Y", "%Y.%m.%d"];

    for format in &date_only_formats {
        if let Ok((date, _)) = NaiveDate::parse_and_remainder(value, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Some(naive.and_utc());
            }
        }
    }

    None
}
