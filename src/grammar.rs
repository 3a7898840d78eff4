//! Per-TLD WHOIS grammars
//!
//! Each registry formats its port-43 output differently. A grammar is a
//! list of labeled patterns plus an optional date format; several TLDs
//! share one grammar through aliases. Field order matters: date fields
//! become events in declaration order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::HashMap, sync::Arc};
use tracing::error;

/// What a pattern extracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Registrar,
    Status,
    Nameservers,
    CreationDate,
    UpdatedDate,
    ExpirationDate,
    /// Terminal: the registry does not know the name
    NotFound,
    /// Terminal: the registry refused to answer
    RateLimited,
}

impl Field {
    /// Collects every match rather than the first
    pub fn is_multi_value(&self) -> bool {
        matches!(self, Field::Status | Field::Nameservers)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Field::CreationDate | Field::UpdatedDate | Field::ExpirationDate)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Field::NotFound | Field::RateLimited)
    }
}

/// How a registry writes its dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `2020-05-10T12:00:00Z` and close relatives
    Iso8601,
    /// A chrono strftime pattern, matched as a prefix of the captured value
    Pattern(&'static str),
}

/// Declarative grammar entry
pub struct GrammarSpec {
    pub tld: &'static str,
    pub aliases: &'static [&'static str],
    pub date_format: Option<DateFormat>,
    pub fields: &'static [(Field, &'static str)],
}

use DateFormat::{Iso8601, Pattern};
use Field::*;

pub static GRAMMAR_TABLE: &[GrammarSpec] = &[
    GrammarSpec {
        tld: "com",
        aliases: &["net", "name"],
        date_format: None,
        fields: &[
            (Registrar, r"Registrar: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Expir\w+ Date: *(.+)"),
            (Status, r"Status:\s*(.+)\s*\n"),
            (NotFound, r"No match for "),
        ],
    },
    GrammarSpec {
        tld: "org",
        aliases: &["me", "mobi"],
        date_format: None,
        fields: &[
            (Registrar, r"Registrar: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Expir\w+ Date: *(.+)"),
            (Status, r"Status: *(.+)"),
            (NotFound, r"^(NOT FOUND|Domain not found)"),
        ],
    },
    GrammarSpec {
        tld: "info",
        aliases: &[],
        date_format: None,
        fields: &[
            (Registrar, r"Registrar: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Registrar Registration Expiration Date: *(.+)"),
            (Status, r"Status: *(.+)"),
            (NotFound, r"^(NOT FOUND|Domain not found)"),
        ],
    },
    GrammarSpec {
        tld: "co",
        aliases: &[],
        date_format: None,
        fields: &[
            (Registrar, r"Registrar: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Expir\w+ Date: *(.+)"),
            (Status, r"Status:\s*(.+)\s*\n"),
            (NotFound, r"No Data Found"),
        ],
    },
    GrammarSpec {
        tld: "au",
        aliases: &[],
        date_format: None,
        fields: &[
            (UpdatedDate, r"Last Modified: *(.+)"),
            (Registrar, r"Registrar Name: *(.+)"),
            (Status, r"Status: *(.+)"),
            (RateLimited, r"WHOIS LIMIT EXCEEDED"),
            (NotFound, r"^NOT FOUND"),
        ],
    },
    GrammarSpec {
        tld: "us",
        aliases: &["biz"],
        date_format: Some(Iso8601),
        fields: &[
            (Registrar, r"Registrar: *(.+)"),
            (Status, r"Domain Status: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Registrar Registration Expiration Date: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (NotFound, r"^No Data Found"),
            (Nameservers, r"Name Server: *(\S+)"),
        ],
    },
    GrammarSpec {
        tld: "ru",
        aliases: &["рф", "su"],
        date_format: None,
        fields: &[
            (Registrar, r"registrar: *(.+)"),
            (CreationDate, r"created: *(.+)"),
            (ExpirationDate, r"paid-till: *(.+)"),
            (Status, r"state: *(.+)"),
            (NotFound, r"No entries found"),
        ],
    },
    GrammarSpec {
        tld: "pt",
        aliases: &[],
        date_format: Some(Pattern("%d/%m/%Y")),
        fields: &[
            (Status, r"Domain Status: *(.+)"),
            (CreationDate, r"Creation Date\.*: *(\S+)"),
            (ExpirationDate, r"Expiration Date\.*: *(\S+)"),
            (Nameservers, r"Name Server: (\S+)"),
            (NotFound, r"No Match"),
            (RateLimited, r"maximum number of requests per second exceeded"),
        ],
    },
    GrammarSpec {
        tld: "jp",
        aliases: &[],
        date_format: Some(Pattern("%Y/%m/%d")),
        fields: &[
            (CreationDate, r"\[Registered Date\]\s*(.+)"),
            (UpdatedDate, r"\[Last Update\]\s?(.+)"),
            (Status, r"\[State\]\s*(.+)"),
            (NotFound, r"No match!!"),
        ],
    },
    GrammarSpec {
        tld: "pl",
        aliases: &[],
        date_format: Some(Pattern("%Y.%m.%d %H:%M:%S")),
        fields: &[
            (Registrar, r"REGISTRAR: *\s*(.+)"),
            (Status, r"Registration status:\n\s*(.+)"),
            (CreationDate, r"created: *(.+)"),
            (ExpirationDate, r"renewal date: *(.+)"),
            (UpdatedDate, r"last modified: *(.+)"),
            (NotFound, r"No information available about domain name"),
        ],
    },
    GrammarSpec {
        tld: "br",
        aliases: &[],
        date_format: Some(Pattern("%Y%m%d")),
        fields: &[
            (Status, r"status: *(.+)"),
            (CreationDate, r"created: *(.+)"),
            (ExpirationDate, r"expires: *(.+)"),
            (UpdatedDate, r"changed: *(.+)"),
            (NotFound, r"No match for "),
        ],
    },
    GrammarSpec {
        tld: "eu",
        aliases: &[],
        date_format: None,
        fields: &[
            (Registrar, r"Registrar: *\n *Name: *([^\n\r]+)"),
            (NotFound, r"Status: AVAILABLE"),
        ],
    },
    GrammarSpec {
        tld: "ee",
        aliases: &[],
        date_format: Some(Pattern("%Y-%m-%d")),
        fields: &[
            (Status, r"Domain: *[\n\r]+\s*name: *[^\n\r]+\sstatus: *([^\n\r]+)"),
            (
                CreationDate,
                r"Domain: *[\n\r]+\s*name: *[^\n\r]+\sstatus: *[^\n\r]+\sregistered: *([^\n\r]+)",
            ),
            (
                UpdatedDate,
                r"Domain: *[\n\r]+\s*name: *[^\n\r]+\sstatus: *[^\n\r]+\sregistered: *[^\n\r]+\schanged: *([^\n\r]+)",
            ),
            (
                ExpirationDate,
                r"Domain: *[\n\r]+\s*name: *[^\n\r]+\sstatus: *[^\n\r]+\sregistered: *[^\n\r]+\schanged: *[^\n\r]+\sexpire: *([^\n\r]+)",
            ),
            (Registrar, r"Registrar: *[\n\r]+\s*name: *([^\n\r]+)"),
            (NotFound, r"Domain not found"),
        ],
    },
    GrammarSpec {
        tld: "kr",
        aliases: &[],
        date_format: Some(Pattern("%Y. %m. %d.")),
        fields: &[
            (CreationDate, r"Registered Date\s*: *(.+)"),
            (UpdatedDate, r"Last Updated Date\s*: *(.+)"),
            (ExpirationDate, r"Expiration Date\s*: *(.+)"),
            (Registrar, r"Authorized Agency\s*: *(.+)"),
            (NotFound, r"The requested domain was not found "),
        ],
    },
    GrammarSpec {
        tld: "bg",
        aliases: &[],
        date_format: None,
        fields: &[
            (Status, r"registration status:\s*(.+)"),
            (NotFound, r"registration status: available"),
            (RateLimited, r"Query limit exceeded"),
        ],
    },
    GrammarSpec {
        tld: "de",
        aliases: &[],
        date_format: None,
        fields: &[
            (Status, r"Status: *(.+)"),
            (UpdatedDate, r"Changed: *(.+)"),
            (Nameservers, r"Nserver: (\S+)"),
            (NotFound, r"Status: *free"),
        ],
    },
    GrammarSpec {
        tld: "at",
        aliases: &[],
        date_format: Some(Pattern("%Y%m%d %H:%M:%S")),
        fields: &[
            (UpdatedDate, r"changed: *(.+)"),
            (Registrar, r"registrar: *(.+)"),
            (NotFound, r" nothing found"),
            (RateLimited, r"Quota exceeded"),
        ],
    },
    GrammarSpec {
        tld: "ca",
        aliases: &[],
        date_format: None,
        fields: &[
            (Status, r"Domain Status: *(.+)"),
            (UpdatedDate, r"Updated Date: *(.+)"),
            (CreationDate, r"Creation Date: *(.+)"),
            (ExpirationDate, r"Expiry Date: *(.+)"),
            (Registrar, r"Registrar: *(.+)"),
            (NotFound, r"Not found: "),
        ],
    },
    GrammarSpec {
        tld: "be",
        aliases: &[],
        date_format: Some(Pattern("%a %b %d %Y")),
        fields: &[
            (Registrar, r"Registrar: *[\n\r]+\s*Name:\s*(.+)"),
            (Status, r"Status:\s*(.+)"),
            (CreationDate, r"Registered: *(.+)"),
            (NotFound, r"Status:\s*AVAILABLE"),
        ],
    },
    GrammarSpec {
        tld: "kg",
        aliases: &[],
        date_format: Some(Pattern("%a %b %d %H:%M:%S %Y")),
        fields: &[
            (CreationDate, r"Record created:\s*(.+)"),
            (ExpirationDate, r"Record expires on:\s*(.+)"),
            (UpdatedDate, r"Record last updated on:\s*(.+)"),
            (NotFound, r"domain is available for registration"),
        ],
    },
    GrammarSpec {
        tld: "id",
        aliases: &[],
        date_format: Some(Pattern("%d-%b-%Y %H:%M:%S UTC")),
        fields: &[
            (CreationDate, r"Created On:(.+)"),
            (ExpirationDate, r"Expiration Date(.+)"),
            (UpdatedDate, r"Last Updated On(.+)"),
            (Registrar, r"Sponsoring Registrar Organization:(.+)"),
            (Status, r"Status:(.+)"),
            (NotFound, r"DOMAIN NOT FOUND"),
        ],
    },
    GrammarSpec {
        tld: "sk",
        aliases: &[],
        date_format: Some(Pattern("%Y-%m-%d")),
        fields: &[
            (CreationDate, r"Created:\s*(.+)"),
            (ExpirationDate, r"Valid Until:\s*(.+)"),
            (Status, r"EPP Status:\s*(.+)"),
            (UpdatedDate, r"Updated:\s*(.+)"),
            (Registrar, r"Registrar:\s*(.+)"),
            (NotFound, r"Domain not found"),
        ],
    },
    GrammarSpec {
        tld: "se",
        aliases: &["nu"],
        date_format: Some(Pattern("%Y-%m-%d")),
        fields: &[
            (CreationDate, r"created\.*: *(.+)"),
            (UpdatedDate, r"modified\.*: *(.+)"),
            (ExpirationDate, r"expires\.*: *(.+)"),
            (Status, r"status\.*: *(.+)"),
            (Registrar, r"registrar: *(.+)"),
            (Nameservers, r"nserver: *(\S+)"),
            (NotFound, r#"" not found."#),
        ],
    },
    GrammarSpec {
        tld: "is",
        aliases: &[],
        date_format: Some(Pattern("%b %d %Y")),
        fields: &[
            (CreationDate, r"created\.*: *(.+)"),
            (ExpirationDate, r"expires\.*: *(.+)"),
            (NotFound, r"No entries found for query"),
        ],
    },
    GrammarSpec {
        tld: "it",
        aliases: &[],
        date_format: Some(Pattern("%Y-%m-%d")),
        fields: &[
            (CreationDate, r"Created\.*: *(.+)"),
            (ExpirationDate, r"Expire Date\.*: *(.+)"),
            (UpdatedDate, r"Last Update: *(.+)"),
            (Status, r"Status:\s*(.+)\s*\n"),
            (NotFound, r"AVAILABLE"),
        ],
    },
];

/// Applied to TLDs without a bespoke entry, and only trusted when it
/// extracts a registrar or a date
pub static DEFAULT_GRAMMAR_SPEC: GrammarSpec = GrammarSpec {
    tld: "default",
    aliases: &[],
    date_format: Some(Iso8601),
    fields: &[
        (Registrar, r"Registrar: *(.+)"),
        (UpdatedDate, r"Updated Date: *(.+)"),
        (CreationDate, r"Creat(ed|ion) Date: *(.+)"),
        (ExpirationDate, r"Expir\w+ Date: *(.+)"),
        (Status, r"Status:\s*(.+)\s*\n"),
        (NotFound, r"(No match for |Domain not found|NOT FOUND\s)"),
    ],
};

/// A grammar with its patterns compiled
#[derive(Debug)]
pub struct Grammar {
    pub tld: &'static str,
    pub date_format: Option<DateFormat>,
    pub fields: Vec<(Field, Regex)>,
}

impl Grammar {
    fn compile(spec: &GrammarSpec) -> Self {
        let fields = spec
            .fields
            .iter()
            .filter_map(|(field, pattern)| match Regex::new(pattern) {
                Ok(regex) => Some((*field, regex)),
                Err(e) => {
                    error!("Skipping {:?} pattern for .{}: {}", field, spec.tld, e);
                    None
                }
            })
            .collect();

        Self {
            tld: spec.tld,
            date_format: spec.date_format,
            fields,
        }
    }

    pub fn pattern(&self, field: Field) -> Option<&Regex> {
        self.fields.iter().find(|(f, _)| *f == field).map(|(_, regex)| regex)
    }
}

static GRAMMARS: Lazy<HashMap<&'static str, Arc<Grammar>>> = Lazy::new(|| {
    let mut grammars = HashMap::new();
    for spec in GRAMMAR_TABLE {
        let grammar = Arc::new(Grammar::compile(spec));
        for alias in spec.aliases {
            grammars.insert(*alias, Arc::clone(&grammar));
        }
        grammars.insert(spec.tld, grammar);
    }
    grammars
});

static DEFAULT_GRAMMAR: Lazy<Grammar> = Lazy::new(|| Grammar::compile(&DEFAULT_GRAMMAR_SPEC));

/// Bespoke grammar for a final TLD label, aliases included
pub fn grammar_for(tld: &str) -> Option<&'static Grammar> {
    GRAMMARS.get(tld.to_lowercase().as_str()).map(|g| g.as_ref())
}

pub fn default_grammar() -> &'static Grammar {
    &DEFAULT_GRAMMAR
}

/// TLDs with a bespoke or aliased grammar, sorted
pub fn supported_tlds() -> Vec<&'static str> {
    let mut tlds: Vec<&'static str> = GRAMMARS.keys().copied().collect();
    tlds.sort_unstable();
    tlds
}
