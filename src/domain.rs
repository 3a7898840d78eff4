use publicsuffix::{List, Psl};
use tracing::warn;

const MAX_DOMAIN_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;
const PRIVATE_SECTION_MARKER: &str = "===BEGIN PRIVATE DOMAINS===";

/// A fully-qualified name reduced to its registrable domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainParts {
    /// Public suffix plus one label, e.g. `bbc.co.uk`
    pub registrable: String,
    /// Public suffix, e.g. `co.uk`
    pub suffix: String,
}

impl DomainParts {
    /// Final dot-segment of the suffix
    pub fn tld(&self) -> &str {
        self.suffix.rsplit('.').next().unwrap_or(&self.suffix)
    }

    /// The suffix followed by each shorter parent suffix: `co.uk`, `uk`
    pub fn suffix_chain(&self) -> Vec<&str> {
        let mut chain = vec![self.suffix.as_str()];
        let mut rest = self.suffix.as_str();
        while let Some((_, parent)) = rest.split_once('.') {
            chain.push(parent);
            rest = parent;
        }
        chain
    }
}

/// Public suffix list used for registrable-domain reduction
pub struct SuffixList {
    list: List,
}

impl Default for SuffixList {
    fn default() -> Self {
        // Implicit "*" rule only: the last label is the suffix
        Self { list: List::new() }
    }
}

impl SuffixList {
    /// Builds the list from the ICANN section only. Private rules such as
    /// `github.io` are registrations, not registry zones.
    pub fn parse(text: &str) -> Result<Self, String> {
        let icann = match text.find(PRIVATE_SECTION_MARKER) {
            Some(idx) => &text[..text[..idx].rfind('\n').unwrap_or(0)],
            None => text,
        };
        let list: List = icann.parse().map_err(|e| format!("Invalid public suffix list: {:?}", e))?;
        Ok(Self { list })
    }

    /// Parses `text`, falling back to the implicit rule when it is unusable
    pub fn parse_or_default(text: Option<&str>) -> Self {
        match text.map(Self::parse) {
            Some(Ok(list)) => list,
            Some(Err(e)) => {
                warn!("{}, falling back to last-label suffixes", e);
                Self::default()
            }
            None => Self::default(),
        }
    }

    /// Reduces `name` (already lower-cased) to its registrable domain.
    /// Returns `None` when `name` is itself a public suffix.
    pub fn split(&self, name: &str) -> Option<DomainParts> {
        let domain = self.list.domain(name.as_bytes())?;
        let registrable = std::str::from_utf8(domain.as_bytes()).ok()?.to_string();
        let suffix = std::str::from_utf8(domain.suffix().as_bytes()).ok()?.to_string();
        Some(DomainParts { registrable, suffix })
    }
}

/// Lower-cased TLD without a leading dot
pub fn normalize_tld(tld: &str) -> String {
    tld.trim().trim_start_matches('.').to_lowercase()
}

/// Syntactic fully-qualified domain name check: at least two labels,
/// alphabetic (or punycode) TLD, no underscores, no trailing dot.
pub fn is_fqdn(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DOMAIN_LENGTH {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    let tld = labels[labels.len() - 1];
    if !is_valid_tld(tld) {
        return false;
    }

    labels.iter().all(|label| is_valid_label(label))
}

fn is_valid_tld(tld: &str) -> bool {
    let lower = tld.to_lowercase();
    if let Some(rest) = lower.strip_prefix("xn") {
        if rest.chars().count() >= 2 && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return true;
        }
    }
    tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic)
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.chars().count() > MAX_LABEL_LENGTH {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '-' || (!c.is_ascii() && c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_PSL: &str = "// ===BEGIN ICANN DOMAINS===\ncom\nuk\nco.uk\njp\nco.jp\n// ===END ICANN DOMAINS===\n";

    #[test]
    fn test_fqdn_validation() {
        assert!(is_fqdn("google.com"));
        assert!(is_fqdn("www.bbc.co.uk"));
        assert!(is_fqdn("xn--80ak6aa92e.xn--p1ai"));
        assert!(is_fqdn("пример.рф"));

        assert!(!is_fqdn("notadomain"));
        assert!(!is_fqdn("lololololol"));
        assert!(!is_fqdn("example.c"));
        assert!(!is_fqdn("example.123"));
        assert!(!is_fqdn("-bad.com"));
        assert!(!is_fqdn("bad_label.com"));
        assert!(!is_fqdn("double..dot.com"));
        assert!(!is_fqdn("trailing.com."));
        assert!(!is_fqdn(""));
    }

    #[test]
    fn test_split_with_multi_label_suffix() {
        let list = SuffixList::parse(FIXTURE_PSL).unwrap();

        let parts = list.split("news.bbc.co.uk").unwrap();
        assert_eq!(parts.registrable, "bbc.co.uk");
        assert_eq!(parts.suffix, "co.uk");
        assert_eq!(parts.tld(), "uk");
        assert_eq!(parts.suffix_chain(), vec!["co.uk", "uk"]);

        let parts = list.split("mail.google.com").unwrap();
        assert_eq!(parts.registrable, "google.com");
        assert_eq!(parts.suffix_chain(), vec!["com"]);
    }

    #[test]
    fn test_public_suffix_has_no_registrable_domain() {
        let list = SuffixList::parse(FIXTURE_PSL).unwrap();
        assert!(list.split("co.uk").is_none());
    }

    #[test]
    fn test_private_rules_are_ignored() {
        let psl = "// ===BEGIN ICANN DOMAINS===\nio\ncom\n// ===END ICANN DOMAINS===\n\
// ===BEGIN PRIVATE DOMAINS===\ngithub.io\nblogspot.com\n// ===END PRIVATE DOMAINS===\n";
        let list = SuffixList::parse(psl).unwrap();

        let parts = list.split("user.github.io").unwrap();
        assert_eq!(parts.registrable, "github.io");
        assert_eq!(parts.suffix, "io");
        assert_eq!(list.split("www.foo.blogspot.com").unwrap().registrable, "blogspot.com");
    }

    #[test]
    fn test_normalize_tld() {
        assert_eq!(normalize_tld(" .Legacy "), "legacy");
        assert_eq!(normalize_tld("com"), "com");
    }

    #[test]
    fn test_default_list_uses_last_label() {
        let list = SuffixList::parse_or_default(None);
        let parts = list.split("sub.example.org").unwrap();
        assert_eq!(parts.registrable, "example.org");
        assert_eq!(parts.suffix, "org");
    }
}
