use ipnet::IpNet;
use std::{fmt, net::IpAddr, str::FromStr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeParseError(pub String);

impl fmt::Display for RangeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid range: {}", self.0)
    }
}

impl std::error::Error for RangeParseError {}

/// Parses a bootstrap CIDR block such as `192.0.2.0/24` or `2001:db8::/32`.
/// A bare address is taken as a single-host block.
pub fn parse_network(s: &str) -> Result<IpNet, RangeParseError> {
    let s = s.trim();
    s.parse::<IpNet>()
        .or_else(|_| s.parse::<IpAddr>().map(IpNet::from))
        .map(|net| net.trunc())
        .map_err(|_| RangeParseError(s.to_string()))
}

/// Inclusive autonomous-system number range, written `start-end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsnRange {
    pub start: u32,
    pub end: u32,
}

impl AsnRange {
    pub fn contains(&self, asn: u32) -> bool {
        self.start <= asn && asn <= self.end
    }
}

impl FromStr for AsnRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parse = |v: &str| v.trim().parse::<u32>().map_err(|_| RangeParseError(s.to_string()));

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => {
                let single = parse(s)?;
                (single, single)
            }
        };

        if start > end {
            return Err(RangeParseError(s.to_string()));
        }
        Ok(Self { start, end })
    }
}
