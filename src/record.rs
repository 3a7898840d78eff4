use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conformance markers on every WHOIS-derived record. The last entry
/// distinguishes these from native RDAP responses.
pub const WHOIS_CONFORMANCE: [&str; 4] = [
    "rdap_level_0",
    "icann_rdap_technical_implementation_guide_0",
    "icann_rdap_response_profile_0",
    "rdap_cloud_whois_1",
];

pub const WHOIS_NOTICE_TITLE: &str = "WHOIS-derived response";
pub const WHOIS_NOTICE_DESCRIPTION: &str =
    "This response is derived from WHOIS data and mapped into an RDAP-like structure.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    #[serde(rename = "type")]
    pub notice_type: String,
    pub description: Vec<String>,
}

impl Notice {
    pub fn whois_derived() -> Self {
        Self {
            title: WHOIS_NOTICE_TITLE.to_string(),
            notice_type: "result set".to_string(),
            description: vec![WHOIS_NOTICE_DESCRIPTION.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nameserver {
    pub object_class_name: String,
    pub ldh_name: String,
}

impl Nameserver {
    pub fn new(name: &str) -> Self {
        Self {
            object_class_name: "nameserver".to_string(),
            ldh_name: name.trim().to_uppercase(),
        }
    }
}

/// RDAP event actions produced from WHOIS date fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventAction {
    #[serde(rename = "registration")]
    Registration,
    #[serde(rename = "last changed")]
    LastChanged,
    #[serde(rename = "expiration")]
    Expiration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_action: EventAction,
    /// ISO-8601, UTC, millisecond precision
    pub event_date: String,
}

/// RDAP-shaped domain object assembled from WHOIS text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoisRecord {
    pub object_class_name: String,
    pub ldh_name: String,
    pub rdap_conformance: Vec<String>,
    pub notices: Vec<Notice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registrar: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nameservers: Vec<Nameserver>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

impl WhoisRecord {
    pub fn new(domain: &str) -> Self {
        Self {
            object_class_name: "domain".to_string(),
            ldh_name: domain.to_uppercase(),
            rdap_conformance: WHOIS_CONFORMANCE.iter().map(|c| c.to_string()).collect(),
            notices: vec![Notice::whois_derived()],
            registrar: None,
            status: Vec::new(),
            nameservers: Vec::new(),
            events: Vec::new(),
        }
    }
}

/// Normalized lookup payload, tagged by provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "record", rename_all = "lowercase")]
pub enum LookupData {
    /// Registry JSON passed through unmodified
    Rdap(Value),
    Whois(WhoisRecord),
}

impl LookupData {
    pub fn is_whois(&self) -> bool {
        matches!(self, LookupData::Whois(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_whois_record_shape() {
        let mut record = WhoisRecord::new("example.com");
        record.nameservers.push(Nameserver::new(" ns1.example.com "));
        record.events.push(Event {
            event_action: EventAction::LastChanged,
            event_date: "2021-05-10T12:00:00.000Z".into(),
        });

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["objectClassName"], "domain");
        assert_eq!(value["ldhName"], "EXAMPLE.COM");
        assert_eq!(value["rdapConformance"][3], "rdap_cloud_whois_1");
        assert_eq!(value["notices"][0]["type"], "result set");
        assert_eq!(value["nameservers"][0], json!({"objectClassName": "nameserver", "ldhName": "NS1.EXAMPLE.COM"}));
        assert_eq!(value["events"][0]["eventAction"], "last changed");
        assert!(value.get("registrar").is_none());
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_lookup_data_is_tagged() {
        let data = LookupData::Rdap(json!({"objectClassName": "autnum"}));
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["source"], "rdap");
        assert_eq!(value["record"]["objectClassName"], "autnum");

        let data = LookupData::Whois(WhoisRecord::new("example.de"));
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["source"], "whois");

        let back: LookupData = serde_json::from_value(value).unwrap();
        assert!(back.is_whois());
    }
}
