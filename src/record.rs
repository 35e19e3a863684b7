use chrono::{DateTime, Local, SecondsFormat};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const TIMESTAMP_FIELD: &str = "timestamp";

/// One scraped listing: field values in rule order plus the moment the
/// values were extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, String)>,
    timestamp: DateTime<Local>,
}

/// Records of one extraction pass, in document order.
pub type Batch = Vec<Record>;

impl Record {
    pub fn new(fields: Vec<(String, String)>, timestamp: DateTime<Local>) -> Self {
        Self { fields, timestamp }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn timestamp_string(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    /// Column name/value pairs as written by the sinks, `timestamp` last.
    pub fn entries(&self) -> Vec<(&str, String)> {
        self.fields()
            .map(|(k, v)| (k, v.to_string()))
            .chain(std::iter::once((TIMESTAMP_FIELD, self.timestamp_string())))
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp_string())?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> Record {
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        Record::new(
            vec![
                ("name".into(), "Bitcoin".into()),
                ("price".into(), "$64,000".into()),
            ],
            ts,
        )
    }

    #[test]
    fn lookup_by_field_name() {
        let r = record();
        assert_eq!(r.get("name"), Some("Bitcoin"));
        assert_eq!(r.get("symbol"), None);
    }

    #[test]
    fn serializes_flat_in_rule_order_with_timestamp_last() {
        let json = serde_json::to_string(&record()).unwrap();
        assert!(json.starts_with(r#"{"name":"Bitcoin","price":"$64,000","timestamp":"2024-05-01T12:30:00.000000"#));
    }
}
