use log::{trace, warn};

use crate::telemetry::{SampleStore, decode_text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub applied: usize,
    pub malformed: usize,
}

/// Applies event bodies delivered by a cloud event-stream client.
///
/// The client itself lives outside this crate; it hands each event body to
/// [`CloudBatchIngestor::on_event`]. A body may carry several records, one per
/// line, and the event wrapper may have escaped their quotes.
#[derive(Debug, Clone)]
pub struct CloudBatchIngestor {
    name: String,
    store: SampleStore,
}

impl CloudBatchIngestor {
    pub fn new(name: impl Into<String>, store: SampleStore) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn on_event(&self, body: &str) -> BatchReport {
        let body = body.replace("\\\"", "\"");
        let mut report = BatchReport::default();

        for line in body.trim().split('\n') {
            if line.trim().is_empty() {
                continue;
            }

            match decode_text(line) {
                Ok(sample) => {
                    trace!("[{}] {} <- {}", self.name, sample.key, sample.value);
                    self.store.insert(sample);
                    report.applied += 1;
                }
                Err(e) => {
                    warn!("[{}] Packet format error: {e} ({line})", self.name);
                    report.malformed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_escaped_batch() {
        let ingestor = CloudBatchIngestor::new("cloud", SampleStore::new());

        let body = r#"{\"key\": \"/joint/0\", \"value\": [1, 0, 0, 0]}
{\"key\": \"/joint/1\", \"value\": "#.to_string()
            + "\n"
            + r#"{\"key\": \"/joint/1\", \"value\": [0, 1, 0, 0]}"#;

        let report = ingestor.on_event(&body);

        assert_eq!(
            report,
            BatchReport {
                applied: 2,
                malformed: 1
            }
        );

        let store = ingestor.store();
        assert_eq!(*store.get("/joint/0").unwrap(), json!([1, 0, 0, 0]));
        assert_eq!(*store.get("/joint/1").unwrap(), json!([0, 1, 0, 0]));
    }

    #[test]
    fn test_plain_body() {
        let ingestor = CloudBatchIngestor::new("cloud", SampleStore::new());

        let report = ingestor.on_event("  {\"key\": \"/a\", \"value\": 1}\n\n");

        assert_eq!(
            report,
            BatchReport {
                applied: 1,
                malformed: 0
            }
        );
    }

    #[test]
    fn test_missing_key_in_batch() {
        let ingestor = CloudBatchIngestor::new("cloud", SampleStore::new());

        let report = ingestor.on_event("{\"value\": 1}\n{\"key\": \"/b\", \"value\": 2}");

        assert_eq!(report.applied, 1);
        assert_eq!(report.malformed, 1);
        assert!(ingestor.store().contains_key("/b"));
    }
}
