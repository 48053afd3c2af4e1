use chrono::{DateTime, Utc};
use serde::Serialize;

/// One result row: column name to value, in the order the columns were returned.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A timestamped record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub record: Record,
}

impl Event {
    pub fn new(time: DateTime<Utc>, record: Record) -> Self {
        Self { time, record }
    }
}

/// An ordered batch of events that is handed to a router in a single call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity) }
    }

    pub fn add(&mut self, time: DateTime<Utc>, record: Record) {
        self.events.push(Event::new(time, record));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl<'a> IntoIterator for &'a EventStream {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// The JSON line written for every event by the stdout router.
///
/// `{"tag":"pg_query","time":"2025-01-01T00:00:00Z","record":{...}}`
#[derive(Debug, Serialize)]
pub struct TaggedEvent<'a> {
    pub tag: &'a str,
    pub time: &'a DateTime<Utc>,
    pub record: &'a Record,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn stream_keeps_insertion_order() {
        let time = Utc::now();
        let mut stream = EventStream::new();
        stream.add(time, record(json!({ "a": 1 })));
        stream.add(time, record(json!({ "a": 2 })));

        let values: Vec<_> = stream.iter().map(|e| e.record["a"].clone()).collect();
        assert_eq!(values, vec![json!(1), json!(2)]);
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn record_keeps_column_order() {
        let mut row = Record::new();
        row.insert("z".to_string(), json!(1));
        row.insert("a".to_string(), json!(2));

        let line = serde_json::to_string(&row).unwrap();
        assert_eq!(line, r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn tagged_event_serializes_as_one_object() {
        let time = "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let row = record(json!({ "code": 500 }));
        let tagged = TaggedEvent { tag: "pg_query.errors", time: &time, record: &row };

        assert_eq!(
            serde_json::to_value(&tagged).unwrap(),
            json!({ "tag": "pg_query.errors", "time": "2025-01-01T00:00:00Z", "record": { "code": 500 } })
        );
    }
}
