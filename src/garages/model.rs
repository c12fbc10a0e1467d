//! Snapshot body, upstream normalization, and the demo data set.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const UPDATED_AT: &str = "updatedAt";
const GARAGES: &str = "garages";

/// Garage availability at a point in time: `{updatedAt, garages, ..}`.
///
/// The body is held as the JSON object it will be served as. Upstream
/// records, unknown top-level keys, number formatting, and key order all
/// survive untouched, so the served bytes (and their ETag) are exactly what
/// the upstream sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// A `{updatedAt, garages}` body built locally.
    pub fn new(updated_at: impl Into<Value>, garages: Vec<Value>) -> Self {
        let mut body = Map::new();
        body.insert(UPDATED_AT.to_owned(), updated_at.into());
        body.insert(GARAGES.to_owned(), Value::Array(garages));
        Self(body)
    }

    pub fn updated_at(&self) -> Option<&Value> {
        self.0.get(UPDATED_AT)
    }

    /// The garage records, or nothing when `garages` is not a list.
    pub fn garages(&self) -> &[Value] {
        self.0
            .get(GARAGES)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One demo garage.
#[derive(Debug, Clone, Copy)]
pub struct Garage {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub capacity: u32,
    pub free: u32,
    pub address: &'static str,
}

impl From<&Garage> for Value {
    fn from(garage: &Garage) -> Self {
        json!({
            "id": garage.id,
            "name": garage.name,
            "lat": garage.lat,
            "lng": garage.lng,
            "capacity": garage.capacity,
            "free": garage.free,
            "address": garage.address,
            "type": "garage",
        })
    }
}

/// Central Belgrade garages served when no upstream is configured.
pub const DEMO_GARAGES: [Garage; 4] = [
    Garage {
        id: "obilicev-venac",
        name: "Obilićev venac",
        lat: 44.81725,
        lng: 20.45593,
        capacity: 804,
        free: 42,
        address: "Obilićev venac 14-16",
    },
    Garage {
        id: "masarikova",
        name: "Masarikova",
        lat: 44.80771,
        lng: 20.46202,
        capacity: 457,
        free: 18,
        address: "Masarikova 4",
    },
    Garage {
        id: "zeleni-venac",
        name: "Zeleni venac",
        lat: 44.81484,
        lng: 20.45527,
        capacity: 320,
        free: 5,
        address: "Brankova 4",
    },
    Garage {
        id: "pinki",
        name: "Pinki (Novi Beograd)",
        lat: 44.82120,
        lng: 20.39720,
        capacity: 150,
        free: 27,
        address: "Bul. Zorana Đinđića 12",
    },
];

/// `updatedAt` stamp for snapshots built here: RFC 3339, UTC, milliseconds.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The demo data set, stamped now.
pub fn demo_snapshot() -> Snapshot {
    Snapshot::new(timestamp(Utc::now()), DEMO_GARAGES.iter().map(Value::from).collect())
}

/// Turns whatever the upstream returned into a [`Snapshot`].
pub fn normalize(raw: Value) -> Snapshot {
    normalize_at(raw, Utc::now())
}

/// [`normalize`] with an explicit "now".
///
/// - An object with truthy `updatedAt` and `garages` is kept as-is.
/// - A bare array becomes `garages`, element for element, stamped `now`.
/// - Anything else becomes an empty `garages`, stamped `now`.
pub fn normalize_at(raw: Value, now: DateTime<Utc>) -> Snapshot {
    match raw {
        Value::Object(body) if is_truthy(body.get(UPDATED_AT)) && is_truthy(body.get(GARAGES)) => {
            Snapshot(body)
        }
        Value::Array(items) => Snapshot::new(timestamp(now), items),
        _ => Snapshot::new(timestamp(now), Vec::new()),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn timestamp_matches_iso_millis_z() {
        assert_eq!(timestamp(fixed_now()), "2024-05-01T10:00:00.000Z");
    }

    #[test]
    fn demo_garages_are_consistent() {
        let mut ids: Vec<_> = DEMO_GARAGES.iter().map(|g| g.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert!(DEMO_GARAGES.iter().all(|g| g.free <= g.capacity));
    }

    #[test]
    fn demo_snapshot_serializes_in_wire_order() {
        let demo = demo_snapshot();
        assert_eq!(demo.garages().len(), 4);
        let stamp = demo.updated_at().and_then(Value::as_str).unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());

        let text = serde_json::to_string(&demo.garages()[3]).unwrap();
        assert_eq!(
            text,
            r#"{"id":"pinki","name":"Pinki (Novi Beograd)","lat":44.8212,"lng":20.3972,"capacity":150,"free":27,"address":"Bul. Zorana Đinđića 12","type":"garage"}"#
        );
        let keys: Vec<_> = demo.as_map().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["updatedAt", "garages"]);
    }

    #[test]
    fn shaped_body_is_served_byte_for_byte() {
        let text = r#"{"source":"city-api","updatedAt":"2024-04-30T08:15:00Z","garages":[{"id":17,"lat":44,"lng":20,"capacity":10,"free":3},{"id":"b","address":null,"free":1.5,"capacity":-1}],"page":{"n":1}}"#;
        let raw: Value = serde_json::from_str(text).unwrap();

        let snapshot = normalize_at(raw.clone(), fixed_now());
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), raw);
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), text);
        assert_eq!(snapshot.garages().len(), 2);
    }

    #[test]
    fn bare_list_is_wrapped_unfiltered() {
        let raw = json!([{ "id": "a", "capacity": 5, "free": 1 }, "not a garage", { "id": 9 }]);
        let snapshot = normalize_at(raw.clone(), fixed_now());
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({ "updatedAt": "2024-05-01T10:00:00.000Z", "garages": raw })
        );
    }

    #[test]
    fn other_shapes_become_empty() {
        for raw in [json!({ "data": [] }), json!("hello"), json!(null), json!(7)] {
            let snapshot = normalize_at(raw, fixed_now());
            assert!(snapshot.garages().is_empty());
            assert_eq!(snapshot.updated_at(), Some(&json!("2024-05-01T10:00:00.000Z")));
        }
    }

    #[test]
    fn falsy_updated_at_is_rewrapped() {
        let raw = json!({ "updatedAt": "", "garages": [{ "id": "a" }] });
        let snapshot = normalize_at(raw, fixed_now());
        assert_eq!(snapshot.updated_at(), Some(&json!("2024-05-01T10:00:00.000Z")));
        assert!(snapshot.garages().is_empty());
    }

    #[test]
    fn numeric_updated_at_passes_through() {
        let raw = json!({ "updatedAt": 1714557600, "garages": [] });
        assert_eq!(normalize_at(raw, fixed_now()).updated_at(), Some(&json!(1714557600)));
    }
}
