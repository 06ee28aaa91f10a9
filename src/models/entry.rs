//! Conversion between GData JSON entries and [`ContactRecord`].
//!
//! Feed values arrive either bare (`"x"`) or wrapped (`{"$t": "x"}`); both
//! are unwrapped here so the rest of the crate only sees typed fields.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use super::record::LoadedGroups;
use super::{ContactRecord, Email, ImHandle, Name, Organization, Phone, PostalAddress, Relation};
use crate::error::{ContactError, Result};

const NAME_PROPS: &[&str] = &[
    "givenName",
    "additionalName",
    "familyName",
    "namePrefix",
    "nameSuffix",
];

/// Unwrap a `{"$t": ..}` value to text.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$t").and_then(text),
        _ => None,
    }
}

fn text_at(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(text).filter(|s| !s.is_empty())
}

fn wrap(s: &str) -> Value {
    json!({ "$t": s })
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn relation(obj: &Map<String, Value>) -> Option<Relation> {
    obj.get("rel").and_then(Value::as_str).map(Relation::from_uri)
}

fn objects<'a>(entry: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn parse_updated(value: Option<&Value>) -> DateTime<Utc> {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_f64()
            .and_then(|secs| Utc.timestamp_opt(secs as i64, 0).single()),
        Some(v) => text(v).and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }),
        None => None,
    };

    parsed.unwrap_or_else(Utc::now)
}

fn parse_name(entry: &Map<String, Value>) -> Name {
    let Some(name) = entry.get("gd$name").and_then(Value::as_object) else {
        return Name::default();
    };
    let part = |prop: &str| text_at(name, &format!("gd${}", prop));

    Name {
        given: part("givenName"),
        additional: part("additionalName"),
        family: part("familyName"),
        prefix: part("namePrefix"),
        suffix: part("nameSuffix"),
    }
}

fn parse_organization(obj: &Map<String, Value>) -> Organization {
    Organization {
        name: text_at(obj, "gd$orgName"),
        title: text_at(obj, "gd$orgTitle"),
        department: text_at(obj, "gd$orgDepartment"),
        job_description: text_at(obj, "gd$orgJobDescription"),
        symbol: text_at(obj, "gd$orgSymbol"),
        location: text_at(obj, "gd$where"),
        relation: relation(obj),
        label: text_at(obj, "label"),
        is_primary: flag(obj, "primary"),
    }
}

fn parse_address(obj: &Map<String, Value>) -> PostalAddress {
    PostalAddress {
        formatted: text_at(obj, "gd$formattedAddress").or_else(|| text_at(obj, "$t")),
        street: text_at(obj, "gd$street"),
        city: text_at(obj, "gd$city"),
        region: text_at(obj, "gd$region"),
        postcode: text_at(obj, "gd$postcode"),
        country: text_at(obj, "gd$country"),
        relation: relation(obj),
        label: text_at(obj, "label"),
        is_primary: flag(obj, "primary"),
    }
}

impl ContactRecord {
    /// Build a record from one feed entry. `id` and `title` are required;
    /// every other group defaults to empty.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        let obj = entry
            .as_object()
            .ok_or_else(|| ContactError::MalformedInput("entry is not an object".into()))?;

        let id = obj
            .get("id")
            .and_then(text)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ContactError::MalformedInput("entry is missing id".into()))?;
        let title = obj
            .get("title")
            .and_then(text)
            .ok_or_else(|| ContactError::MalformedInput(format!("entry {} is missing title", id)))?;

        let emails = objects(obj, "gd$email")
            .filter_map(|e| {
                let address = text_at(e, "address")?;
                Some(Email {
                    address,
                    relation: relation(e),
                    label: text_at(e, "label"),
                    is_primary: flag(e, "primary"),
                })
            })
            .collect();

        let phones = objects(obj, "gd$phoneNumber")
            .filter_map(|p| {
                let number = text_at(p, "$t")?;
                Some(Phone {
                    number,
                    uri: text_at(p, "uri"),
                    relation: relation(p),
                    label: text_at(p, "label"),
                    is_primary: flag(p, "primary"),
                })
            })
            .collect();

        let im_handles = objects(obj, "gd$im")
            .filter_map(|im| {
                let address = text_at(im, "address")?;
                Some(ImHandle {
                    address,
                    protocol: text_at(im, "protocol").unwrap_or_default(),
                    relation: relation(im),
                    label: text_at(im, "label"),
                })
            })
            .collect();

        let addresses = objects(obj, "gd$postalAddress")
            .chain(objects(obj, "gd$structuredPostalAddress"))
            .map(parse_address)
            .collect();

        let groups = objects(obj, "gContact$groupMembershipInfo")
            .filter(|g| !flag(g, "deleted"))
            .filter_map(|g| text_at(g, "href"))
            .collect();

        let extended_properties: BTreeMap<String, String> = objects(obj, "gd$extendedProperty")
            .filter_map(|p| Some((text_at(p, "name")?, text_at(p, "value").unwrap_or_default())))
            .collect();

        let mut record = ContactRecord::new(id, title);
        record.load_groups(LoadedGroups {
            name: parse_name(obj),
            note: obj.get("content").and_then(text).filter(|s| !s.is_empty()),
            etag: obj.get("gd$etag").and_then(text),
            organizations: objects(obj, "gd$organization").map(parse_organization).collect(),
            emails,
            phones,
            im_handles,
            addresses,
            groups,
            extended_properties,
        });
        record.set_updated_at(parse_updated(obj.get("updated")));

        Ok(record)
    }

    /// Serialize back to the entry shape [`ContactRecord::from_entry`] reads.
    pub fn to_entry(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("id".into(), wrap(self.id()));
        entry.insert("title".into(), wrap(self.title()));
        entry.insert("updated".into(), wrap(&self.updated_at().to_rfc3339()));

        if let Some(etag) = self.etag() {
            entry.insert("gd$etag".into(), json!(etag));
        }
        if let Some(note) = self.note() {
            entry.insert("content".into(), wrap(note));
        }

        let name = self.name();
        let parts = [
            &name.given,
            &name.additional,
            &name.family,
            &name.prefix,
            &name.suffix,
        ];
        let name_obj: Map<String, Value> = NAME_PROPS
            .iter()
            .zip(parts)
            .filter_map(|(prop, part)| part.as_deref().map(|v| (format!("gd${}", prop), wrap(v))))
            .collect();
        if !name_obj.is_empty() {
            entry.insert("gd$name".into(), Value::Object(name_obj));
        }

        let orgs: Vec<Value> = self
            .organizations()
            .iter()
            .map(|o| {
                let mut m = Map::new();
                let props = [
                    ("gd$orgName", &o.name),
                    ("gd$orgTitle", &o.title),
                    ("gd$orgDepartment", &o.department),
                    ("gd$orgJobDescription", &o.job_description),
                    ("gd$orgSymbol", &o.symbol),
                    ("gd$where", &o.location),
                ];
                for (key, value) in props {
                    if let Some(v) = value {
                        m.insert(key.into(), wrap(v));
                    }
                }
                decorate(&mut m, o.relation.as_ref(), o.label.as_deref(), o.is_primary);
                Value::Object(m)
            })
            .collect();

        let emails: Vec<Value> = self
            .emails()
            .iter()
            .map(|e| {
                let mut m = Map::new();
                m.insert("address".into(), json!(e.address));
                decorate(&mut m, e.relation.as_ref(), e.label.as_deref(), e.is_primary);
                Value::Object(m)
            })
            .collect();

        let phones: Vec<Value> = self
            .phones()
            .iter()
            .map(|p| {
                let mut m = Map::new();
                m.insert("$t".into(), json!(p.number));
                if let Some(uri) = &p.uri {
                    m.insert("uri".into(), json!(uri));
                }
                decorate(&mut m, p.relation.as_ref(), p.label.as_deref(), p.is_primary);
                Value::Object(m)
            })
            .collect();

        let ims: Vec<Value> = self
            .im_handles()
            .iter()
            .map(|im| {
                let mut m = Map::new();
                m.insert("address".into(), json!(im.address));
                m.insert("protocol".into(), json!(im.protocol));
                decorate(&mut m, im.relation.as_ref(), im.label.as_deref(), false);
                Value::Object(m)
            })
            .collect();

        let (structured, plain): (Vec<&PostalAddress>, Vec<&PostalAddress>) =
            self.addresses().iter().partition(|a| a.is_structured());

        let plain: Vec<Value> = plain
            .into_iter()
            .map(|a| {
                let mut m = Map::new();
                m.insert("$t".into(), json!(a.formatted.clone().unwrap_or_default()));
                decorate(&mut m, a.relation.as_ref(), a.label.as_deref(), a.is_primary);
                Value::Object(m)
            })
            .collect();

        let structured: Vec<Value> = structured
            .into_iter()
            .map(|a| {
                let mut m = Map::new();
                let props = [
                    ("gd$formattedAddress", &a.formatted),
                    ("gd$street", &a.street),
                    ("gd$city", &a.city),
                    ("gd$region", &a.region),
                    ("gd$postcode", &a.postcode),
                    ("gd$country", &a.country),
                ];
                for (key, value) in props {
                    if let Some(v) = value {
                        m.insert(key.into(), wrap(v));
                    }
                }
                decorate(&mut m, a.relation.as_ref(), a.label.as_deref(), a.is_primary);
                Value::Object(m)
            })
            .collect();

        let groups: Vec<Value> = self
            .groups()
            .iter()
            .map(|href| json!({ "href": href, "deleted": "false" }))
            .collect();

        let props: Vec<Value> = self
            .extended_properties()
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();

        let arrays = [
            ("gd$organization", orgs),
            ("gd$email", emails),
            ("gd$phoneNumber", phones),
            ("gd$im", ims),
            ("gd$postalAddress", plain),
            ("gd$structuredPostalAddress", structured),
            ("gContact$groupMembershipInfo", groups),
            ("gd$extendedProperty", props),
        ];
        for (key, values) in arrays {
            if !values.is_empty() {
                entry.insert(key.into(), Value::Array(values));
            }
        }

        Value::Object(entry)
    }
}

fn decorate(m: &mut Map<String, Value>, relation: Option<&Relation>, label: Option<&str>, primary: bool) {
    if let Some(rel) = relation {
        m.insert("rel".into(), json!(rel.uri()));
    }
    if let Some(label) = label {
        m.insert("label".into(), json!(label));
    }
    if primary {
        m.insert("primary".into(), json!("true"));
    }
}
