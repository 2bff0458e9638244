//! Wire-format response documents.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Keeps an explicit `null` as `Some(Linkage::Null)`; only a missing key is `None`.
fn present_linkage<'de, D>(deserializer: D) -> Result<Option<Linkage>, D::Error>
where
    D: Deserializer<'de>,
{
    Linkage::deserialize(deserializer).map(Some)
}

/// `{type, id}` pair identifying a related resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Value,
}

impl ResourceIdentifier {
    pub fn new(kind: impl Into<String>, id: Value) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

/// Resource linkage of a relationship member.
///
/// `Null` serializes as `null`, an empty `Many` as `[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Linkage {
    Null,
    One(ResourceIdentifier),
    Many(Vec<ResourceIdentifier>),
}

/// Hyperlinks of a resource object, relationship member or document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub this: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,
}

impl Links {
    pub fn is_empty(&self) -> bool {
        self.this.is_none() && self.related.is_none()
    }

    /// Picks the `self` and `related` strings out of controller-supplied links.
    pub fn from_raw(raw: &Map<String, Value>) -> Self {
        Self {
            this: raw.get("self").and_then(Value::as_str).map(String::from),
            related: raw.get("related").and_then(Value::as_str).map(String::from),
        }
    }
}

/// Entry of a resource object's `relationships` member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMember {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_linkage"
    )]
    pub data: Option<Linkage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl RelationshipMember {
    pub fn linkage(data: Linkage) -> Self {
        Self {
            data: Some(data),
            links: None,
        }
    }

    pub fn related_link(url: String) -> Self {
        Self {
            data: None,
            links: Some(Links {
                this: None,
                related: Some(url),
            }),
        }
    }
}

/// One entity in wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<IndexMap<String, RelationshipMember>>,
}

impl ResourceObject {
    pub(crate) fn set_attribute(&mut self, key: &str, value: Value) {
        self.attributes
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value);
    }

    pub(crate) fn set_relationship(&mut self, key: &str, member: RelationshipMember) {
        self.relationships
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), member);
    }

    pub fn relationship(&self, key: &str) -> Option<&RelationshipMember> {
        self.relationships.as_ref()?.get(key)
    }
}

/// Primary data of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Collection(Vec<ResourceObject>),
    Single(Box<ResourceObject>),
    Linkage(Linkage),
}

/// Top-level response document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PrimaryData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<ResourceObject>>,
}

impl Document {
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.included.is_none() && self.links.is_none()
    }

    /// Primary resource objects, whether single or a collection.
    pub fn resources(&self) -> Vec<&ResourceObject> {
        match &self.data {
            Some(PrimaryData::Single(obj)) => vec![obj.as_ref()],
            Some(PrimaryData::Collection(objs)) => objs.iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn linkage_null_and_empty_serialize() {
        let member = RelationshipMember::linkage(Linkage::Null);
        assert_eq!(serde_json::to_value(&member).unwrap(), json!({ "data": null }));

        let member = RelationshipMember::linkage(Linkage::Many(vec![]));
        assert_eq!(serde_json::to_value(&member).unwrap(), json!({ "data": [] }));
    }

    #[test]
    fn related_link_has_no_data_key() {
        let member = RelationshipMember::related_link("/api/books/1/author".into());
        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value, json!({ "links": { "related": "/api/books/1/author" } }));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn resource_object_member_order() {
        let mut obj = ResourceObject {
            kind: "books".into(),
            id: Some(json!("book:1")),
            ..Default::default()
        };
        obj.set_attribute("name", json!("First Book"));
        let text = serde_json::to_string(&obj).unwrap();
        assert_eq!(
            text,
            r#"{"type":"books","id":"book:1","attributes":{"name":"First Book"}}"#
        );
    }

    #[test]
    fn empty_document_serializes_to_empty_object() {
        let doc = Document::default();
        assert!(doc.is_empty());
        assert_eq!(doc.to_value(), json!({}));
    }

    #[test]
    fn null_linkage_survives_deserialization() {
        let member: RelationshipMember = serde_json::from_value(json!({ "data": null })).unwrap();
        assert_eq!(member.data, Some(Linkage::Null));

        let member: RelationshipMember =
            serde_json::from_value(json!({ "links": { "related": "/x" } })).unwrap();
        assert_eq!(member.data, None);
    }

    #[test]
    fn relationship_view_roundtrip() {
        let mut obj = ResourceObject::default();
        obj.set_relationship(
            "author",
            RelationshipMember::linkage(Linkage::One(ResourceIdentifier::new(
                "authors",
                json!("author:1"),
            ))),
        );
        let member = obj.relationship("author").unwrap();
        assert_eq!(
            member.data,
            Some(Linkage::One(ResourceIdentifier::new("authors", json!("author:1"))))
        );
    }

    #[test]
    fn relationships_keep_insertion_order() {
        let mut obj = ResourceObject {
            kind: "books".into(),
            ..Default::default()
        };
        obj.set_relationship("reviews", RelationshipMember::linkage(Linkage::Many(vec![])));
        obj.set_relationship("author", RelationshipMember::linkage(Linkage::Null));
        obj.set_relationship(
            "editor",
            RelationshipMember::related_link("/api/books/1/editor".into()),
        );

        let text = serde_json::to_string(&obj).unwrap();
        assert_eq!(
            text,
            r#"{"type":"books","relationships":{"reviews":{"data":[]},"author":{"data":null},"editor":{"links":{"related":"/api/books/1/editor"}}}}"#
        );

        let back: ResourceObject = serde_json::from_str(&text).unwrap();
        assert_eq!(back, obj);
    }
}
