#![allow(dead_code)]
//! ID index: every known record id mapped to the collection it belongs to.
//!
//! Built in one sequential pass over the `elementsId/{type}.json` listings
//! before any record is normalized, then only read.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::casing::pascal_case;
use crate::config::SourceOptions;
use crate::error::SourceError;
use crate::node::RecordId;
use crate::pagination::{decode_envelope, ensure_array_data};
use crate::transport::ApiClient;

/// Derive a collection name from the root type name, an element type and an
/// optional subtype: `("craft", "entry", "news")` → `CraftEntryNews`.
pub fn collection_name(type_name: &str, element_type: &str, subtype: &str) -> String {
    let name = if subtype.is_empty() {
        element_type.to_string()
    } else {
        format!("{} {}", element_type, subtype)
    };
    pascal_case(&format!("{} {}", type_name, name))
}

/// Ids of one collection, in listing order.
#[derive(Debug, Clone)]
pub struct CollectionIds {
    pub element_type: String,
    pub ids: Vec<RecordId>,
}

/// Immutable id → collection lookup.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    by_id: HashMap<RecordId, String>,
    collections: IndexMap<String, CollectionIds>,
}

impl IdIndex {
    pub fn builder() -> IdIndexBuilder {
        IdIndexBuilder::default()
    }

    /// Collection the id was listed under.
    pub fn lookup(&self, id: &RecordId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// Collection names in discovery order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionIds> {
        self.collections.get(name)
    }

    /// Every id listed for one element type, across its subtypes.
    pub fn ids_for_element_type(&self, element_type: &str) -> Vec<&RecordId> {
        self.collections
            .values()
            .filter(|c| c.element_type == element_type)
            .flat_map(|c| c.ids.iter())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Accumulates listings; the first listing of an id wins.
#[derive(Debug, Default)]
pub struct IdIndexBuilder {
    index: IdIndex,
}

impl IdIndexBuilder {
    pub fn insert(&mut self, collection: &str, element_type: &str, id: RecordId) -> &mut Self {
        if let Some(existing) = self.index.by_id.get(&id) {
            debug!("id {} already indexed under {}, ignoring {}", id, existing, collection);
            return self;
        }
        self.index
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| CollectionIds {
                element_type: element_type.to_string(),
                ids: Vec::new(),
            })
            .ids
            .push(id.clone());
        self.index.by_id.insert(id, collection.to_string());
        self
    }

    pub fn build(self) -> IdIndex {
        self.index
    }
}

/// Listing subtype as text. Numbers and booleans keep their JSON spelling;
/// null, missing and structured values mean "no subtype".
fn subtype(item: &Value) -> String {
    match item.get("type") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Fetch the id listing of every configured element type and index it.
pub async fn build_index(client: &ApiClient, options: &SourceOptions) -> Result<IdIndex, SourceError> {
    let mut builder = IdIndex::builder();

    for element_type in &options.element_types {
        let path = format!("elementsId/{}.json", element_type);
        let response = client.fetch(&path, &[]).await?;
        let envelope = decode_envelope(&path, response.body)?;
        let items = ensure_array_data(&path, envelope)?;
        debug!("{}: {} ids", path, items.len());

        for item in items {
            let Some(id) = item.get("id").and_then(RecordId::from_value) else {
                warn!("{}: skipping listing entry without id: {}", path, item);
                continue;
            };
            let name = collection_name(&options.type_name, element_type, &subtype(&item));
            builder.insert(&name, element_type, id);
        }
    }

    let index = builder.build();
    info!(
        "Indexed {} ids across {} collections",
        index.len(),
        index.collections.len()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn options(types: &[&str]) -> SourceOptions {
        SourceOptions::new("http://cms.test", "craft").with_element_types(types.iter().copied())
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("craft", "entry", "news"), "CraftEntryNews");
        assert_eq!(collection_name("craft", "globalSet", ""), "CraftGlobalSet");
        assert_eq!(
            collection_name("craft", "entry", "news"),
            collection_name("craft", "entry", "news")
        );
        assert_ne!(
            collection_name("craft", "entry", "news"),
            collection_name("craft", "entry", "blog")
        );
    }

    #[test]
    fn test_first_listing_wins() {
        let mut builder = IdIndex::builder();
        builder
            .insert("CraftEntryNews", "entry", 1.into())
            .insert("CraftEntryBlog", "entry", 1.into());
        let index = builder.build();

        assert_eq!(index.lookup(&1.into()), Some("CraftEntryNews"));
        assert!(index.collection("CraftEntryBlog").is_none());
    }

    #[tokio::test]
    async fn test_build_index() {
        let transport = MockTransport::new()
            .route(
                "elementsId/entry.json",
                None,
                json!({"data": [
                    {"id": 1, "type": "news"},
                    {"id": "2", "type": "blog"},
                    {"id": 3, "type": "news"}
                ]}),
            )
            .route("elementsId/user.json", None, json!({"data": [{"id": 9, "type": null}]}));
        let client = ApiClient::new(Arc::new(transport));

        let index = build_index(&client, &options(&["entry", "user"])).await.unwrap();

        assert_eq!(index.lookup(&RecordId::from(1)), Some("CraftEntryNews"));
        assert_eq!(index.lookup(&RecordId::from("2")), Some("CraftEntryBlog"));
        assert_eq!(index.lookup(&RecordId::from(9)), Some("CraftUser"));
        assert_eq!(
            index.collection_names().collect::<Vec<_>>(),
            vec!["CraftEntryNews", "CraftEntryBlog", "CraftUser"]
        );
        assert_eq!(index.ids_for_element_type("entry").len(), 3);

        // every listed id sits in exactly one collection
        let mut seen = HashSet::new();
        for name in index.collection_names() {
            for id in &index.collection(name).unwrap().ids {
                assert!(seen.insert(id.clone()), "{id} listed twice");
            }
        }
        assert_eq!(seen.len(), index.len());
    }

    #[tokio::test]
    async fn test_scalar_subtypes_name_collections() {
        let transport = MockTransport::new().route(
            "elementsId/entry.json",
            None,
            json!({"data": [
                {"id": 4, "type": 3},
                {"id": 5, "type": true},
                {"id": 6, "type": {"handle": "x"}}
            ]}),
        );
        let client = ApiClient::new(Arc::new(transport));

        let index = build_index(&client, &options(&["entry"])).await.unwrap();

        assert_eq!(index.lookup(&RecordId::from(4)), Some("CraftEntry3"));
        assert_eq!(index.lookup(&RecordId::from(5)), Some("CraftEntryTrue"));
        assert_eq!(index.lookup(&RecordId::from(6)), Some("CraftEntry"));
    }

    #[tokio::test]
    async fn test_denied_listing_contributes_nothing() {
        let transport = MockTransport::new()
            .route("elementsId/entry.json", None, json!({"data": [{"id": 1, "type": "news"}]}))
            .route_status("elementsId/user.json", None, 403, json!({"status": 403}));
        let client = ApiClient::new(Arc::new(transport));

        let index = build_index(&client, &options(&["entry", "user"])).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.ids_for_element_type("user").is_empty());
    }

    #[tokio::test]
    async fn test_listing_failure_is_fatal() {
        let transport = MockTransport::new().unreachable("elementsId/entry.json", None);
        let client = ApiClient::new(Arc::new(transport));

        let result = build_index(&client, &options(&["entry"])).await;
        assert!(matches!(result, Err(SourceError::Transport { .. })));
    }
}
