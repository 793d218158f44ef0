//! Encoded bundle storage
//!
//! Bundles are keyed by encoding id, with a task-id index so a task's
//! latest encoding can be found without knowing the id. Storage is a
//! trait seam; the in-memory implementation backs both the default
//! deployment and the tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use polyglot_common::Result;

use crate::encoder::{EncodedBundle, TextEncoder};

#[async_trait]
pub trait EncodingStore: Send + Sync {
    async fn put(&self, task_id: &str, bundle: EncodedBundle) -> Result<()>;

    async fn get(&self, encoding_id: &str) -> Result<Option<EncodedBundle>>;

    /// Most recent bundle stored for a task, if any.
    async fn get_by_task(&self, task_id: &str) -> Result<Option<EncodedBundle>>;
}

#[derive(Default)]
struct StoreState {
    bundles: HashMap<String, EncodedBundle>,
    by_task: HashMap<String, String>,
}

#[derive(Clone, Default)]
pub struct InMemoryEncodingStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryEncodingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EncodingStore for InMemoryEncodingStore {
    async fn put(&self, task_id: &str, bundle: EncodedBundle) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .by_task
            .insert(task_id.to_string(), bundle.encoding_id.clone());
        state.bundles.insert(bundle.encoding_id.clone(), bundle);
        Ok(())
    }

    async fn get(&self, encoding_id: &str) -> Result<Option<EncodedBundle>> {
        let state = self.state.lock().await;
        Ok(state.bundles.get(encoding_id).cloned())
    }

    async fn get_by_task(&self, task_id: &str) -> Result<Option<EncodedBundle>> {
        let state = self.state.lock().await;
        Ok(state
            .by_task
            .get(task_id)
            .and_then(|id| state.bundles.get(id))
            .cloned())
    }
}

/// Look up one language's aggregated text from a stored bundle.
pub async fn lookup_translation(
    store: &dyn EncodingStore,
    encoder: &dyn TextEncoder,
    encoding_id: &str,
    language: &str,
) -> Result<Option<String>> {
    let Some(bundle) = store.get(encoding_id).await? else {
        return Ok(None);
    };
    let texts = encoder.decode(&bundle.data)?;
    Ok(texts.get(language).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::DeflateEncoder;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn put_then_get_by_both_keys() {
        let store = InMemoryEncodingStore::new();
        let encoder = DeflateEncoder::default();
        let mut texts = BTreeMap::new();
        texts.insert("en".to_string(), "hello".to_string());
        let bundle = encoder.encode(&texts).unwrap();
        let encoding_id = bundle.encoding_id.clone();

        store.put("t1", bundle).await.unwrap();
        assert!(store.get(&encoding_id).await.unwrap().is_some());
        let by_task = store.get_by_task("t1").await.unwrap().unwrap();
        assert_eq!(by_task.encoding_id, encoding_id);
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(store.get_by_task("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn a_restart_replaces_the_task_index() {
        let store = InMemoryEncodingStore::new();
        let encoder = DeflateEncoder::default();
        let mut texts = BTreeMap::new();
        texts.insert("en".to_string(), "first".to_string());
        let first = encoder.encode(&texts).unwrap();
        texts.insert("en".to_string(), "second".to_string());
        let second = encoder.encode(&texts).unwrap();
        let second_id = second.encoding_id.clone();

        store.put("t1", first).await.unwrap();
        store.put("t1", second).await.unwrap();
        let latest = store.get_by_task("t1").await.unwrap().unwrap();
        assert_eq!(latest.encoding_id, second_id);
    }

    #[tokio::test]
    async fn lookup_translation_decodes_one_language() {
        let store = InMemoryEncodingStore::new();
        let encoder = DeflateEncoder::default();
        let mut texts = BTreeMap::new();
        texts.insert("en".to_string(), "hello".to_string());
        texts.insert("ja".to_string(), "こんにちは".to_string());
        let bundle = encoder.encode(&texts).unwrap();
        let encoding_id = bundle.encoding_id.clone();
        store.put("t1", bundle).await.unwrap();

        let text = lookup_translation(&store, &encoder, &encoding_id, "ja")
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("こんにちは"));
        let missing = lookup_translation(&store, &encoder, &encoding_id, "fr")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
