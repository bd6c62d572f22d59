//! The class definition arena shared by writers, readers and the client.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use super::{ClassDefinition, ClassKey};
use crate::error::{HazelcastError, Result};

/// Default bound on a single class definition fetch.
pub const DEFAULT_SCHEMA_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where unknown class definitions are fetched from.
///
/// The client implements this on top of its invocation service.
#[async_trait]
pub trait ClassDefinitionSource: Send + Sync {
    /// Fetches the definition for `key`, or `None` if the cluster does not
    /// know it.
    async fn fetch(&self, key: ClassKey) -> Result<Option<ClassDefinition>>;
}

type InFlight = Arc<OnceCell<Arc<ClassDefinition>>>;

/// Arena of class definitions keyed by [`ClassKey`].
///
/// Definitions are immutable once stored. Nested classes are referenced by
/// key and stored as their own entries.
pub struct SchemaRegistry {
    definitions: Mutex<HashMap<ClassKey, Arc<ClassDefinition>>>,
    in_flight: Mutex<HashMap<ClassKey, InFlight>>,
    source: RwLock<Option<Arc<dyn ClassDefinitionSource>>>,
    fetch_timeout: Duration,
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("definitions", &self.definitions.lock().len())
            .field("in_flight", &self.in_flight.lock().len())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_FETCH_TIMEOUT)
    }
}

impl SchemaRegistry {
    /// Creates an empty registry without a fetch source.
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            definitions: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            source: RwLock::new(None),
            fetch_timeout,
        }
    }

    /// Installs the source used by [`resolve`](Self::resolve) for unknown keys.
    pub fn set_source(&self, source: Arc<dyn ClassDefinitionSource>) {
        *self.source.write() = Some(source);
    }

    /// Stores a definition.
    ///
    /// Defining the same field list twice returns the stored definition.
    ///
    /// # Errors
    ///
    /// Returns `SchemaConflict` if the key is already bound to a different
    /// field list.
    pub fn define(&self, definition: ClassDefinition) -> Result<Arc<ClassDefinition>> {
        let key = definition.key();
        let mut definitions = self.definitions.lock();
        if let Some(existing) = definitions.get(&key) {
            return match existing.difference(&definition) {
                None => Ok(Arc::clone(existing)),
                Some(reason) => Err(HazelcastError::SchemaConflict { key, reason }),
            };
        }
        let definition = Arc::new(definition);
        definitions.insert(key, Arc::clone(&definition));
        debug!(%key, fields = definition.field_count(), "class definition registered");
        Ok(definition)
    }

    /// Returns the stored definition for `key`.
    pub fn get(&self, key: ClassKey) -> Option<Arc<ClassDefinition>> {
        self.definitions.lock().get(&key).cloned()
    }

    /// Returns the number of stored definitions.
    pub fn len(&self) -> usize {
        self.definitions.lock().len()
    }

    /// Returns true if no definition is stored.
    pub fn is_empty(&self) -> bool {
        self.definitions.lock().is_empty()
    }

    /// Returns the definition for `key`, fetching it and every nested
    /// definition it references if they are not stored yet.
    ///
    /// Concurrent calls for the same key share one fetch.
    ///
    /// # Errors
    ///
    /// Returns `SchemaUnavailable` if a definition is unknown to the source,
    /// the fetch exceeds the configured timeout, or no source is installed.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, key: ClassKey) -> Result<Arc<ClassDefinition>> {
        let root = self.resolve_one(key).await?;

        let mut seen = HashSet::from([key]);
        let mut pending: Vec<ClassKey> = root.nested_keys().iter().copied().collect();
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            let nested = self.resolve_one(next).await?;
            pending.extend(nested.nested_keys().iter().copied());
        }

        Ok(root)
    }

    async fn resolve_one(&self, key: ClassKey) -> Result<Arc<ClassDefinition>> {
        if let Some(definition) = self.get(key) {
            return Ok(definition);
        }

        let cell = {
            let mut in_flight = self.in_flight.lock();
            // A fetch that finished since the miss above has already dropped
            // its cell; its definition is in the arena.
            if let Some(definition) = self.get(key) {
                return Ok(definition);
            }
            Arc::clone(in_flight.entry(key).or_default())
        };
        let result = cell
            .get_or_try_init(|| async {
                match self.get(key) {
                    Some(definition) => Ok(definition),
                    None => self.fetch(key).await,
                }
            })
            .await
            .cloned();

        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            in_flight.remove(&key);
        }
        drop(in_flight);

        result
    }

    async fn fetch(&self, key: ClassKey) -> Result<Arc<ClassDefinition>> {
        let source = self.source.read().clone().ok_or_else(|| {
            HazelcastError::SchemaUnavailable {
                key,
                reason: "no class definition source".to_string(),
            }
        })?;

        debug!(%key, "fetching class definition");
        let fetched = tokio::time::timeout(self.fetch_timeout, source.fetch(key))
            .await
            .map_err(|_| {
                warn!(%key, timeout = ?self.fetch_timeout, "class definition fetch timed out");
                HazelcastError::SchemaUnavailable {
                    key,
                    reason: format!("fetch timed out after {:?}", self.fetch_timeout),
                }
            })?;

        match fetched {
            Ok(Some(definition)) if definition.key() == key => self.define(definition),
            Ok(Some(definition)) => Err(HazelcastError::SchemaUnavailable {
                key,
                reason: format!("source returned {}", definition.key()),
            }),
            Ok(None) => Err(HazelcastError::SchemaUnavailable {
                key,
                reason: "unknown to the cluster".to_string(),
            }),
            Err(e) => Err(HazelcastError::SchemaUnavailable {
                key,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::portable::{ClassDefinitionBuilder, FieldType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn person(version: i32, age_type: FieldType) -> ClassDefinition {
        ClassDefinitionBuilder::new(1, 1, version)
            .add_field("age", age_type)
            .add_field("name", FieldType::Utf8)
            .build()
            .unwrap()
    }

    struct CountingSource {
        definitions: Vec<ClassDefinition>,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClassDefinitionSource for CountingSource {
        async fn fetch(&self, key: ClassKey) -> Result<Option<ClassDefinition>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.definitions.iter().find(|d| d.key() == key).cloned())
        }
    }

    fn source(definitions: Vec<ClassDefinition>, delay: Duration) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            definitions,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_define_is_idempotent() {
        let registry = SchemaRegistry::default();
        let first = registry.define(person(0, FieldType::Int)).unwrap();
        let second = registry.define(person(0, FieldType::Int)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_define_conflict() {
        let registry = SchemaRegistry::default();
        registry.define(person(0, FieldType::Int)).unwrap();
        let err = registry.define(person(0, FieldType::Long)).unwrap_err();
        assert!(matches!(err, HazelcastError::SchemaConflict { .. }));

        registry.define(person(1, FieldType::Long)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let registry = Arc::new(SchemaRegistry::default());
        let source = source(vec![person(0, FieldType::Int)], Duration::from_millis(50));
        registry.set_source(source.clone());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.resolve(ClassKey::new(1, 1, 0)).await })
            })
            .collect();

        let mut resolved = Vec::new();
        for task in tasks {
            resolved.push(task.await.unwrap().unwrap());
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(resolved.iter().all(|d| Arc::ptr_eq(d, &resolved[0])));
        assert_eq!(*resolved[0], person(0, FieldType::Int));
    }

    struct YieldingSource {
        definition: ClassDefinition,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ClassDefinitionSource for YieldingSource {
        async fn fetch(&self, _key: ClassKey) -> Result<Option<ClassDefinition>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Some(self.definition.clone()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_resolves_fetch_once() {
        for iteration in 0..2_000 {
            let registry = Arc::new(SchemaRegistry::default());
            let source = Arc::new(YieldingSource {
                definition: person(0, FieldType::Int),
                calls: AtomicUsize::new(0),
            });
            registry.set_source(source.clone());

            let tasks: Vec<_> = (0..8)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    tokio::spawn(async move { registry.resolve(ClassKey::new(1, 1, 0)).await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            assert_eq!(
                source.calls.load(Ordering::SeqCst),
                1,
                "iteration {} fetched more than once",
                iteration
            );
        }
    }

    #[tokio::test]
    async fn test_resolve_fetches_nested() {
        let address = ClassDefinitionBuilder::new(1, 2, 0)
            .add_field("city", FieldType::Utf8)
            .build()
            .unwrap();
        let outer = ClassDefinitionBuilder::new(1, 1, 0)
            .add_portable_field("home", address.key())
            .build()
            .unwrap();

        let registry = SchemaRegistry::default();
        let source = source(vec![outer, address.clone()], Duration::ZERO);
        registry.set_source(source.clone());

        registry.resolve(ClassKey::new(1, 1, 0)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.get(address.key()).as_deref(), Some(&address));

        registry.resolve(ClassKey::new(1, 1, 0)).await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_key_is_unavailable() {
        let registry = SchemaRegistry::default();
        registry.set_source(source(Vec::new(), Duration::ZERO));
        let err = registry.resolve(ClassKey::new(9, 9, 9)).await.unwrap_err();
        assert!(matches!(err, HazelcastError::SchemaUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_no_source_is_unavailable() {
        let registry = SchemaRegistry::default();
        let err = registry.resolve(ClassKey::new(1, 1, 0)).await.unwrap_err();
        assert!(matches!(err, HazelcastError::SchemaUnavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout() {
        let registry = SchemaRegistry::new(Duration::from_millis(100));
        registry.set_source(source(
            vec![person(0, FieldType::Int)],
            Duration::from_secs(60),
        ));
        let err = registry.resolve(ClassKey::new(1, 1, 0)).await.unwrap_err();
        match err {
            HazelcastError::SchemaUnavailable { reason, .. } => {
                assert!(reason.contains("timed out"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
