//! Watch event classification
//!
//! The watcher only reports "object is now X" (`Apply`) and "object is gone"
//! (`Delete`), plus re-list markers. Filters need to know whether an apply was
//! a create or an update, and what the object looked like before. The
//! [`EventClassifier`] keeps the last seen copy of every object to answer that.

use std::collections::{HashMap, HashSet};

use futures::{Stream, StreamExt};
use kube::runtime::watcher;
use kube::{Resource, ResourceExt};
use tracing::debug;

use super::EventFilter;

/// A watch event with create/update/delete semantics
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent<K> {
    /// First sighting of an object
    Created(K),
    /// A known object changed
    Updated {
        /// The previously seen object
        old: K,
        /// The object as it is now
        new: K,
    },
    /// An object was removed
    Deleted(K),
}

impl<K> ResourceEvent<K> {
    /// The current (or last known, for deletes) object
    pub fn into_object(self) -> K {
        match self {
            Self::Created(obj) | Self::Deleted(obj) => obj,
            Self::Updated { new, .. } => new,
        }
    }
}

type ObjectKey = (Option<String>, String);

fn key_of<K: Resource>(obj: &K) -> ObjectKey {
    (obj.namespace(), obj.name_any())
}

/// Stateful translator from raw watcher events to [`ResourceEvent`]s
pub struct EventClassifier<K> {
    known: HashMap<ObjectKey, K>,
    relist_seen: Option<HashSet<ObjectKey>>,
}

impl<K> Default for EventClassifier<K> {
    fn default() -> Self {
        Self {
            known: HashMap::new(),
            relist_seen: None,
        }
    }
}

impl<K: Resource + Clone> EventClassifier<K> {
    /// Create an empty classifier
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently tracked
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// True when no objects are tracked
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Classify one watcher event.
    ///
    /// Returns zero events for re-list markers, one for applies and deletes,
    /// and possibly several at the end of a re-list when objects vanished
    /// while the watch was down.
    pub fn classify(&mut self, event: watcher::Event<K>) -> Vec<ResourceEvent<K>> {
        match event {
            watcher::Event::Apply(obj) => vec![self.apply(obj)],
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relist_seen.as_mut() {
                    seen.insert(key_of(&obj));
                }
                vec![self.apply(obj)]
            }
            watcher::Event::Delete(obj) => {
                self.known.remove(&key_of(&obj));
                vec![ResourceEvent::Deleted(obj)]
            }
            watcher::Event::Init => {
                self.relist_seen = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitDone => self.finish_relist(),
        }
    }

    fn apply(&mut self, obj: K) -> ResourceEvent<K> {
        match self.known.insert(key_of(&obj), obj.clone()) {
            Some(old) => ResourceEvent::Updated { old, new: obj },
            None => ResourceEvent::Created(obj),
        }
    }

    fn finish_relist(&mut self) -> Vec<ResourceEvent<K>> {
        let Some(seen) = self.relist_seen.take() else {
            return Vec::new();
        };
        let vanished: Vec<ObjectKey> = self
            .known
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        vanished
            .into_iter()
            .filter_map(|key| self.known.remove(&key))
            .inspect(|obj| debug!(name = %obj.name_any(), "object vanished during re-list"))
            .map(ResourceEvent::Deleted)
            .collect()
    }
}

/// Classify a watcher stream and keep only the objects `filter` admits.
///
/// Watcher errors pass through untouched so the controller can report them.
pub fn admitted_objects<K, F, S>(
    events: S,
    filter: F,
) -> impl Stream<Item = Result<K, watcher::Error>> + Send + 'static
where
    K: Resource + Clone + Send + 'static,
    F: EventFilter<K> + 'static,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    let mut classifier = EventClassifier::new();
    events.flat_map(move |item| {
        let admitted: Vec<Result<K, watcher::Error>> = match item {
            Ok(event) => classifier
                .classify(event)
                .into_iter()
                .filter(|e| filter.admit(e))
                .map(|e| Ok(e.into_object()))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        futures::stream::iter(admitted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::OwnedResourceFilter;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn deployment(name: &str, version: &str, replicas: i32) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                resource_version: Some(version.to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                ..Default::default()
            }),
            status: None,
        }
    }

    #[test]
    fn first_apply_is_a_create_and_second_is_an_update() {
        let mut classifier = EventClassifier::new();

        let created = classifier.classify(watcher::Event::Apply(deployment("a", "1", 1)));
        assert_eq!(created, vec![ResourceEvent::Created(deployment("a", "1", 1))]);

        let updated = classifier.classify(watcher::Event::Apply(deployment("a", "2", 3)));
        assert_eq!(
            updated,
            vec![ResourceEvent::Updated {
                old: deployment("a", "1", 1),
                new: deployment("a", "2", 3),
            }]
        );
        assert_eq!(classifier.len(), 1);
    }

    #[test]
    fn delete_forgets_the_object() {
        let mut classifier = EventClassifier::new();
        classifier.classify(watcher::Event::Apply(deployment("a", "1", 1)));

        let deleted = classifier.classify(watcher::Event::Delete(deployment("a", "1", 1)));
        assert_eq!(deleted, vec![ResourceEvent::Deleted(deployment("a", "1", 1))]);
        assert!(classifier.is_empty());

        let recreated = classifier.classify(watcher::Event::Apply(deployment("a", "5", 1)));
        assert!(matches!(recreated[0], ResourceEvent::Created(_)));
    }

    /// Story: the watch drops, a child is deleted meanwhile, the re-list
    /// reveals it is gone and the delete is reported late
    #[test]
    fn story_relist_reports_objects_deleted_while_disconnected() {
        let mut classifier = EventClassifier::new();
        classifier.classify(watcher::Event::Apply(deployment("kept", "1", 1)));
        classifier.classify(watcher::Event::Apply(deployment("gone", "1", 1)));

        assert!(classifier.classify(watcher::Event::Init).is_empty());
        let relisted = classifier.classify(watcher::Event::InitApply(deployment("kept", "1", 1)));
        assert!(matches!(relisted[0], ResourceEvent::Updated { .. }));

        let done = classifier.classify(watcher::Event::InitDone);
        assert_eq!(done, vec![ResourceEvent::Deleted(deployment("gone", "1", 1))]);
        assert_eq!(classifier.len(), 1);
    }

    #[test]
    fn init_done_without_init_is_a_no_op() {
        let mut classifier = EventClassifier::new();
        classifier.classify(watcher::Event::Apply(deployment("a", "1", 1)));
        assert!(classifier.classify(watcher::Event::InitDone).is_empty());
        assert_eq!(classifier.len(), 1);
    }

    #[tokio::test]
    async fn admitted_objects_applies_the_filter() {
        let events = futures::stream::iter(vec![
            Ok(watcher::Event::Apply(deployment("a", "1", 1))),
            // status-only resync: same spec, new version
            Ok(watcher::Event::Apply(deployment("a", "2", 1))),
            Ok(watcher::Event::Apply(deployment("a", "3", 4))),
            Ok(watcher::Event::Delete(deployment("a", "3", 4))),
        ]);

        let admitted: Vec<Deployment> =
            admitted_objects(events, OwnedResourceFilter::<Deployment>::new())
                .map(|r| r.unwrap())
                .collect()
                .await;

        let versions: Vec<_> = admitted
            .iter()
            .map(|d| d.metadata.resource_version.clone().unwrap())
            .collect();
        assert_eq!(versions, vec!["3".to_string(), "3".to_string()]);
    }
}
