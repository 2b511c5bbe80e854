use std::collections::BTreeMap;
use std::future::Future;
use std::num::NonZeroUsize;

use futures::StreamExt as _;

/// Outcome of every item a pool worked on, keyed and ordered by the item.
#[derive(Debug)]
pub struct Report<K, T, E> {
    outcomes: BTreeMap<K, Result<T, E>>,
}

impl<K: Ord, T, E> Report<K, T, E> {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&Result<T, E>> {
        self.outcomes.get(key)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&K, &T)> {
        self.outcomes
            .iter()
            .filter_map(|(key, outcome)| outcome.as_ref().ok().map(|value| (key, value)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&K, &E)> {
        self.outcomes
            .iter()
            .filter_map(|(key, outcome)| outcome.as_ref().err().map(|error| (key, error)))
    }

    pub fn failures(&self) -> usize {
        self.failed().count()
    }
}

impl<K: Ord, T, E> FromIterator<(K, Result<T, E>)> for Report<K, T, E> {
    fn from_iter<I: IntoIterator<Item = (K, Result<T, E>)>>(iter: I) -> Self {
        Self {
            outcomes: iter.into_iter().collect(),
        }
    }
}

/// Run `task` for every item with at most `limit` of them in flight, and wait for all of them.
///
/// A failing item does not stop the others; its error ends up in the report next to the successes.
pub async fn run<K, T, E, F, Fut>(
    items: impl IntoIterator<Item = K>, limit: NonZeroUsize, mut task: F,
) -> Report<K, T, E>
where
    K: Ord + Clone,
    F: FnMut(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    futures::stream::iter(items)
        .map(|key| {
            let work = task(key.clone());
            async move { (key, work.await) }
        })
        .buffer_unordered(limit.get())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect()
}
