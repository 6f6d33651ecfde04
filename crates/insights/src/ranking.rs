//! Grouping with ranking: e.g. plays per album, tie-broken by popularity

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRank<K> {
    pub key: K,
    /// Label of the first member seen in the group
    pub label: String,
    pub count: usize,
    /// Mean of the metric over the group's members
    pub average: f64,
}

/// Group `items` by `key_of`, count members and average `metric_of`.
///
/// Sorted by count descending, then average descending; groups equal on
/// both keep first-seen order. `limit` applies after sorting.
pub fn rank_groups<T, K, F, L, M>(
    items: &[T],
    key_of: F,
    label_of: L,
    metric_of: M,
    limit: usize,
) -> Vec<GroupRank<K>>
where
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
    L: Fn(&T) -> String,
    M: Fn(&T) -> f64,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<GroupRank<K>> = Vec::new();

    for item in items {
        let key = key_of(item);
        let metric = metric_of(item);
        match index.get(&key) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.count += 1;
                group.average += (metric - group.average) / group.count as f64;
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(GroupRank {
                    key,
                    label: label_of(item),
                    count: 1,
                    average: metric,
                });
            }
        }
    }

    groups.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.average.total_cmp(&a.average))
    });
    groups.truncate(limit);
    groups
}
