//! History Deduplicator (§4.D): collapse a `_history` feed's version chains
//! down to one operation per resource ID.

use std::collections::HashMap;

use crate::entry::PulledEntry;

/// Collapse `entries` to at most one entry per distinct resource ID.
///
/// The winner within a bucket is the entry with the greatest
/// `resource.meta.lastUpdated` among non-DELETE entries. A DELETE only wins
/// if it is the only entry for that ID, or if no other entry in the bucket
/// carries a timestamp (§4.D). Entries from which no ID can be extracted
/// are preserved in input order at the tail of the output.
pub fn deduplicate(entries: Vec<PulledEntry>) -> Vec<PulledEntry> {
    let mut buckets: HashMap<String, Vec<PulledEntry>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut unidentifiable: Vec<PulledEntry> = Vec::new();

    for entry in entries {
        match entry.extract_id().map(|id| (entry.resource_type().unwrap_or("").to_string(), id)) {
            Some((rt, id)) => {
                let key = format!("{rt}/{id}");
                if !buckets.contains_key(&key) {
                    order.push(key.clone());
                }
                buckets.entry(key).or_default().push(entry);
            }
            None => unidentifiable.push(entry),
        }
    }

    let mut out = Vec::with_capacity(order.len() + unidentifiable.len());
    for key in order {
        if let Some(bucket) = buckets.remove(&key)
            && let Some(winner) = pick_winner(bucket)
        {
            out.push(winner);
        }
    }
    out.extend(unidentifiable);
    out
}

fn pick_winner(bucket: Vec<PulledEntry>) -> Option<PulledEntry> {
    if bucket.len() == 1 {
        return bucket.into_iter().next();
    }

    let any_timestamped = bucket.iter().any(|e| e.last_updated().is_some());

    if any_timestamped {
        // DELETE entries never carry a timestamp, so they can never win
        // here: the greatest-`lastUpdated` non-DELETE entry wins.
        bucket
            .into_iter()
            .filter(|e| e.last_updated().is_some())
            .max_by_key(|e| e.last_updated().map(|ts| ts.to_string()))
    } else {
        // No entry in the bucket carries a timestamp: the one that
        // appeared last in the input wins (this is how a trailing DELETE
        // with no other timestamped update "wins").
        bucket.into_iter().next_back()
    }
}
