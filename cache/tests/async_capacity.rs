mod common;

use common::{recording_cache, CAPACITY};
use fibre_coalesce::EvictionReason;

const KEYS: [&str; 26] = [
  "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
  "T", "U", "V", "W", "X", "Y", "Z",
];

#[tokio::test]
async fn test_size_never_exceeds_capacity() {
  let (cache, evictions) = recording_cache();

  for (i, key) in KEYS.iter().copied().enumerate() {
    cache.put(key, i as u32);
    assert!(cache.len() <= CAPACITY, "size exceeded capacity after put");

    let other = KEYS[(i * 7) % KEYS.len()];
    let _ = cache.get(&other, || async { Ok(0) });
    assert!(cache.len() <= CAPACITY, "size exceeded capacity after get");
  }

  assert_eq!(cache.len(), CAPACITY);
  let evicted = evictions.lock();
  assert!(evicted
    .iter()
    .all(|(_, reason)| *reason == EvictionReason::Capacity));
  assert_eq!(cache.metrics().evicted_by_capacity, evicted.len() as u64);
}

#[tokio::test]
async fn test_overflow_evicts_least_recently_inserted() {
  let (cache, evictions) = recording_cache();

  for (i, key) in KEYS.iter().copied().take(CAPACITY + 1).enumerate() {
    cache.put(key, i as u32).await.unwrap();
  }

  assert_eq!(cache.len(), CAPACITY);
  assert!(!cache.contains_key(&"A"), "A was the least recently touched");
  assert!(cache.contains_key(&"K"));
  assert_eq!(*evictions.lock(), vec![("A", EvictionReason::Capacity)]);
}

#[tokio::test]
async fn test_get_exempts_key_from_eviction() {
  let (cache, evictions) = recording_cache();

  // Fill the cache with A..J.
  for (i, key) in KEYS.iter().copied().take(CAPACITY).enumerate() {
    cache.put(key, i as u32).await.unwrap();
  }
  assert_eq!(cache.len(), CAPACITY);

  // Touch A so B becomes the least recently used.
  let a = cache.get(&"A", || async { Ok(999) }).await.unwrap();
  assert_eq!(*a, 0, "A must be served from the cache");
  assert_eq!(cache.keys().first(), Some(&"A"));
  assert_eq!(cache.keys().last(), Some(&"B"));

  cache.put("K", 10).await.unwrap();

  assert_eq!(cache.len(), CAPACITY);
  assert!(cache.contains_key(&"A"));
  assert!(!cache.contains_key(&"B"));
  assert_eq!(*evictions.lock(), vec![("B", EvictionReason::Capacity)]);
}

#[tokio::test]
async fn test_recency_order_tracks_reads_and_writes() {
  let (cache, _) = recording_cache();

  for key in ["A", "B", "C"] {
    cache.put(key, 1);
  }
  assert_eq!(cache.keys(), vec!["C", "B", "A"]);

  let _ = cache.get(&"A", || async { Ok(0) });
  assert_eq!(cache.keys(), vec!["A", "C", "B"]);

  cache.put("B", 2);
  assert_eq!(cache.keys(), vec!["B", "A", "C"]);

  // Peeking and membership checks do not count as use.
  let _ = cache.peek(&"C");
  assert!(cache.contains_key(&"C"));
  assert_eq!(cache.keys(), vec!["B", "A", "C"]);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
  let (cache, evictions) = recording_cache();

  for key in ["A", "B", "C"] {
    cache.put(key, 1);
  }

  assert!(cache.invalidate(&"B"));
  assert!(!cache.invalidate(&"B"), "invalidate is idempotent");
  assert!(!cache.contains_key(&"B"));
  assert_eq!(cache.len(), 2);
  assert_eq!(*evictions.lock(), vec![("B", EvictionReason::Invalidated)]);
  assert_eq!(cache.metrics().invalidations, 1);

  cache.clear();
  assert_eq!(cache.len(), 0);
  assert!(cache.is_empty());
  assert!(cache.keys().is_empty());
  assert_eq!(evictions.lock().len(), 1, "clear does not report evictions");

  // The cache stays usable after clear.
  assert_eq!(*cache.put("A", 5).await.unwrap(), 5);
  assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_evicted_pending_load_still_settles() {
  let (cache, _) = recording_cache();

  let pending = cache.get(&"A", || async {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Ok(1)
  });
  for (i, key) in KEYS.iter().copied().skip(1).take(CAPACITY).enumerate() {
    cache.put(key, i as u32);
  }

  assert!(!cache.contains_key(&"A"));
  assert_eq!(*pending.await.unwrap(), 1, "eviction never cancels a load");
  assert!(!cache.contains_key(&"A"), "a finished load is not re-inserted");
}
