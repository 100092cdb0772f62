use fibre_coalesce::{CacheBuilder, EvictionReason};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

// A stand-in for a remote store that records the order writes arrive in.
#[derive(Default)]
struct RemoteStore {
  log: Mutex<Vec<(String, u32)>>,
}

impl RemoteStore {
  async fn persist(&self, key: String, value: u32, latency: Duration) -> Result<(), String> {
    sleep(latency).await;
    if value == 0 {
      return Err(format!("refusing to store zero for {}", key));
    }
    self.log.lock().await.push((key, value));
    Ok(())
  }
}

#[tokio::main]
async fn main() {
  let store = Arc::new(RemoteStore::default());

  let cache = CacheBuilder::<String, u32, String>::new()
    .capacity(10)
    .default_ttl(Duration::from_secs(60))
    .cleanup_interval(Duration::from_secs(5))
    .eviction_listener(|key: String, reason: EvictionReason| {
      println!("[Listener] '{}' left the cache: {}", key, reason);
    })
    .build()
    .expect("Failed to build cache");

  // The first write is slow, the second fast. Writes for one key still reach
  // the store in submission order.
  let latencies = [300u64, 10, 50];
  let mut pending = Vec::new();
  for (value, latency) in (1u32..).zip(latencies) {
    let store = store.clone();
    let result = cache.save("counter".to_string(), value, move |key, value| async move {
      store.persist(key, *value, Duration::from_millis(latency)).await
    });
    pending.push(result);
  }

  for result in pending {
    println!("Write settled: {:?}", result.await.map(|v| *v));
  }
  println!("Store log: {:?}", store.log.lock().await);

  // A failed save surfaces to its caller and drops the entry.
  let store_for_save = store.clone();
  let failed = cache
    .save("counter".to_string(), 0, move |key, value| async move {
      store_for_save.persist(key, *value, Duration::ZERO).await
    })
    .await;
  println!("Zero write: {:?}", failed.map(|v| *v));
  println!("Entry still cached: {}", cache.contains_key(&"counter".to_string()));

  cache.destroy();
}
