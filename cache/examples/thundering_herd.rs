use fibre_coalesce::CacheBuilder;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tokio::time::{sleep, Duration};

// A simulated database or slow external service.
async fn fetch_from_database(key: i32, load_count: Arc<AtomicUsize>) -> Result<String, String> {
  println!("--- Database: Received request for key {}. Simulating slow query...", key);
  load_count.fetch_add(1, Ordering::SeqCst);
  sleep(Duration::from_millis(500)).await;
  Ok(format!("value_for_{}", key))
}

#[tokio::main]
async fn main() {
  let load_counter = Arc::new(AtomicUsize::new(0));

  let cache = CacheBuilder::<i32, String, String>::new()
    .capacity(100)
    .build()
    .expect("Failed to build cache");

  println!("--- Thundering Herd Demonstration ---");
  println!("Spawning 10 tasks to request the same key '42' at once.\n");

  let mut tasks = Vec::new();
  for i in 0..10 {
    let cache = cache.clone();
    let counter = load_counter.clone();
    tasks.push(tokio::spawn(async move {
      println!("[Task {}] Requesting key 42...", i);
      let value = cache
        .get(&42, move || fetch_from_database(42, counter))
        .await
        .expect("load failed");
      println!("[Task {}] Received value: {}", i, value);
      assert_eq!(value.as_str(), "value_for_42");
    }));
  }

  for task in tasks {
    task.await.unwrap();
  }

  println!("\n--- Verification ---");
  println!(
    "Database function was called {} time(s).",
    load_counter.load(Ordering::SeqCst)
  );
  assert_eq!(load_counter.load(Ordering::SeqCst), 1);

  let metrics = cache.metrics();
  println!("Hits: {}, misses: {}", metrics.hits, metrics.misses);
}
