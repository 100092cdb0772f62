use fibre_coalesce::{CacheBuilder, CacheConfig};
use std::time::Duration;

#[test]
fn test_parse_humantime_durations() {
  let config: CacheConfig = serde_json::from_str(
    r#"{ "capacity": 500, "default_ttl": "30s", "cleanup_interval": "5m" }"#,
  )
  .unwrap();

  assert_eq!(config.capacity, 500);
  assert_eq!(config.default_ttl, Some(Duration::from_secs(30)));
  assert_eq!(config.cleanup_interval, Some(Duration::from_secs(300)));
}

#[test]
fn test_optional_durations_may_be_omitted() {
  let config: CacheConfig = serde_json::from_str(r#"{ "capacity": 10 }"#).unwrap();
  assert_eq!(config, CacheConfig::new(10));
}

#[test]
fn test_missing_capacity_is_an_error() {
  let parsed = serde_json::from_str::<CacheConfig>(r#"{ "default_ttl": "1s" }"#);
  assert!(parsed.is_err());
}

#[test]
fn test_serialize_round_trips_through_humantime() {
  let config = CacheConfig {
    capacity: 20,
    default_ttl: Some(Duration::from_millis(1500)),
    cleanup_interval: None,
  };
  let json = serde_json::to_string(&config).unwrap();
  assert!(json.contains("\"1s 500ms\""), "unexpected encoding: {json}");

  let back: CacheConfig = serde_json::from_str(&json).unwrap();
  assert_eq!(back, config);
}

#[tokio::test]
async fn test_parsed_config_builds_a_cache() {
  let config: CacheConfig =
    serde_json::from_str(r#"{ "capacity": 16, "default_ttl": "1h" }"#).unwrap();
  let cache = CacheBuilder::<&'static str, u32, String>::from_config(&config)
    .build()
    .unwrap();

  cache.put("k", 1).await.unwrap();
  assert!(cache.contains_key(&"k"));
}
