use chrono::{Duration as ChronoDuration, Utc};
use fbstats::cache::{CacheStore, CacheType};
use fbstats::quota::QuotaMonitor;
use std::cell::Cell;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn cache_roundtrip_and_miss() {
    let cache = CacheStore::new();
    cache.set(CacheType::PlayerDetail, "k1", "payload".to_string(), None);

    assert_eq!(
        cache.get(CacheType::PlayerDetail, "k1"),
        Some("payload".to_string())
    );
    assert_eq!(cache.get(CacheType::PlayerDetail, "other"), None);
}

#[test]
fn expired_entries_miss_but_linger_until_swept() {
    let cache = CacheStore::new();
    cache.set(
        CacheType::LiveMatchDetail,
        "k1",
        "stale".to_string(),
        Some(Duration::ZERO),
    );

    // Lazy expiry: the read misses while the row still physically exists.
    assert_eq!(cache.get(CacheType::LiveMatchDetail, "k1"), None);
    assert_eq!(cache.len(), 1);

    assert_eq!(cache.cleanup_expired(), 1);
    assert!(cache.is_empty());
}

#[test]
fn get_or_fetch_calls_fetch_at_most_once() {
    let cache = CacheStore::new();
    let calls = Cell::new(0u32);

    let first = cache
        .get_or_fetch(CacheType::PlayerList, "k1", None, || {
            calls.set(calls.get() + 1);
            Ok(Some("fresh".to_string()))
        })
        .expect("fetch must succeed");
    assert_eq!(first, Some("fresh".to_string()));

    let second = cache
        .get_or_fetch(CacheType::PlayerList, "k1", None, || {
            calls.set(calls.get() + 1);
            Ok(Some("never used".to_string()))
        })
        .expect("cache hit must succeed");
    assert_eq!(second, Some("fresh".to_string()));
    assert_eq!(calls.get(), 1);
}

#[test]
fn empty_fetch_results_are_never_cached() {
    let cache = CacheStore::new();

    let none = cache
        .get_or_fetch(CacheType::PlayerList, "k1", None, || Ok(None))
        .expect("fetch must succeed");
    assert_eq!(none, None);
    assert!(cache.is_empty());

    let empty = cache
        .get_or_fetch(CacheType::PlayerList, "k1", None, || Ok(Some(String::new())))
        .expect("fetch must succeed");
    assert_eq!(empty, Some(String::new()));
    assert!(cache.is_empty());
}

#[test]
fn set_overwrites_by_key_regardless_of_type() {
    let cache = CacheStore::new();
    cache.set(CacheType::PlayerDetail, "k1", "old".to_string(), None);
    cache.set(CacheType::MatchDetail, "k1", "new".to_string(), None);

    assert_eq!(cache.len(), 1);
    assert_eq!(
        cache.get(CacheType::MatchDetail, "k1"),
        Some("new".to_string())
    );
}

#[test]
fn invalidate_by_key_and_by_type() {
    let cache = CacheStore::new();
    cache.set(CacheType::Lineup, "a", "1".to_string(), None);
    cache.set(CacheType::Lineup, "b", "2".to_string(), None);
    cache.set(CacheType::MatchDetail, "c", "3".to_string(), None);

    assert_eq!(cache.invalidate(CacheType::Lineup, Some("a")), 1);
    assert_eq!(cache.invalidate(CacheType::Lineup, None), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(CacheType::MatchDetail, "c"), Some("3".to_string()));
}

#[test]
fn cache_persists_across_load() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cache.json");

    let cache = CacheStore::new();
    cache.set(CacheType::TeamRosterList, "k1", "roster".to_string(), None);
    cache.save(&path).expect("save must succeed");

    let reloaded = CacheStore::load(&path).expect("load must succeed");
    assert_eq!(
        reloaded.get(CacheType::TeamRosterList, "k1"),
        Some("roster".to_string())
    );
}

#[test]
fn monthly_quota_reached_denies_requests() {
    let quota = QuotaMonitor::new(1_000, 100);
    for _ in 0..100 {
        quota.record_request("api.players.search", 200);
    }

    let decision = quota.can_make_request();
    assert!(!decision.allowed);
    assert_eq!(decision.reason, "monthly quota exceeded");
}

#[test]
fn monthly_critical_threshold_denies_before_the_cap() {
    let quota = QuotaMonitor::new(1_000, 100);
    for _ in 0..95 {
        quota.record_request("api.players.search", 200);
    }

    let decision = quota.can_make_request();
    assert!(!decision.allowed);
    assert!(decision.reason.contains("critical threshold"));
}

#[test]
fn below_thresholds_requests_are_allowed() {
    let quota = QuotaMonitor::new(1_000, 100);
    for _ in 0..70 {
        quota.record_request("api.players.search", 200);
    }

    let decision = quota.can_make_request();
    assert!(decision.allowed);
    assert_eq!(decision.reason, "OK");
}

#[test]
fn daily_quota_is_advisory_only() {
    let quota = QuotaMonitor::new(10, 10_000);
    for _ in 0..10 {
        quota.record_request("site.player_page", 200);
    }

    let decision = quota.can_make_request();
    assert!(decision.allowed);
    assert_eq!(decision.reason, "daily quota exceeded (advisory)");
}

#[test]
fn reservations_hold_quota_until_committed() {
    let quota = QuotaMonitor::new(1_000, 10);
    for _ in 0..8 {
        quota.record_request("site.player_page", 200);
    }

    // 8 recorded: the first reservation passes and books a slot.
    let first = quota.reserve();
    assert!(first.allowed);

    // With the slot in flight the next decision sees 9 of 10 and denies.
    let second = quota.reserve();
    assert!(!second.allowed);
    assert!(second.reason.contains("critical threshold"));

    quota.commit("site.player_page", 200);
    assert_eq!(quota.monthly_usage(None).count, 9);
}

#[test]
fn concurrent_reservations_never_exceed_the_monthly_cap() {
    let quota = std::sync::Arc::new(QuotaMonitor::new(1_000, 10));
    for _ in 0..8 {
        quota.record_request("site.player_page", 200);
    }

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let quota = std::sync::Arc::clone(&quota);
            std::thread::spawn(move || {
                let decision = quota.reserve();
                if decision.allowed {
                    quota.commit("site.player_page", 200);
                    1u64
                } else {
                    0
                }
            })
        })
        .collect();

    let admitted: u64 = handles
        .into_iter()
        .map(|h| h.join().expect("worker thread must not panic"))
        .sum();

    // Only one slot remains below the 90% critical line at 8 of 10.
    assert_eq!(admitted, 1);
    assert!(quota.monthly_usage(None).count <= 10);
}

#[test]
fn usage_summaries_report_remaining_budget() {
    let quota = QuotaMonitor::new(100, 3_000);
    for _ in 0..7 {
        quota.record_request("site.player_page", 200);
    }

    let daily = quota.daily_usage(None);
    assert_eq!(daily.count, 7);
    assert_eq!(daily.quota, 100);
    assert_eq!(daily.remaining, 93);

    let monthly = quota.monthly_usage(None);
    assert_eq!(monthly.count, 7);
    assert_eq!(monthly.remaining, 2_993);
}

#[test]
fn retention_prunes_old_rows_only() {
    let quota = QuotaMonitor::new(100, 3_000);
    let today = Utc::now().date_naive();
    let ancient = today - ChronoDuration::days(120);

    quota.record_request_on("site.player_page", 200, ancient);
    quota.record_request_on("site.player_page", 200, today);

    assert_eq!(quota.prune_older_than(90), 1);
    assert_eq!(quota.daily_usage(Some(today)).count, 1);
    assert_eq!(quota.daily_usage(Some(ancient)).count, 0);
}

#[test]
fn usage_persists_across_load() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("usage.json");

    let quota = QuotaMonitor::new(100, 3_000);
    quota.record_request("api.fixtures", 200);
    quota.record_request("api.fixtures", 200);
    quota.save(&path).expect("save must succeed");

    let reloaded = QuotaMonitor::load(&path, 100, 3_000).expect("load must succeed");
    assert_eq!(reloaded.daily_usage(None).count, 2);
}
