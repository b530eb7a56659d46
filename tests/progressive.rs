#![cfg(feature = "test")]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dash_loader::clock::Clock;
use dash_loader::prelude::*;
use dash_loader::test::movie;
use dash_loader::test::taxonomy;
use dash_loader::test::ManualClock;
use dash_loader::test::ScriptedSource;
use futures::StreamExt;
use strum::IntoEnumIterator;

fn service_for(source: &Arc<ScriptedSource>) -> DashboardService<ScriptedSource> {
    DashboardService::builder()
        .source(source.clone())
        .build()
        .expect("service builds")
}

fn service_with_clock(source: &Arc<ScriptedSource>, clock: &Arc<ManualClock>) -> DashboardService<ScriptedSource> {
    let cache = StatCache::builder()
        .clock(clock.clone() as Arc<dyn Clock>)
        .build()
        .expect("cache builds");

    DashboardService::builder()
        .source(source.clone())
        .cache(cache)
        .build()
        .expect("service builds")
}

fn action() -> TaxonomyStat {
    TaxonomyStat {
        id:          "c1".to_string(),
        name:        "Action".to_string(),
        slug:        "action".to_string(),
        movie_count: 5,
    }
}

fn script_everything(source: &ScriptedSource) {
    source
        .respond(StatPayload::Categories(vec![action()]))
        .respond(StatPayload::Countries(vec![taxonomy("vn", 12)]))
        .respond(StatPayload::TopRated(vec![TopRatedMovie {
            movie:          movie("dune", 900),
            average_rating: 4.8,
            rating_count:   31,
        }]))
        .respond(StatPayload::TopViewed(vec![movie("dune", 900), movie("heat", 450)]))
        .respond(StatPayload::TopFavorite(vec![TopFavoriteMovie::new(movie("heat", 450), 17)]))
        .respond(StatPayload::TopCommented(vec![TopCommentedMovie::new(movie("alien", 300), 8)]))
        .respond(StatPayload::ViewStats(ViewStats {
            period:      ViewPeriod::Month,
            total_views: 1350,
            data:        vec![ViewPoint {
                date:  "2024-05-01".to_string(),
                views: 1350,
            }],
        }));
}

#[tokio::test]
async fn core_update_carries_partial_results() {
    let source = Arc::new(ScriptedSource::new());
    source
        .respond(StatPayload::Categories(vec![action()]))
        .fail(StatKey::Countries, "connection refused");
    let service = service_for(&source);

    let updates = Mutex::new(Vec::new());
    let stats = service
        .load_progressive(|update: &StageUpdate| updates.lock().unwrap().push(update.clone()))
        .await;

    let updates = updates.into_inner().unwrap();
    assert_eq!(
        updates[0],
        StageUpdate::Core {
            category_stats: vec![action()],
            country_stats:  vec![],
        }
    );
    assert_eq!(stats.category_stats, vec![action()]);
    assert!(stats.country_stats.is_empty());
}

#[tokio::test]
async fn stages_are_reported_in_order() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_for(&source);

    // For each callback: the stage and how many calls later stages had already received.
    let seen = Mutex::new(Vec::new());
    service
        .load_progressive(|update: &StageUpdate| {
            let ahead = match update.stage() {
                Stage::Core => source.calls(StatKey::TopRated) + source.calls(StatKey::TopFavorite),
                Stage::Movies => source.calls(StatKey::TopFavorite),
                Stage::Additional => 0,
            };
            seen.lock().unwrap().push((update.stage(), ahead));
        })
        .await;

    assert_eq!(
        seen.into_inner().unwrap(),
        vec![(Stage::Core, 0), (Stage::Movies, 0), (Stage::Additional, 0)]
    );
}

#[tokio::test]
async fn total_failure_yields_empty_defaults() {
    let source = Arc::new(ScriptedSource::new());
    for key in StatKey::iter() {
        source.fail(key, "backend down");
    }
    let service = service_for(&source);

    let stats = service.load_progressive_default().await;

    assert_eq!(stats, DashboardStats::default());
    assert_eq!(stats.view_stats.period, ViewPeriod::Month);
    assert_eq!(source.total_calls(), 7);
    assert!(service.cache_status().is_empty());
}

#[tokio::test]
async fn progressive_load_uses_small_limits() {
    let source = Arc::new(ScriptedSource::new());
    let service = service_for(&source);

    service.load_progressive_default().await;

    for call in source.call_log().iter() {
        match call.key {
            StatKey::Categories | StatKey::Countries => assert_eq!(call.limit, None),
            StatKey::ViewStats => {
                assert_eq!(call.limit, Some(30));
                assert_eq!(call.period, Some(ViewPeriod::Month));
            }
            _ => assert_eq!(call.limit, Some(5), "{:?}", call.key),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn fetches_within_a_stage_overlap() {
    let source = Arc::new(ScriptedSource::new());
    source
        .delay(StatKey::Categories, Duration::from_millis(100))
        .delay(StatKey::Countries, Duration::from_millis(100))
        .delay(StatKey::TopRated, Duration::from_millis(50));
    let service = service_for(&source);

    let started = tokio::time::Instant::now();
    service.load_progressive_default().await;
    let elapsed = started.elapsed();

    assert_eq!(source.max_in_flight(), 2);
    assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(250), "{elapsed:?}");
}

#[tokio::test]
async fn repeated_load_is_served_from_cache() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_for(&source);

    let first = service.load_progressive_default().await;
    let second = service.load_progressive_default().await;

    assert_eq!(first, second);
    assert_eq!(source.total_calls(), 7);
    assert_eq!(service.cache_status().len(), 7);
    assert!(service.cache_status().values().all(|s| s.valid));

    service.clear_cache().await;
    assert!(service.cache_status().is_empty());

    service.load_progressive_default().await;
    assert_eq!(source.total_calls(), 14);
}

#[tokio::test]
async fn stale_data_survives_a_failed_refresh() {
    let clock = Arc::new(ManualClock::new());
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_with_clock(&source, &clock);

    service.load_progressive_default().await;
    clock.advance(Duration::from_secs(301));
    source.fail(StatKey::Categories, "timeout");

    let stats = service.load_progressive_default().await;

    assert_eq!(stats.category_stats, vec![action()]);
    assert_eq!(source.calls(StatKey::Categories), 2);

    let status = service.cache_status();
    assert_eq!(status["categories"].age_secs, 301);
    assert!(!status["categories"].valid);
    assert!(status["countries"].valid);
    assert_eq!(status["countries"].age_secs, 0);
}

#[tokio::test]
async fn stream_yields_three_updates_in_order() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_for(&source);

    let stream = service.progressive_stream();
    assert_eq!(source.total_calls(), 0);

    let updates = stream.collect::<Vec<_>>().await;
    assert_eq!(
        updates.iter().map(|u| u.stage()).collect::<Vec<_>>(),
        vec![Stage::Core, Stage::Movies, Stage::Additional]
    );

    let mut merged = DashboardStats::default();
    for update in &updates {
        merged.absorb(update);
    }
    // The progressive loader asks for five top movies, the fixtures have fewer.
    assert_eq!(merged.top_viewed.len(), 2);
    assert_eq!(merged.view_stats.total_views, 1350);
    assert_eq!(merged, service.load_progressive_default().await);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_load_cancels_later_stages() {
    let source = Arc::new(ScriptedSource::new());
    source.delay(StatKey::TopRated, Duration::from_secs(10));
    let service = service_for(&source);

    let res = tokio::time::timeout(Duration::from_secs(1), service.load_progressive_default()).await;
    assert!(res.is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(StatKey::TopFavorite), 0);
    assert!(!service.cache_status().contains_key("topRated"));
}

#[tokio::test(start_paused = true)]
async fn fetch_timeout_counts_as_failure() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    source.delay(StatKey::Countries, Duration::from_secs(5));

    let service: DashboardService<ScriptedSource> = DashboardService::builder()
        .source(source.clone())
        .fetch_timeout(Duration::from_secs(1))
        .build()
        .expect("service builds");

    let stats = service.load_progressive_default().await;

    assert_eq!(stats.category_stats, vec![action()]);
    assert!(stats.country_stats.is_empty());
    assert!(!service.cache_status().contains_key("countries"));
}

#[tokio::test(start_paused = true)]
async fn optimized_load_returns_with_essentials() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    source
        .fail(StatKey::TopCommented, "500")
        .delay(StatKey::TopRated, Duration::from_secs(10))
        .delay(StatKey::TopViewed, Duration::from_secs(10))
        .delay(StatKey::TopFavorite, Duration::from_secs(20))
        .delay(StatKey::TopCommented, Duration::from_secs(20))
        .delay(StatKey::ViewStats, Duration::from_secs(20));
    let service = service_for(&source);

    let mut handle = service.load_optimized().await;

    let stats = handle.stats();
    assert_eq!(stats.category_stats, vec![action()]);
    assert_eq!(stats.country_stats.len(), 1);
    assert!(stats.top_rated.is_empty());

    let status = handle.status();
    assert_eq!(status.get(StatKey::Categories), LoadState::Loaded);
    assert_eq!(status.get(StatKey::Countries), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopRated), LoadState::Loading);
    assert!(!handle.is_settled());

    assert!(handle.changed().await);
    let status = handle.status();
    assert_eq!(status.get(StatKey::TopRated), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopViewed), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopFavorite), LoadState::Loading);
    assert_eq!(handle.stats().top_viewed.len(), 2);

    let (stats, status) = handle.finish().await;
    assert!(status.is_settled());
    assert_eq!(status.get(StatKey::TopCommented), LoadState::Error);
    assert_eq!(status.get(StatKey::ViewStats), LoadState::Loaded);
    assert_eq!(stats.top_favorite[0].favorite_count(), 17);
    assert!(stats.top_commented.is_empty());

    for call in source.call_log().iter() {
        if call.key.is_limited() && call.key != StatKey::ViewStats {
            assert_eq!(call.limit, Some(10), "{:?}", call.key);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_aborts_background_groups() {
    let source = Arc::new(ScriptedSource::new());
    source
        .delay(StatKey::TopRated, Duration::from_secs(10))
        .delay(StatKey::TopViewed, Duration::from_secs(10))
        .delay(StatKey::TopFavorite, Duration::from_secs(10))
        .delay(StatKey::TopCommented, Duration::from_secs(10))
        .delay(StatKey::ViewStats, Duration::from_secs(10));
    let service = service_for(&source);

    let handle = service.load_optimized().await;
    drop(handle);

    tokio::time::sleep(Duration::from_secs(60)).await;

    let status = service.cache_status();
    assert!(status.contains_key("categories"));
    assert!(!status.contains_key("topRated"));
    assert!(!status.contains_key("viewStats"));
}

#[tokio::test]
async fn load_all_fills_every_field() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_for(&source);

    let stats = service.load_all().await;

    for key in StatKey::iter() {
        assert!(!stats.payload(key).is_empty(), "{key} is empty");
    }
    assert_eq!(source.total_calls(), 7);
}

#[tokio::test]
async fn load_all_is_not_served_short_lists_from_cache() {
    let source = Arc::new(ScriptedSource::new());
    let viewed = (0..12u64).map(|i| movie(&format!("m{i}"), 1000 - i)).collect::<Vec<_>>();
    source.respond(StatPayload::TopViewed(viewed));
    let service = service_for(&source);

    let progressive = service.load_progressive_default().await;
    assert_eq!(progressive.top_viewed.len(), 5);

    let stats = service.load_all().await;
    assert_eq!(stats.top_viewed.len(), 10);
    assert_eq!(source.calls(StatKey::TopViewed), 2);
    assert!(source
        .call_log()
        .iter()
        .any(|c| c.key == StatKey::TopViewed && c.limit == Some(10)));

    // The full list replaced the short one, so the next progressive load reuses it.
    let again = service.load_progressive_default().await;
    assert_eq!(again.top_viewed.len(), 10);
    assert_eq!(source.calls(StatKey::TopViewed), 2);
}

#[tokio::test]
async fn load_all_failure_leaves_default_over_cached_value() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    let service = service_for(&source);

    service.load_progressive_default().await;
    source.fail(StatKey::Categories, "backend down");

    let stats = service.load_all().await;

    assert!(stats.category_stats.is_empty());
    assert_eq!(stats.country_stats, vec![taxonomy("vn", 12)]);
    assert_eq!(source.calls(StatKey::Categories), 2);
    // The cached entry is left alone.
    assert!(service.cache_status().contains_key("categories"));
    assert_eq!(service.load_progressive_default().await.category_stats, vec![action()]);
}

#[tokio::test(start_paused = true)]
async fn optimized_optional_group_may_finish_first() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    source
        .delay(StatKey::TopRated, Duration::from_secs(20))
        .delay(StatKey::TopViewed, Duration::from_secs(20))
        .delay(StatKey::TopFavorite, Duration::from_secs(10))
        .delay(StatKey::TopCommented, Duration::from_secs(10))
        .delay(StatKey::ViewStats, Duration::from_secs(10));
    let service = service_for(&source);

    let mut handle = service.load_optimized().await;
    assert_eq!(handle.status().count(LoadState::Loading), 5);

    assert!(handle.changed().await);
    let status = handle.status();
    assert_eq!(status.get(StatKey::TopFavorite), LoadState::Loaded);
    assert_eq!(status.get(StatKey::ViewStats), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopRated), LoadState::Loading);
    assert!(!handle.is_settled());
    assert!(handle.stats().top_rated.is_empty());
    assert_eq!(handle.stats().top_favorite[0].favorite_count(), 17);

    assert!(handle.changed().await);
    assert!(handle.is_settled());
    assert_eq!(handle.status().get(StatKey::TopRated), LoadState::Loaded);

    let (stats, status) = handle.finish().await;
    assert!(status.is_settled());
    assert_eq!(status.count(LoadState::Loaded), 7);
    assert_eq!(stats.top_viewed.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn optimized_group_settled_before_essentials_is_already_visible() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    source
        .delay(StatKey::Categories, Duration::from_secs(10))
        .delay(StatKey::Countries, Duration::from_secs(10))
        .delay(StatKey::TopFavorite, Duration::from_secs(20))
        .delay(StatKey::TopCommented, Duration::from_secs(20))
        .delay(StatKey::ViewStats, Duration::from_secs(20));
    let service = service_for(&source);

    let mut handle = service.load_optimized().await;

    // The movies group beat the essentials, its results are part of the initial snapshot.
    let status = handle.status();
    assert_eq!(status.get(StatKey::Categories), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopRated), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopViewed), LoadState::Loaded);
    assert_eq!(status.get(StatKey::TopFavorite), LoadState::Loading);
    assert_eq!(handle.stats().top_viewed.len(), 2);
    assert!(!handle.is_settled());

    // The next change is the remaining group, not a replay of the one already seen.
    assert!(handle.changed().await);
    assert!(handle.is_settled());
    assert_eq!(handle.status().get(StatKey::TopCommented), LoadState::Loaded);

    let (stats, status) = handle.finish().await;
    assert!(status.is_settled());
    assert_eq!(stats.top_commented[0].comment_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn optimized_load_settled_on_return_reports_no_further_changes() {
    let source = Arc::new(ScriptedSource::new());
    script_everything(&source);
    source
        .fail(StatKey::TopRated, "500")
        .delay(StatKey::Categories, Duration::from_secs(10))
        .delay(StatKey::Countries, Duration::from_secs(10));
    let service = service_for(&source);

    let mut handle = service.load_optimized().await;

    assert!(handle.is_settled());
    assert_eq!(handle.status().get(StatKey::TopRated), LoadState::Error);
    assert!(!handle.changed().await);

    let (stats, status) = handle.finish().await;
    assert!(status.is_settled());
    assert_eq!(status.count(LoadState::Error), 1);
    assert!(stats.top_rated.is_empty());
    assert_eq!(stats.view_stats.total_views, 1350);
}
