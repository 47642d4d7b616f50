//! Scrape loop scenarios against canned member lists.
//!
//! FixtureFeed → Scraper::run() → assert on the store, the dataset file and
//! what the feed saw. No browser, no network, zero delays.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use constellation_scout::testing::{FixtureFeed, FixtureMember, MockImageFetcher};
use constellation_scout::{
    CollectionStore, Profile, ProfileExtractor, ScrapeConfig, ScrapeError, ScrapeReport,
    ScrapeSession, Scraper, SelectorConfig, SettleReason, UpsertPolicy,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn handle(i: usize) -> String {
    format!("member{i:02}")
}

fn enriched(i: usize) -> FixtureMember {
    FixtureMember::with_card(
        &handle(i),
        &format!("Member {i}"),
        &format!("Bio of member {i} <img alt=\"✨\" src=\"sparkle.svg\">"),
        &format!("{i}.5K"),
    )
}

fn bare(i: usize) -> FixtureMember {
    FixtureMember::without_card(&handle(i), &format!("Member {i}"))
}

fn dataset(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("profiles.json")
}

fn read_dataset(path: &Path) -> Vec<Profile> {
    let raw = std::fs::read_to_string(path).expect("dataset written");
    serde_json::from_str(&raw).expect("dataset parses")
}

async fn scrape(
    feed: &FixtureFeed,
    images: &MockImageFetcher,
    path: &Path,
    config: ScrapeConfig,
) -> (Result<ScrapeReport, ScrapeError>, CollectionStore) {
    let store = CollectionStore::load(path, config.upsert_policy).expect("dataset loads");
    let mut session = ScrapeSession::new(store);
    let extractor = ProfileExtractor::new(&SelectorConfig::default()).unwrap();
    let scraper = Scraper::new(feed, images, extractor, config, path);
    let result = scraper.run(&mut session).await;
    (result, session.into_store())
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn thirty_rows_over_three_passes_with_ten_missing_cards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let members: Vec<_> = (1..=30)
        .map(|i| if i <= 20 { enriched(i) } else { bare(i) })
        .collect();
    let feed = FixtureFeed::windows(members, 10);
    let images = MockImageFetcher::new();

    let (result, store) = scrape(&feed, &images, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    let profiles = read_dataset(&path);
    assert_eq!(profiles.len(), 30);
    assert_eq!(store.len(), 30);

    let unique: HashSet<_> = profiles.iter().map(|p| p.handle.as_str()).collect();
    assert_eq!(unique.len(), 30, "no duplicate handles");

    let with_followers = profiles.iter().filter(|p| p.followers.is_some()).count();
    let with_bio = profiles.iter().filter(|p| !p.bio.is_empty()).count();
    assert_eq!(with_followers, 20);
    assert_eq!(with_bio, 20);

    for p in &profiles[20..] {
        assert_eq!(p.followers, None);
        assert_eq!(p.bio, "");
        assert!(!p.handle.is_empty());
        assert!(!p.name.is_empty());
    }

    let first = &profiles[0];
    assert_eq!(first.handle, "member01");
    assert_eq!(first.name, "Member 1");
    assert_eq!(first.bio, "Bio of member 1 ✨");
    assert_eq!(first.followers, Some(1_500));

    assert_eq!(report.stats.collected, 30);
    assert_eq!(report.stats.degraded, 10);
    assert_eq!(report.settle_reason, SettleReason::Stagnant);
    // Two productive scrolls, then five stagnant ones.
    assert_eq!(report.scrolls, 7);
    assert_eq!(feed.scrolls(), 7);
}

#[tokio::test]
async fn dataset_order_is_first_seen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::windows((1..=12).map(enriched).collect(), 4);

    scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();

    let handles: Vec<_> = read_dataset(&path).into_iter().map(|p| p.handle).collect();
    let expected: Vec<_> = (1..=12).map(handle).collect();
    assert_eq!(handles, expected);
}

// ---------------------------------------------------------------------------
// Dedup and resume
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_passes_process_each_handle_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![
        vec![enriched(1), enriched(2), enriched(3)],
        vec![enriched(2), enriched(3), enriched(4)],
        vec![enriched(3), enriched(4), enriched(5)],
    ]);

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;
    result.unwrap();

    assert_eq!(store.len(), 5);
    let hovered = feed.hovered_handles();
    let expected: Vec<_> = (1..=5).map(handle).collect();
    assert_eq!(hovered, expected);
}

#[tokio::test]
async fn second_run_over_the_same_page_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let members = || -> Vec<FixtureMember> {
        (1..=15).map(|i| if i % 3 == 0 { bare(i) } else { enriched(i) }).collect()
    };

    let first_feed = FixtureFeed::windows(members(), 5);
    let first_images = MockImageFetcher::new();
    scrape(&first_feed, &first_images, &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();
    let after_first = std::fs::read_to_string(&path).unwrap();

    let second_feed = FixtureFeed::windows(members(), 5);
    let images = MockImageFetcher::new().with_saved(first_images.saved());
    let (result, store) = scrape(&second_feed, &images, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(report.stats.collected, 0);
    assert_eq!(store.len(), 15);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
    assert!(second_feed.hovered_handles().is_empty());
    assert!(images.requests().is_empty());
}

#[tokio::test]
async fn failed_avatar_is_retried_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);

    let first_feed = FixtureFeed::windows((1..=4).map(enriched).collect(), 4);
    let first_images = MockImageFetcher::new().failing_for("member02");
    let first = scrape(&first_feed, &first_images, &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();
    assert_eq!(first.stats.avatar_failures, 1);
    let after_first = std::fs::read_to_string(&path).unwrap();

    let second_feed = FixtureFeed::windows((1..=4).map(enriched).collect(), 4);
    let images = MockImageFetcher::new().with_saved(first_images.saved());
    let (result, store) = scrape(&second_feed, &images, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(images.requested_names(), vec!["member02".to_string()]);
    assert_eq!(
        images.requests()[0].0,
        "https://pbs.twimg.com/profile_images/1/member02_normal.jpg"
    );
    assert_eq!(report.stats.avatars_backfilled, 1);
    assert_eq!(report.stats.avatar_failures, 0);
    assert_eq!(report.stats.collected, 0);
    assert_eq!(store.len(), 4);
    assert!(second_feed.hovered_handles().is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
}

#[tokio::test]
async fn resumed_run_only_collects_new_members() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);

    let early = FixtureFeed::windows((1..=6).map(enriched).collect(), 3);
    scrape(&early, &MockImageFetcher::new(), &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();

    let grown = FixtureFeed::windows((1..=9).map(enriched).collect(), 3);
    let (result, store) = scrape(&grown, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;

    assert_eq!(result.unwrap().stats.collected, 3);
    assert_eq!(store.len(), 9);
    let expected: Vec<_> = (7..=9).map(handle).collect();
    assert_eq!(grown.hovered_handles(), expected);
}

#[tokio::test]
async fn refresh_policy_updates_existing_records_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);

    let before = FixtureFeed::new(vec![vec![enriched(1), enriched(2)]]);
    scrape(&before, &MockImageFetcher::new(), &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();

    let after = FixtureFeed::new(vec![vec![
        FixtureMember::with_card(&handle(1), "Member 1", "New bio", "9.9K"),
        enriched(2),
    ]]);
    let config = ScrapeConfig {
        upsert_policy: UpsertPolicy::Refresh,
        ..ScrapeConfig::immediate()
    };
    let (result, store) = scrape(&after, &MockImageFetcher::new(), &path, config).await;
    let report = result.unwrap();

    assert_eq!(report.stats.collected, 0);
    assert_eq!(report.stats.refreshed, 1);
    assert_eq!(store.len(), 2);
    let profiles = read_dataset(&path);
    assert_eq!(profiles[0].handle, "member01");
    assert_eq!(profiles[0].bio, "New bio");
    assert_eq!(profiles[0].followers, Some(9_900));
    assert_eq!(after.hovered_handles().len(), 2);
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn static_page_settles_after_exactly_five_stagnant_scrolls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![(1..=10).map(enriched).collect()]);

    let (result, _) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(report.settle_reason, SettleReason::Stagnant);
    assert_eq!(feed.scrolls(), 5);
}

#[tokio::test]
async fn empty_page_still_settles_and_writes_a_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![]);

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;

    assert_eq!(result.unwrap().settle_reason, SettleReason::Stagnant);
    assert!(store.is_empty());
    assert!(read_dataset(&path).is_empty());
    assert_eq!(feed.scrolls(), 5);
}

#[tokio::test]
async fn custom_stagnation_threshold_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![vec![enriched(1)]]);
    let config = ScrapeConfig {
        stagnation_threshold: 2,
        ..ScrapeConfig::immediate()
    };

    scrape(&feed, &MockImageFetcher::new(), &path, config).await.0.unwrap();

    assert_eq!(feed.scrolls(), 2);
}

#[tokio::test]
async fn scroll_cap_bounds_an_endless_feed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::windows((1..=50).map(bare).collect(), 1);
    let config = ScrapeConfig {
        max_scrolls: 10,
        ..ScrapeConfig::immediate()
    };

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, config).await;
    let report = result.unwrap();

    assert_eq!(report.settle_reason, SettleReason::ScrollCap);
    assert_eq!(feed.scrolls(), 10);
    // The member revealed by the last scroll is left for the next run.
    assert_eq!(store.len(), 10);
}

#[tokio::test]
async fn profile_limit_stops_mid_pass() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![(1..=10).map(enriched).collect()]);
    let config = ScrapeConfig {
        max_profiles: Some(4),
        ..ScrapeConfig::immediate()
    };

    let (result, _) = scrape(&feed, &MockImageFetcher::new(), &path, config).await;
    let report = result.unwrap();

    assert_eq!(report.settle_reason, SettleReason::ProfileLimit);
    assert_eq!(report.stats.collected, 4);
    assert_eq!(feed.scrolls(), 0);
    assert_eq!(read_dataset(&path).len(), 4);
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn checkpoint_on_disk_holds_every_25th_profile_before_the_next_hover() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let observed: Arc<Mutex<Vec<(String, Vec<Profile>)>>> = Arc::default();

    let hook_path = path.clone();
    let hook_observed = observed.clone();
    let feed = FixtureFeed::windows((1..=60).map(enriched).collect(), 20).on_hover(move |h| {
        if h == "member26" || h == "member51" {
            let on_disk = read_dataset(&hook_path);
            hook_observed.lock().unwrap().push((h.to_string(), on_disk));
        }
    });

    let (result, _) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 2);
    assert_eq!(observed[0].1.len(), 25);
    assert_eq!(observed[1].1.len(), 50);

    // A process killed at that moment restarts with at least those handles.
    let killed_at = dir.path().join("killed.json");
    std::fs::write(&killed_at, serde_json::to_string(&observed[0].1).unwrap()).unwrap();
    let restarted = CollectionStore::load(&killed_at, UpsertPolicy::KeepFirst).unwrap();
    let processed = restarted.processed_handles();
    for i in 1..=25 {
        assert!(processed.contains(&handle(i)));
    }

    // Two periodic checkpoints plus the final one.
    assert_eq!(report.stats.checkpoints, 3);
    assert_eq!(read_dataset(&path).len(), 60);
}

#[tokio::test]
async fn unwritable_dataset_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let path = blocker.join("profiles.json");
    let feed = FixtureFeed::new(vec![(1..=3).map(enriched).collect()]);
    let images = MockImageFetcher::new();

    let mut session = ScrapeSession::new(CollectionStore::new(UpsertPolicy::KeepFirst));
    let extractor = ProfileExtractor::new(&SelectorConfig::default()).unwrap();
    let scraper = Scraper::new(&feed, &images, extractor, ScrapeConfig::immediate(), &path);
    let result = scraper.run(&mut session).await;

    assert!(matches!(result, Err(ScrapeError::Storage(_))));
    // What was collected before the failed write is still in memory.
    assert_eq!(session.store.len(), 3);
}

// ---------------------------------------------------------------------------
// Recoverable failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_avatar_does_not_cost_the_profile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![(1..=4).map(enriched).collect()]);
    let images = MockImageFetcher::new().failing_for("member02");

    let (result, store) = scrape(&feed, &images, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(store.len(), 4);
    assert_eq!(report.stats.avatar_failures, 1);
    let failed = store.get("member02").unwrap();
    assert!(!failed.pfp_url.is_empty());
    assert_eq!(images.requests().len(), 4);
    assert_eq!(
        images.requests()[0],
        (
            "https://pbs.twimg.com/profile_images/1/member01_normal.jpg".to_string(),
            "member01".to_string()
        )
    );
}

#[tokio::test]
async fn member_without_avatar_is_not_a_download_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let faceless = || FixtureMember {
        handle: "faceless".to_string(),
        row_html: r#"<div data-testid="UserCell"><div data-testid="UserAvatar-Container-faceless"></div><a href="/faceless" role="link"><div dir="ltr"><span>Faceless</span></div></a></div>"#.to_string(),
        card_html: None,
    };

    let feed = FixtureFeed::new(vec![vec![enriched(1), faceless()]]);
    let images = MockImageFetcher::new();
    let (result, store) = scrape(&feed, &images, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(store.get("faceless").unwrap().pfp_url, "");
    assert_eq!(images.requested_names(), vec!["member01".to_string()]);
    assert_eq!(report.stats.avatar_failures, 0);

    // Resuming does not try to backfill it either.
    let again = FixtureFeed::new(vec![vec![enriched(1), faceless()]]);
    let images_again = MockImageFetcher::new().with_saved(images.saved());
    let (result, _) = scrape(&again, &images_again, &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert!(images_again.requests().is_empty());
    assert_eq!(report.stats.avatar_failures, 0);
    assert_eq!(report.stats.avatars_backfilled, 0);
}

#[tokio::test(start_paused = true)]
async fn card_left_over_from_the_previous_hover_is_waited_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed =
        FixtureFeed::new(vec![vec![enriched(1), enriched(2), bare(3)]]).lingering_cards(2);
    let config = ScrapeConfig {
        hover_card_timeout: Duration::from_millis(500),
        poll_interval: Duration::from_millis(10),
        ..ScrapeConfig::immediate()
    };

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, config).await;
    let report = result.unwrap();

    let second = store.get("member02").unwrap();
    assert_eq!(second.followers, Some(2_500));
    assert_eq!(second.bio, "Bio of member 2 ✨");

    // The stale card is the only one member03 ever gets, so it degrades.
    let third = store.get("member03").unwrap();
    assert_eq!(third.followers, None);
    assert_eq!(third.bio, "");
    assert_eq!(report.stats.degraded, 1);
}

#[tokio::test]
async fn detached_row_is_skipped_without_stalling_discovery() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![(1..=5).map(enriched).collect()]).detach("member03");

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;
    let report = result.unwrap();

    assert_eq!(store.len(), 4);
    assert!(!store.has("member03"));
    assert_eq!(report.stats.row_failures, 1);
    assert_eq!(feed.scrolls(), 5);
}

#[tokio::test]
async fn non_profile_rows_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![vec![
        FixtureMember::filler(r#"<div data-testid="UserCell"><span>Show more</span></div>"#),
        enriched(1),
        FixtureMember::filler(r#"<div data-testid="UserCell"></div>"#),
    ]]);

    let (result, store) = scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate()).await;
    result.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(feed.hovered_handles(), vec!["member01".to_string()]);
}

#[tokio::test]
async fn pointer_is_cleared_before_and_after_every_hover() {
    let dir = tempfile::tempdir().unwrap();
    let path = dataset(&dir);
    let feed = FixtureFeed::new(vec![(1..=3).map(enriched).collect()]);

    scrape(&feed, &MockImageFetcher::new(), &path, ScrapeConfig::immediate())
        .await
        .0
        .unwrap();

    assert_eq!(feed.clears(), 6);
}
