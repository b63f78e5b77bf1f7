use super::*;
use crate::test_support::{movie, MockLookup, MockRadarr, MockServer, ServerCall};
use media_sync_models::IdentityMapping;
use std::io::Write;
use std::sync::Mutex;
use tempfile::TempDir;

fn url(id: u32) -> String {
    format!("https://boxd.it/{}", id)
}

/// Resolver whose store maps `https://boxd.it/<id>` -> `id` for each id
fn resolver(dir: &TempDir, ids: &[u32]) -> IdResolver {
    let storage = IdCacheStorage::open(&dir.path().join("map.csv")).unwrap();
    for id in ids {
        storage.append(&IdentityMapping::new(url(*id), TmdbId(*id))).unwrap();
    }
    IdResolver::new(storage, None, IdResolverConfig::default()).unwrap()
}

fn row(id: u32) -> ExportRow {
    ExportRow::new(format!("Film {}", id), url(id))
}

fn rated(id: u32, score: &str) -> ExportRow {
    row(id).with_score(score)
}

fn rated_movie(key: &str, tmdb_id: u32, rating: f64) -> MediaItem {
    let mut item = movie(key, "Rated", tmdb_id);
    item.user_rating = Some(rating);
    item
}

fn watched_movie(key: &str, tmdb_id: u32) -> MediaItem {
    let mut item = movie(key, "Seen", tmdb_id);
    item.view_count = 2;
    item
}

async fn run(server: &MockServer, resolver: &IdResolver, kind: SyncKind, rows: &[ExportRow]) -> PassReport {
    let items = server.library_items(&LibrarySelector::FirstMovieLibrary).await.unwrap();
    let index = MediaIndex::from_items(items);
    Reconciler::new(server, &index, resolver).run(kind, rows).await.unwrap()
}

#[tokio::test]
async fn test_ratings_only_writes_changes() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2, 3]);
    let server = MockServer::new(vec![
        movie("a", "Unrated", 1),
        rated_movie("b", 2, 8.0),
        rated_movie("c", 3, 6.0),
    ]);

    let report = run(
        &server,
        &resolver,
        SyncKind::Ratings,
        &[rated(1, "4.5"), rated(2, "4"), rated(3, "0.5")],
    )
    .await;

    assert_eq!(
        server.writes(),
        vec![ServerCall::Rate("a".into(), 9.0), ServerCall::Rate("c".into(), 1.0)]
    );
    assert_eq!(report.applied, 2);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn test_ratings_skip_unusable_rows() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2, 3]);
    let server = MockServer::new(vec![movie("a", "Owned", 1)]);

    let rows = vec![
        rated(1, "7"),
        row(1),
        rated(2, "3"),
        ExportRow::new("Unmapped", "https://boxd.it/zzz").with_score("3"),
    ];
    let report = run(&server, &resolver, SyncKind::Ratings, &rows).await;

    assert!(server.writes().is_empty());
    assert_eq!(report.invalid, 2);
    assert_eq!(report.not_owned, 1);
    assert_eq!(report.unresolved, 1);
}

#[tokio::test]
async fn test_duplicate_rows_write_once() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1]);
    let server = MockServer::new(vec![movie("a", "Film", 1)]);

    run(&server, &resolver, SyncKind::Ratings, &[rated(1, "3"), rated(1, "3")]).await;
    run(&server, &resolver, SyncKind::Watched, &[row(1), row(1)]).await;

    assert_eq!(
        server.writes(),
        vec![ServerCall::Rate("a".into(), 6.0), ServerCall::Played("a".into())]
    );
}

#[tokio::test]
async fn test_later_duplicate_with_new_score_is_applied() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1]);
    let server = MockServer::new(vec![movie("a", "Film", 1)]);

    run(&server, &resolver, SyncKind::Ratings, &[rated(1, "3"), rated(1, "4")]).await;

    assert_eq!(
        server.writes(),
        vec![ServerCall::Rate("a".into(), 6.0), ServerCall::Rate("a".into(), 8.0)]
    );
}

#[tokio::test]
async fn test_watched_skips_played_and_survives_failures() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2, 3]);
    let server = MockServer::new(vec![
        watched_movie("a", 1),
        movie("b", "Broken", 2),
        movie("c", "Unseen", 3),
    ])
    .failing("b");

    let report = run(&server, &resolver, SyncKind::Watched, &[row(1), row(2), row(3)]).await;

    assert_eq!(
        server.writes(),
        vec![ServerCall::Played("b".into()), ServerCall::Played("c".into())]
    );
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn test_already_in_sync_makes_zero_writes() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2]);
    let server = MockServer::new(vec![rated_movie("a", 1, 7.0), watched_movie("b", 2)])
        .with_watchlist(&["plex://movie/a"]);

    run(&server, &resolver, SyncKind::Ratings, &[rated(1, "3.5")]).await;
    run(&server, &resolver, SyncKind::Watched, &[row(2)]).await;
    run(&server, &resolver, SyncKind::Watchlist, &[row(1)]).await;

    assert!(server.writes().is_empty());
}

#[tokio::test]
async fn test_watchlist_membership_by_native_guid() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2, 3]);
    let server = MockServer::new(vec![movie("a", "Listed", 1), movie("b", "New", 2)])
        .with_watchlist(&["plex://movie/a"]);

    let report = run(&server, &resolver, SyncKind::Watchlist, &[row(1), row(2), row(2), row(3)]).await;

    assert_eq!(server.writes(), vec![ServerCall::AddToWatchlist("plex://movie/b".into())]);
    assert_eq!(report.applied, 1);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.not_owned, 1);
}

#[tokio::test]
async fn test_watchlist_rejection_does_not_stop_the_pass() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1, 2]);
    let server = MockServer::new(vec![movie("a", "Refused", 1), movie("b", "Fine", 2)])
        .rejecting("plex://movie/a");

    let report = run(&server, &resolver, SyncKind::Watchlist, &[row(1), row(2)]).await;

    assert_eq!(server.writes().len(), 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.error_counts.get("rejected"), Some(&1));
    assert_eq!(report.applied, 1);
}

#[tokio::test]
async fn test_watchlist_fetch_failure_fails_the_pass() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1]);
    let server = MockServer::new(vec![movie("a", "Film", 1)]).failing_watchlist();
    let index = MediaIndex::from_items(vec![movie("a", "Film", 1)]);

    let result = Reconciler::new(&server, &index, &resolver)
        .run(SyncKind::Watchlist, &[row(1)])
        .await;
    assert!(result.is_err());
    assert!(server.writes().is_empty());
}

#[tokio::test]
async fn test_discover_fallback_is_opt_in() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[5]);
    let index = MediaIndex::default();
    let server = MockServer::new(Vec::new()).with_discoverable(movie("5d77", "Elsewhere", 5));

    let report = Reconciler::new(&server, &index, &resolver)
        .run(SyncKind::Watchlist, &[row(5)])
        .await
        .unwrap();
    assert!(server.calls().is_empty());
    assert_eq!(report.not_owned, 1);

    let report = Reconciler::new(&server, &index, &resolver)
        .with_discover_fallback(true)
        .run(SyncKind::Watchlist, &[row(5), row(5)])
        .await
        .unwrap();
    assert_eq!(
        server.calls(),
        vec![
            ServerCall::FindByTmdb(TmdbId(5)),
            ServerCall::AddToWatchlist("plex://movie/5d77".into()),
        ]
    );
    assert_eq!(report.applied, 1);
    assert_eq!(report.unchanged, 1);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(&dir, &[1]);
    let server = MockServer::new(vec![movie("a", "Film", 1)]);
    let index = MediaIndex::from_items(vec![movie("a", "Film", 1)]);
    let reconciler = Reconciler::new(&server, &index, &resolver).with_dry_run(true);

    let ratings = reconciler.run(SyncKind::Ratings, &[rated(1, "5")]).await.unwrap();
    let watched = reconciler.run(SyncKind::Watched, &[row(1)]).await.unwrap();
    let watchlist = reconciler.run(SyncKind::Watchlist, &[row(1)]).await.unwrap();

    assert!(server.writes().is_empty());
    assert_eq!(ratings.applied + watched.applied + watchlist.applied, 3);
}

struct Exports {
    dir: TempDir,
}

impl Exports {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, name: &str, lines: &[String]) {
        let mut file = std::fs::File::create(self.dir.path().join(name)).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn paths(&self) -> ExportPaths {
        ExportPaths {
            ratings_csv: self.dir.path().join("ratings.csv"),
            watchlist_csv: self.dir.path().join("watchlist.csv"),
            watched_csv: self.dir.path().join("watched.csv"),
            mapping_csv: None,
        }
    }

    fn mapping_path(&self) -> PathBuf {
        self.dir.path().join("data").join("lb_URL_to_tmdb_id.csv")
    }
}

fn export_line(id: u32, score: Option<&str>) -> String {
    match score {
        Some(score) => format!("2024-01-01,Film {},2000,{},{}", id, url(id), score),
        None => format!("2024-01-01,Film {},2000,{}", id, url(id)),
    }
}

#[tokio::test]
async fn test_orchestrator_runs_passes_in_order() {
    let exports = Exports::new();
    exports.write("watched.csv", &["Date,Name,Year,Letterboxd URI".into(), export_line(1, None)]);
    exports.write(
        "ratings.csv",
        &["Date,Name,Year,Letterboxd URI,Rating".into(), export_line(1, Some("4"))],
    );
    exports.write(
        "watchlist.csv",
        &["Date,Name,Year,Letterboxd URI".into(), export_line(1, None), export_line(2, None)],
    );

    let server = Arc::new(MockServer::new(vec![movie("a", "Film", 1)]));
    let lookup = Arc::new(MockLookup::new().with(&url(1), TmdbId(1)).with(&url(2), TmdbId(2)));
    let radarr = Arc::new(MockRadarr::new());
    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&phases);

    let options = SyncOptions {
        sync_acquisition: true,
        ..SyncOptions::default()
    };
    let orchestrator = SyncOrchestrator::new(server.clone(), exports.mapping_path(), exports.paths())
        .with_lookup(Some(lookup.clone()))
        .with_acquisition(Some(radarr.clone()), AcquisitionSettings::default())
        .with_sync_options(options)
        .with_phase_callback(Box::new(move |phase| seen.lock().unwrap().push(phase)));

    let result = orchestrator.sync().await.unwrap();

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(
        server.writes(),
        vec![
            ServerCall::Played("a".into()),
            ServerCall::Rate("a".into(), 8.0),
            ServerCall::AddToWatchlist("plex://movie/a".into()),
        ]
    );
    assert_eq!(radarr.added_ids(), vec![2]);
    let names: Vec<&str> = result.passes.iter().map(|p| p.pass.as_str()).collect();
    assert_eq!(names, vec!["watched", "ratings", "watchlist", "acquisition"]);

    // url(1) is shared by all three exports and looked up once
    assert_eq!(lookup.calls(), vec![url(1), url(2)]);
    assert_eq!(result.resolve.resolved, 2);
    let store = std::fs::read_to_string(exports.mapping_path()).unwrap();
    assert_eq!(store.lines().count(), 2);

    let phases = phases.lock().unwrap();
    assert_eq!(phases.first(), Some(&SyncPhase::LoadingMappings));
    assert_eq!(phases.last(), Some(&SyncPhase::Pass("acquisition")));
}

#[tokio::test]
async fn test_missing_export_only_fails_its_pass() {
    let exports = Exports::new();
    exports.write("watched.csv", &["Date,Name,Year,Letterboxd URI".into(), export_line(1, None)]);
    exports.write("watchlist.csv", &["Date,Name,Year,Letterboxd URI".into()]);

    let server = Arc::new(MockServer::new(vec![movie("a", "Film", 1)]));
    let lookup = Arc::new(MockLookup::new().with(&url(1), TmdbId(1)));
    let orchestrator = SyncOrchestrator::new(server.clone(), exports.mapping_path(), exports.paths())
        .with_lookup(Some(lookup));

    let result = orchestrator.sync().await.unwrap();

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("ratings export"));
    assert_eq!(server.writes(), vec![ServerCall::Played("a".into())]);
    assert_eq!(result.passes.len(), 2);
}

#[tokio::test]
async fn test_library_failure_is_fatal() {
    let exports = Exports::new();
    let server = Arc::new(MockServer::new(Vec::new()).failing_library());
    let orchestrator = SyncOrchestrator::new(server, exports.mapping_path(), exports.paths());

    assert!(orchestrator.sync().await.is_err());
}

#[tokio::test]
async fn test_acquisition_without_radarr_is_reported() {
    let exports = Exports::new();
    exports.write("watchlist.csv", &["Date,Name,Year,Letterboxd URI".into()]);
    let server = Arc::new(MockServer::new(Vec::new()));
    let options = SyncOptions {
        sync_watched: false,
        sync_ratings: false,
        sync_watchlist: false,
        sync_acquisition: true,
        ..SyncOptions::default()
    };
    let orchestrator =
        SyncOrchestrator::new(server, exports.mapping_path(), exports.paths()).with_sync_options(options);

    let result = orchestrator.sync().await.unwrap();
    assert_eq!(result.errors, vec!["acquisition pass: Radarr is not configured".to_string()]);
    assert!(result.passes.is_empty());
}

/// Library state after `writes` have landed on `items`
fn after_writes(items: &[MediaItem], writes: &[ServerCall]) -> MockServer {
    let mut items = items.to_vec();
    let mut watchlist = Vec::new();
    for call in writes {
        match call {
            ServerCall::Rate(key, rating) => {
                if let Some(item) = items.iter_mut().find(|i| &i.rating_key == key) {
                    item.user_rating = Some(*rating);
                }
            }
            ServerCall::Played(key) => {
                if let Some(item) = items.iter_mut().find(|i| &i.rating_key == key) {
                    item.view_count += 1;
                }
            }
            ServerCall::AddToWatchlist(guid) => watchlist.push(guid.as_str()),
            ServerCall::RemoveFromWatchlist(_) | ServerCall::FindByTmdb(_) => {}
        }
    }
    MockServer::new(items).with_watchlist(&watchlist)
}

#[tokio::test]
async fn test_second_run_after_sync_is_a_no_op() {
    let exports = Exports::new();
    exports.write(
        "watched.csv",
        &["Date,Name,Year,Letterboxd URI".into(), export_line(1, None), export_line(2, None)],
    );
    exports.write(
        "ratings.csv",
        &[
            "Date,Name,Year,Letterboxd URI,Rating".into(),
            export_line(1, Some("3.5")),
            export_line(2, Some("5")),
        ],
    );
    exports.write(
        "watchlist.csv",
        &["Date,Name,Year,Letterboxd URI".into(), export_line(3, None)],
    );
    let items = vec![movie("a", "First", 1), rated_movie("b", 2, 4.0), movie("c", "Third", 3)];
    let lookup = Arc::new(
        MockLookup::new()
            .with(&url(1), TmdbId(1))
            .with(&url(2), TmdbId(2))
            .with(&url(3), TmdbId(3)),
    );

    let first = Arc::new(MockServer::new(items.clone()));
    let result = SyncOrchestrator::new(first.clone(), exports.mapping_path(), exports.paths())
        .with_lookup(Some(lookup.clone()))
        .sync()
        .await
        .unwrap();
    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(first.writes().len(), 5);

    let second = Arc::new(after_writes(&items, &first.writes()));
    let result = SyncOrchestrator::new(second.clone(), exports.mapping_path(), exports.paths())
        .with_lookup(Some(lookup.clone()))
        .sync()
        .await
        .unwrap();

    assert!(result.is_success(), "{:?}", result.errors);
    assert!(second.writes().is_empty());
    assert_eq!(result.applied(), 0);
    assert_eq!(result.resolve.cached, 3);
    assert_eq!(lookup.calls().len(), 3);
}

#[tokio::test]
async fn test_new_mapping_is_stored_and_rating_scaled() {
    let exports = Exports::new();
    exports.write(
        "ratings.csv",
        &[
            "Date,Name,Year,Letterboxd URI,Rating".into(),
            export_line(603, Some("5")),
        ],
    );
    let server = Arc::new(MockServer::new(vec![rated_movie("matrix", 603, 8.0)]));
    let lookup = Arc::new(MockLookup::new().with(&url(603), TmdbId(603)));
    let options = SyncOptions {
        sync_watched: false,
        sync_watchlist: false,
        ..SyncOptions::default()
    };

    let result = SyncOrchestrator::new(server.clone(), exports.mapping_path(), exports.paths())
        .with_lookup(Some(lookup.clone()))
        .with_sync_options(options)
        .sync()
        .await
        .unwrap();

    assert!(result.is_success(), "{:?}", result.errors);
    assert_eq!(lookup.calls(), vec![url(603)]);
    assert_eq!(server.writes(), vec![ServerCall::Rate("matrix".into(), 10.0)]);
    let store = std::fs::read_to_string(exports.mapping_path()).unwrap();
    assert_eq!(store.lines().collect::<Vec<_>>(), vec![format!("{},603", url(603))]);
}
