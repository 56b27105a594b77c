mod common;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use symdex_api::FlagsProvider;
use symdex_core::tracker::FileState;
use symdex_core::{EngineConfig, IndexEngine};
use tempfile::TempDir;

use common::{FakeParser, toy_id};

fn config(cache: &TempDir, workers: usize) -> EngineConfig {
    EngineConfig {
        workers,
        cache_dir: Some(cache.path().to_path_buf()),
        ..EngineConfig::default()
    }
}

#[test]
fn parse_failure_keeps_the_prior_contribution_queryable() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def target\n").unwrap();

    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_config(config(&cache, 1))
        .build();

    engine.update_file(&lib).unwrap();
    engine.wait_settled();
    let generation = engine.snapshot().generation();

    fs::write(&lib, "def target\nfail\n").unwrap();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    // Last-good data stays served; only the tracker records trouble.
    assert_eq!(engine.tracker().state(&lib), FileState::Failed);
    assert!(engine.query().definition(toy_id("target")).is_some());
    assert_eq!(engine.snapshot().generation(), generation);

    // Fixing the file recovers without any special handling.
    fs::write(&lib, "def target\ndef fixed\n").unwrap();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();
    assert_eq!(engine.tracker().state(&lib), FileState::Fresh);
    assert!(engine.query().symbol(toy_id("fixed")).is_some());
    engine.shutdown();
}

#[test]
fn extraction_failure_is_contained_like_a_parse_failure() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def target\n").unwrap();

    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_config(config(&cache, 1))
        .build();

    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    fs::write(&lib, "def target\nbadextract\n").unwrap();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    assert_eq!(engine.tracker().state(&lib), FileState::Failed);
    assert!(engine.query().definition(toy_id("target")).is_some());
    engine.shutdown();
}

#[test]
fn unreadable_file_keeps_prior_entry_and_goes_failed() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def target\n").unwrap();

    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_config(config(&cache, 1))
        .build();

    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    // The file is still there but no longer decodable. That is not a
    // deletion: the contribution must survive.
    fs::write(&lib, b"\xff\xfe broken").unwrap();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    assert_eq!(engine.tracker().state(&lib), FileState::Failed);
    assert!(engine.query().definition(toy_id("target")).is_some());
    assert!(engine.snapshot().file_digest(&lib).is_some());

    fs::write(&lib, "def target\ndef fixed\n").unwrap();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();
    assert_eq!(engine.tracker().state(&lib), FileState::Fresh);
    assert!(engine.query().symbol(toy_id("fixed")).is_some());
    engine.shutdown();
}

#[test]
fn rapid_rewrites_settle_on_the_newest_content() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");

    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_config(config(&cache, 1))
        .build();

    for round in 0..10 {
        fs::write(&lib, format!("def v{round}_a\n")).unwrap();
        engine.update_file(&lib).unwrap();
        fs::write(&lib, format!("def v{round}_b\n")).unwrap();
        engine.update_file(&lib).unwrap();
        engine.wait_settled();

        let q = engine.query();
        assert!(q.symbol(toy_id(&format!("v{round}_a"))).is_none());
        assert!(q.symbol(toy_id(&format!("v{round}_b"))).is_some());
    }
    engine.shutdown();
}

/// Parks the first flag lookup until released; later lookups pass
/// straight through. Pins one worker between reading a file's content
/// and recording the observation.
#[derive(Default)]
struct FlagGate {
    state: Mutex<(bool, bool)>, // (entered, released)
    cv: Condvar,
}

impl FlagGate {
    fn hold(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.0 = true;
        self.cv.notify_all();
        while !guard.1 {
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn wait_entered(&self) {
        let mut guard = self.state.lock().unwrap();
        while !guard.0 {
            guard = self.cv.wait(guard).unwrap();
        }
    }

    fn release(&self) {
        let mut guard = self.state.lock().unwrap();
        guard.1 = true;
        self.cv.notify_all();
    }
}

struct GatedFlags {
    gate: Arc<FlagGate>,
    calls: AtomicUsize,
}

impl FlagsProvider for GatedFlags {
    fn flags_for(&self, _path: &Path) -> Vec<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.hold();
        }
        Vec::new()
    }
}

#[test]
fn delayed_task_cannot_overwrite_a_newer_index() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def v1\n").unwrap();

    let gate = Arc::new(FlagGate::default());
    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_flags_provider(Arc::new(GatedFlags {
            gate: Arc::clone(&gate),
            calls: AtomicUsize::new(0),
        }))
        .with_config(config(&cache, 2))
        .build();

    // The first worker reads v1 and parks before it can record the
    // observation.
    engine.update_file(&lib).unwrap();
    gate.wait_entered();

    // Meanwhile the file moves on and a second worker indexes v2.
    fs::write(&lib, "def v2\n").unwrap();
    engine.update_file(&lib).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.query().symbol(toy_id("v2")).is_none() {
        assert!(Instant::now() < deadline, "second version never landed");
        thread::sleep(Duration::from_millis(5));
    }

    // Waking the parked worker must not resurrect v1.
    gate.release();
    engine.wait_settled();

    let q = engine.query();
    assert!(q.symbol(toy_id("v1")).is_none());
    assert!(q.symbol(toy_id("v2")).is_some());
    engine.shutdown();
}

#[test]
fn persisted_cache_skips_parsing_across_restarts() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    let app = project.path().join("app.toy");
    fs::write(&lib, "def target\n").unwrap();
    fs::write(&app, "call target\ndep lib.toy\n").unwrap();

    let first_parser = FakeParser::new();
    let engine = IndexEngine::builder(first_parser.clone())
        .with_config(config(&cache, 1))
        .build();
    engine.update_file(&lib).unwrap();
    engine.update_file(&app).unwrap();
    engine.wait_settled();
    assert_eq!(first_parser.total_parses(), 2);
    assert!(engine.cache_enabled());
    engine.shutdown();

    // Second session over the same cache directory: every index is
    // served from disk, the parser is never consulted.
    let second_parser = FakeParser::new();
    let engine = IndexEngine::builder(second_parser.clone())
        .with_config(config(&cache, 1))
        .build();
    engine.update_file(&lib).unwrap();
    engine.update_file(&app).unwrap();
    engine.wait_settled();

    assert_eq!(second_parser.total_parses(), 0);
    let q = engine.query();
    assert_eq!(q.definition(toy_id("target")).unwrap().path, lib);
    assert_eq!(q.callers(toy_id("target")).len(), 1);
    engine.shutdown();
}

#[test]
fn stale_cache_entry_is_ignored_after_an_edit() {
    let project = TempDir::new().unwrap();
    let cache = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def target\n").unwrap();

    let first_parser = FakeParser::new();
    let engine = IndexEngine::builder(first_parser.clone())
        .with_config(config(&cache, 1))
        .build();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();
    engine.shutdown();

    fs::write(&lib, "def renamed\n").unwrap();

    let second_parser = FakeParser::new();
    let engine = IndexEngine::builder(second_parser.clone())
        .with_config(config(&cache, 1))
        .build();
    engine.update_file(&lib).unwrap();
    engine.wait_settled();

    assert_eq!(second_parser.total_parses(), 1);
    let q = engine.query();
    assert!(q.symbol(toy_id("target")).is_none());
    assert!(q.symbol(toy_id("renamed")).is_some());
    engine.shutdown();
}

#[test]
fn disabled_cache_runs_parse_only() {
    let project = TempDir::new().unwrap();
    let lib = project.path().join("lib.toy");
    fs::write(&lib, "def target\n").unwrap();

    let parser = FakeParser::new();
    let engine = IndexEngine::builder(parser.clone())
        .with_config(EngineConfig {
            workers: 1,
            enable_cache: false,
            ..EngineConfig::default()
        })
        .build();

    assert!(!engine.cache_enabled());
    engine.update_file(&lib).unwrap();
    engine.wait_settled();
    assert!(engine.query().definition(toy_id("target")).is_some());
    engine.shutdown();
}
