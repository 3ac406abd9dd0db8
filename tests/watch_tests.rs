//! Watch-mode rebuild selection against the real flows

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sitepipe::build::flows::{development_graph, production_graph};
use sitepipe::build::{BuildContext, BuildMode, NullProgress, Scheduler};
use sitepipe::config::{default_config, WatchRuleConfig};
use sitepipe::tasks::{TaskId, Tasks};
use sitepipe::watch::{needs_full_reload, rebuild_graph, tasks_for_changes, ErrorTracker, WatchRule};

fn default_rules() -> Vec<WatchRule> {
    WatchRule::from_config(&default_config().watch.rules).unwrap()
}

fn changed(src: &Path, relative: &[&str]) -> Vec<PathBuf> {
    relative.iter().map(|r| src.join(r)).collect()
}

#[test]
fn test_scss_change_rebuilds_styles_only() {
    let src = Path::new("/site/source");
    let triggered = tasks_for_changes(&default_rules(), src, &changed(src, &["sass/partials/_nav.scss"]));
    assert_eq!(triggered, vec![TaskId::Styles]);

    let graph = rebuild_graph(&development_graph(&default_config()), &triggered).unwrap();
    assert_eq!(graph.tasks(), &[TaskId::Styles]);
}

#[test]
fn test_html_change_rebuilds_everything() {
    let src = Path::new("/site/source");
    let triggered = tasks_for_changes(&default_rules(), src, &changed(src, &["index.html"]));
    assert_eq!(triggered, vec![TaskId::Clean]);

    let full = development_graph(&default_config());
    let graph = rebuild_graph(&full, &triggered).unwrap();
    assert_eq!(graph.len(), full.len());
}

#[test]
fn test_unwatched_files_trigger_nothing() {
    let src = Path::new("/site/source");
    let paths = changed(src, &["img/logo.png", "fonts/body.woff2", "pages/nested.html"]);
    assert!(tasks_for_changes(&default_rules(), src, &paths).is_empty());
}

#[test]
fn test_custom_rules_from_config() {
    let rules = WatchRule::from_config(&[
        WatchRuleConfig { pattern: "img/icons/*.svg".to_string(), task: "sprite".to_string() },
        WatchRuleConfig { pattern: "img/**/*.svg".to_string(), task: "svg".to_string() },
    ])
    .unwrap();

    let src = Path::new("/site/source");
    let triggered =
        tasks_for_changes(&rules, src, &changed(src, &["img/icons/close.svg", "img/diagram.svg"]));
    assert_eq!(triggered, vec![TaskId::Sprite, TaskId::Svg]);

    let graph = rebuild_graph(&production_graph(), &triggered).unwrap();
    assert_eq!(graph.len(), 2);
    assert!(graph.dependencies(TaskId::Sprite).is_empty());
}

#[test]
fn test_rebuild_cycle_tracks_fix() {
    let temp = TempDir::new().unwrap();
    let sass = temp.path().join("source/sass");
    fs::create_dir_all(&sass).unwrap();
    fs::write(sass.join("style.scss"), ".a { color: $missing; }\n").unwrap();

    let ctx = BuildContext::new(default_config(), temp.path().to_path_buf())
        .with_mode(BuildMode::Development);
    let tasks = Tasks::new(ctx.clone());
    let scheduler = Scheduler::new().with_jobs(2);
    let graph = rebuild_graph(&development_graph(ctx.config()), &[TaskId::Styles]).unwrap();
    let mut tracker = ErrorTracker::new();

    let broken = scheduler.run(&graph, &tasks, &NullProgress).unwrap();
    assert!(tracker.update(&broken).is_empty());
    assert!(tracker.has_errors());

    fs::write(sass.join("style.scss"), ".a { color: red; }\n").unwrap();
    let fixed = scheduler.run(&graph, &tasks, &NullProgress).unwrap();
    assert_eq!(tracker.update(&fixed), vec![TaskId::Styles]);
    assert!(!tracker.has_errors());

    // Styles-only rebuilds are injected, not reloaded
    assert!(!needs_full_reload(&fixed));
}
