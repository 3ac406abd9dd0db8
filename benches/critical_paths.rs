//! Criterion benchmarks for sitepipe critical paths
//!
//! - SVG: optimization of editor-exported files
//! - Sprite: bundling icon sets of growing size
//! - CSS: prefixing and minification of compiled stylesheets
//! - Scheduler: graph execution overhead with a no-op runner
//! - Live reload: client script injection into HTML pages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sitepipe::build::flows::production_graph;
use sitepipe::build::{NullProgress, Scheduler, TaskRunner};
use sitepipe::config::StylesConfig;
use sitepipe::server::livereload::inject_script;
use sitepipe::tasks::styles::{browser_targets, minify_css};
use sitepipe::tasks::sprite::build_sprite;
use sitepipe::tasks::svg::optimize;
use sitepipe::tasks::{TaskError, TaskId, TaskOutput};
use std::path::{Path, PathBuf};

// =============================================================================
// Test Data Generators
// =============================================================================

/// An editor-exported SVG with `shapes` paths and one gradient
fn make_svg(shapes: usize) -> String {
    let paths: String = (0..shapes)
        .map(|i| {
            format!(
                "  <path inkscape:label=\"p{i}\" sodipodi:nodetypes=\"cc\" fill=\"url(#grad)\" d=\"M{i} 0h10v10H{i}z\"/>\n"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\n<!-- exported -->\n<svg xmlns=\"http://www.w3.org/2000/svg\" \
         xmlns:inkscape=\"http://www.inkscape.org/namespaces/inkscape\" \
         xmlns:sodipodi=\"http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd\" viewBox=\"0 0 24 24\">\n\
         <metadata>editor</metadata>\n  <defs><linearGradient id=\"grad\"/></defs>\n{paths}</svg>\n"
    )
}

fn make_icons(count: usize) -> Vec<(PathBuf, String)> {
    (0..count).map(|i| (PathBuf::from(format!("img/icons/icon{i}.svg")), make_svg(4))).collect()
}

fn make_css(rules: usize) -> String {
    (0..rules)
        .map(|i| format!(".item-{i} {{\n  display: flex;\n  user-select: none;\n  color: #ff0000;\n}}\n"))
        .collect()
}

fn make_html(paragraphs: usize) -> Vec<u8> {
    let body: String = (0..paragraphs).map(|i| format!("<p>Paragraph {i}</p>\n")).collect();
    format!("<!doctype html><html><head></head><body>\n{body}</body></html>").into_bytes()
}

struct NoopRunner;

impl TaskRunner for NoopRunner {
    fn run_task(&self, _task: TaskId) -> Result<TaskOutput, TaskError> {
        Ok(TaskOutput::default())
    }
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_svg(c: &mut Criterion) {
    let mut group = c.benchmark_group("svg");

    for shapes in [10, 100, 1000].iter() {
        let svg = make_svg(*shapes);
        group.throughput(Throughput::Bytes(svg.len() as u64));
        group.bench_with_input(BenchmarkId::new("optimize", shapes), &svg, |b, svg| {
            b.iter(|| optimize(Path::new("bench.svg"), black_box(svg)))
        });
    }

    group.finish();
}

fn bench_sprite(c: &mut Criterion) {
    let mut group = c.benchmark_group("sprite");

    for count in [8, 64, 256].iter() {
        let icons = make_icons(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("build_sprite", count), &icons, |b, icons| {
            b.iter(|| build_sprite(black_box(icons)))
        });
    }

    group.finish();
}

fn bench_css(c: &mut Criterion) {
    let mut group = c.benchmark_group("css");
    let config = StylesConfig::default();

    for rules in [50, 500].iter() {
        let css = make_css(*rules);
        group.throughput(Throughput::Bytes(css.len() as u64));
        group.bench_with_input(BenchmarkId::new("minify_with_map", rules), &css, |b, css| {
            b.iter(|| {
                minify_css(
                    black_box(css),
                    Path::new("style.min.css"),
                    "style.scss",
                    browser_targets(&config.browsers),
                    true,
                )
            })
        });
    }

    group.finish();
}

fn bench_scheduler(c: &mut Criterion) {
    let graph = production_graph();
    let scheduler = Scheduler::new().with_jobs(4);

    c.bench_function("scheduler/production_graph_noop", |b| {
        b.iter(|| scheduler.run(black_box(&graph), &NoopRunner, &NullProgress))
    });
}

fn bench_inject(c: &mut Criterion) {
    let html = make_html(500);
    c.bench_function("livereload/inject_script", |b| b.iter(|| inject_script(black_box(&html))));
}

criterion_group!(benches, bench_svg, bench_sprite, bench_css, bench_scheduler, bench_inject);
criterion_main!(benches);
