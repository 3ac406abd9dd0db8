//! The development flow: build, serve, watch

use std::process::ExitCode;

use super::{RunOptions, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{
    BuildContext, NullProgress, ProgressEvent, ProgressReporter, Scheduler, TaskGraph,
};
use crate::server::{DevServer, LiveReload};
use crate::tasks::Tasks;
use crate::watch::{watch_and_rebuild, WatchOptions};

/// Build the development graph, then serve the output and rebuild on change.
///
/// Task failures are reported and the session keeps going; only a failure to
/// start the server or the watcher ends it.
pub fn run_dev(ctx: BuildContext, graph: &TaskGraph, options: RunOptions) -> ExitCode {
    let reload = LiveReload::new();
    let scheduler = Scheduler::new().with_jobs(ctx.jobs());
    let tasks = Tasks::new(ctx.clone()).with_live_reload(reload.clone());

    let progress = options.reporter();
    match scheduler.run(graph, &tasks, progress.as_ref()) {
        Ok(result) if !result.is_success() => {
            eprintln!("Initial build had failures; serving what was built");
        }
        Ok(_) => {}
        Err(e) => {
            progress.report(ProgressEvent::Error { message: e.to_string() });
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let out_dir = ctx.out_dir();
    let server = match DevServer::start(&ctx.config().server, &out_dir, reload.clone()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    println!("Serving {} at {}", out_dir.display(), server.url());
    println!("Press Ctrl+C to stop");

    // Watch output replaces per-task progress unless asked for
    let rebuild_progress: Box<dyn ProgressReporter> =
        if options.json || options.verbose { options.reporter() } else { Box::new(NullProgress) };

    let watch_options = WatchOptions {
        src_dir: ctx.src_dir(),
        out_dir,
        config: ctx.config().watch.clone(),
        verbose: options.verbose,
    };
    let outcome = watch_and_rebuild(&watch_options, graph, Some(&reload), |subgraph| {
        scheduler.run(subgraph, &tasks, rebuild_progress.as_ref())
    });

    server.shutdown();
    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
