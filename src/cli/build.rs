//! One-shot builds and dry runs

use std::process::ExitCode;

use super::{RunOptions, EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{
    BuildContext, BuildResult, GraphError, ProgressEvent, ProgressReporter, Scheduler, TaskGraph,
};
use crate::tasks::Tasks;

/// Run a graph once; any failed or blocked task makes the exit code non-zero.
pub fn run_build(ctx: BuildContext, graph: &TaskGraph, options: RunOptions) -> ExitCode {
    let src_dir = ctx.src_dir();
    if !src_dir.exists() {
        eprintln!("Warning: Source directory not found: {}", src_dir.display());
    }

    let scheduler = Scheduler::new().with_jobs(ctx.jobs());
    let tasks = Tasks::new(ctx);
    let progress = options.reporter();

    let outcome = scheduler.run(graph, &tasks, progress.as_ref());
    exit_code(outcome, progress.as_ref())
}

/// Map a run's outcome to an exit code, reporting a graph that could not run.
fn exit_code(outcome: Result<BuildResult, GraphError>, progress: &dyn ProgressReporter) -> ExitCode {
    match outcome {
        Ok(result) if result.is_success() => ExitCode::from(EXIT_SUCCESS),
        Ok(_) => ExitCode::from(EXIT_ERROR),
        Err(e) => {
            progress.report(ProgressEvent::Error { message: e.to_string() });
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Print what a run would do, in execution order.
pub fn dry_run(ctx: &BuildContext, graph: &TaskGraph) -> ExitCode {
    match plan(ctx, graph) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn plan(ctx: &BuildContext, graph: &TaskGraph) -> Result<Vec<String>, crate::build::GraphError> {
    let mut lines = vec![
        "Dry run - would run:".to_string(),
        format!("  Source: {}", ctx.src_dir().display()),
        format!("  Output: {}", ctx.out_dir().display()),
        format!("  Tasks: {}", graph.len()),
    ];

    for task in graph.topological_order()? {
        let deps = graph.dependencies(task);
        if deps.is_empty() {
            lines.push(format!("    - {}", task));
        } else {
            let after: Vec<&str> = deps.iter().map(|d| d.name()).collect();
            lines.push(format!("    - {} (after {})", task, after.join(", ")));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::flows::production_graph;
    use crate::config::default_config;
    use crate::tasks::TaskId;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::Error { message } = event {
                self.0.lock().unwrap().push(message);
            }
        }
    }

    #[test]
    fn test_graph_error_is_reported() {
        let recorder = Recorder::default();
        let code = exit_code(Err(GraphError::CyclicDependency(TaskId::Styles)), &recorder);

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_ERROR)));
        let messages = recorder.0.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("styles"));
    }

    #[test]
    fn test_successful_run_reports_nothing() {
        let recorder = Recorder::default();
        let code = exit_code(Ok(BuildResult::new()), &recorder);

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::from(EXIT_SUCCESS)));
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_plan_lists_tasks_in_order() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/site"));
        let lines = plan(&ctx, &production_graph()).unwrap();

        assert_eq!(lines[1], "  Source: /site/source");
        assert_eq!(lines[2], "  Output: /site/build");
        assert_eq!(lines[3], "  Tasks: 9");
        assert_eq!(lines[4], "    - clean");
        assert_eq!(lines[5], "    - copy (after clean)");
        assert_eq!(lines[6], "    - optimize-images (after copy)");
        assert_eq!(lines[7], "    - styles (after optimize-images)");
        assert_eq!(lines.len(), 13);
    }
}
