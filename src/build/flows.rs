//! The two public task graphs.
//!
//! Both flows share one shape: clean, then copy, then an image stage, then the
//! asset tasks in parallel. They differ only in which image task fills the
//! image stage.

use crate::build::context::{BuildContext, BuildMode};
use crate::build::graph::TaskGraph;
use crate::config::SiteConfig;
use crate::tasks::TaskId;

/// Tasks that run in parallel once images are in place.
pub const ASSET_TASKS: [TaskId; 6] =
    [TaskId::Styles, TaskId::Html, TaskId::Scripts, TaskId::Svg, TaskId::Sprite, TaskId::Webp];

/// One-shot production build: images are always recompressed.
pub fn production_graph() -> TaskGraph {
    pipeline(TaskId::OptimizeImages)
}

/// Development build: images follow the configured `images.dev` policy.
pub fn development_graph(config: &SiteConfig) -> TaskGraph {
    pipeline(config.images.dev.task())
}

/// The graph for a context's build mode.
pub fn graph_for(ctx: &BuildContext) -> TaskGraph {
    match ctx.mode() {
        BuildMode::Production => production_graph(),
        BuildMode::Development => development_graph(ctx.config()),
    }
}

fn pipeline(images: TaskId) -> TaskGraph {
    TaskGraph::new().then(TaskId::Clean).then(TaskId::Copy).then(images).then_all(&ASSET_TASKS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_config, ImagePolicy};
    use TaskId::*;

    fn position(order: &[TaskId], task: TaskId) -> usize {
        order.iter().position(|t| *t == task).unwrap()
    }

    #[test]
    fn test_production_graph_order() {
        let graph = production_graph();
        let order = graph.topological_order().unwrap();

        assert_eq!(order.len(), 9);
        assert_eq!(&order[..3], &[Clean, Copy, OptimizeImages]);
        for task in ASSET_TASKS {
            assert!(position(&order, task) > position(&order, OptimizeImages));
            assert_eq!(graph.dependencies(task), &[OptimizeImages]);
        }
        assert!(!graph.contains(CopyImages));
    }

    #[test]
    fn test_asset_tasks_are_independent() {
        let graph = production_graph();
        for task in ASSET_TASKS {
            assert!(graph.dependents(task).is_empty());
        }
    }

    #[test]
    fn test_development_graph_uses_dev_policy() {
        let mut config = default_config();
        assert!(development_graph(&config).contains(CopyImages));

        config.images.dev = ImagePolicy::Changed;
        let graph = development_graph(&config);
        assert!(graph.contains(ChangedImages));
        assert!(!graph.contains(CopyImages));
        assert_eq!(graph.dependencies(Sprite), &[ChangedImages]);
    }

    #[test]
    fn test_graph_for_mode() {
        let ctx = BuildContext::new(default_config(), std::path::PathBuf::from("/site"));
        assert!(graph_for(&ctx).contains(OptimizeImages));
        let dev = ctx.with_mode(BuildMode::Development);
        assert!(graph_for(&dev).contains(CopyImages));
    }

    #[test]
    fn test_clean_reaches_whole_graph() {
        let graph = production_graph();
        assert_eq!(graph.downstream(Clean).unwrap().len(), graph.len());
        assert_eq!(graph.downstream(Styles).unwrap(), vec![Styles]);
    }
}
