use std::time::Instant;

use pcd_exporter::OccupancySink;
use pcd_parser::{nuscenes::table::Scene, Dataset};

use crate::{
    aggregator::{AggregatorConfig, FrameWindowAggregator},
    error::AlignError,
    static_bg::StaticCache,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scenes: usize,
    /// Names of the scenes that stopped on an error.
    pub failed_scenes: Vec<String>,
    pub samples: usize,
    pub points: usize,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed_scenes.is_empty()
    }
}

/// Walks every scene of a dataset and aggregates each of its keyframes in order.
pub struct SequenceRunner {
    config: AggregatorConfig,
    cache: StaticCache,
}

impl SequenceRunner {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            cache: StaticCache::new(),
        }
    }

    pub fn cache(&self) -> &StaticCache {
        &self.cache
    }

    /// Processes all scenes. A failing scene is logged and skipped; the others still run.
    pub fn run<D: Dataset + ?Sized>(
        &mut self,
        dataset: &D,
        sink: &mut dyn OccupancySink,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        for scene in dataset.scenes() {
            summary.scenes += 1;
            match self.run_scene(dataset, scene, sink, &mut summary) {
                Ok(()) => log::info!("finished scene {}", scene.name),
                Err(err) => {
                    log::error!("scene {} failed: {}", scene.name, err);
                    summary.failed_scenes.push(scene.name.clone());
                }
            }
        }
        summary
    }

    fn run_scene<D: Dataset + ?Sized>(
        &mut self,
        dataset: &D,
        scene: &Scene,
        sink: &mut dyn OccupancySink,
        summary: &mut RunSummary,
    ) -> Result<(), AlignError> {
        self.cache.reset();
        let aggregator = FrameWindowAggregator::new(dataset, self.config.clone());

        let mut next = Some(scene.first_sample_token.clone());
        while let Some(token) = next {
            let start = Instant::now();
            let stats = aggregator.aggregate(&token, &mut self.cache, sink)?;
            log::debug!(
                "sample {}: {} target + {} keyframe + {} intermediate points, {} written in {:?}",
                token,
                stats.target,
                stats.keyframe,
                stats.intermediate,
                stats.written,
                start.elapsed()
            );
            summary.samples += 1;
            summary.points += stats.merged();
            next = dataset.sample(&token)?.next.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingSink, SyntheticDataset, SyntheticFrame};
    use pcd_parser::nuscenes::token::SampleDataToken;

    fn scene(prefix: &str) -> Vec<SyntheticFrame> {
        vec![
            SyntheticFrame::keyframe(&format!("{prefix}k0"), 0.0, vec![([5.0, 0.0, 0.0], 24)]),
            SyntheticFrame::sweep(&format!("{prefix}s0"), 0.5, vec![[4.5, 0.0, 0.0]]),
            SyntheticFrame::keyframe(&format!("{prefix}k1"), 1.0, vec![([4.0, 0.0, 0.0], 24)]),
        ]
    }

    #[test]
    fn test_runs_every_sample_of_every_scene() {
        let mut dataset = SyntheticDataset::new();
        dataset.push_scene("a", scene("a"));
        dataset.push_scene("b", scene("b"));
        let mut runner = SequenceRunner::new(AggregatorConfig::default());
        let mut sink = RecordingSink::default();

        let summary = runner.run(&dataset, &mut sink);
        assert!(summary.is_success());
        assert_eq!(summary.scenes, 2);
        assert_eq!(summary.samples, 4);

        let files: Vec<&str> = sink.written.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(files, vec!["ak0.pcd.bin", "ak1.pcd.bin", "bk0.pcd.bin", "bk1.pcd.bin"]);
    }

    #[test]
    fn test_cache_does_not_leak_across_scenes() {
        let mut dataset = SyntheticDataset::new();
        dataset.push_scene("a", scene("a"));
        dataset.push_scene("b", scene("b"));
        let mut runner = SequenceRunner::new(AggregatorConfig::default());

        runner.run(&dataset, &mut RecordingSink::default());
        assert!(!runner.cache().contains(&SampleDataToken::from("as0")));
        assert!(runner.cache().contains(&SampleDataToken::from("bs0")));
        assert_eq!(runner.cache().len(), 1);
    }

    #[test]
    fn test_failed_scene_does_not_stop_the_run() {
        let mut dataset = SyntheticDataset::new();
        dataset.push_scene("a", scene("a"));
        dataset.push_scene("b", scene("b"));
        dataset.remove_labels("ak1");
        let mut runner = SequenceRunner::new(AggregatorConfig::default());
        let mut sink = RecordingSink::default();

        let summary = runner.run(&dataset, &mut sink);
        assert!(!summary.is_success());
        assert_eq!(summary.failed_scenes, vec!["a".to_string()]);
        // ak0 needs ak1 as a neighbour, so scene a fails on its first sample
        assert_eq!(summary.samples, 2);
        assert_eq!(sink.written.len(), 2);
        assert_eq!(sink.written[0].0, "bk0.pcd.bin");
    }
}
