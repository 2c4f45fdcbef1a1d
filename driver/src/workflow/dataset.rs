use anyhow::{bail, Context};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use sensorlm::prelude::{SensorWindow, TaskMetadata};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct Record {
    data: Vec<Vec<f64>>,
    label: String,
}

/// Windows grouped by label, labels in order of first appearance.
#[derive(Debug, Default)]
pub struct LabeledPools {
    pools: Vec<(String, Vec<SensorWindow>)>,
}

/// A target window and its sequence number within the run (from 1).
#[derive(Debug, Clone)]
pub struct Target {
    pub pid: usize,
    pub window: SensorWindow,
}

pub fn load_metadata<P: AsRef<Path>>(path: P) -> anyhow::Result<TaskMetadata> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading task metadata {}", path_ref.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing task metadata {}", path_ref.display()))
}

/// Loads one labeled window per non-empty line.
pub fn load_dataset<P: AsRef<Path>>(path: P, metadata: &TaskMetadata) -> anyhow::Result<LabeledPools> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading dataset {}", path_ref.display()))?;

    let mut pools = LabeledPools::default();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: malformed record", path_ref.display(), line_no + 1))?;
        let window = SensorWindow::from_rows(
            &record.data,
            metadata.sampling_rate,
            metadata.channels.clone(),
            Some(record.label.clone()),
        )
        .with_context(|| format!("{}:{}: bad window", path_ref.display(), line_no + 1))?;
        pools.push(record.label, window);
    }
    for (label, windows) in &pools.pools {
        info!("Label: {}, Num: {}", label, windows.len());
    }
    Ok(pools)
}

impl LabeledPools {
    pub fn push(&mut self, label: String, window: SensorWindow) {
        match self.pools.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, windows)) => windows.push(window),
            None => self.pools.push((label, vec![window])),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.pools.iter().map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.pools.iter().map(|(_, windows)| windows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draws `per_label` targets from every label without replacement; what
    /// is left of each label becomes its example pool.
    pub fn split_targets(self, per_label: usize, rng: &mut StdRng) -> anyhow::Result<(Vec<Target>, LabeledPools)> {
        let mut targets = Vec::new();
        let mut examples = LabeledPools::default();
        for (label, windows) in self.pools {
            if windows.len() < per_label {
                bail!(
                    "label `{}` has {} windows, {} targets requested",
                    label,
                    windows.len(),
                    per_label
                );
            }
            let picked = index::sample(rng, windows.len(), per_label);
            let mut slots: Vec<Option<SensorWindow>> = windows.into_iter().map(Some).collect();
            for i in picked.iter() {
                if let Some(window) = slots[i].take() {
                    targets.push(Target {
                        pid: targets.len() + 1,
                        window,
                    });
                }
            }
            examples.pools.push((label, slots.into_iter().flatten().collect()));
        }
        Ok((targets, examples))
    }

    /// Draws `per_label` examples from every pool with a generator seeded
    /// from `seed`, so a solve sees the same examples on every run.
    pub fn draw_examples(&self, per_label: usize, seed: u64) -> Vec<SensorWindow> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut drawn = Vec::with_capacity(per_label * self.pools.len());
        for (label, windows) in &self.pools {
            if windows.len() < per_label {
                warn!(
                    "label `{}` has only {} examples, {} requested",
                    label,
                    windows.len(),
                    per_label
                );
            }
            drawn.extend(windows.choose_multiple(&mut rng, per_label).cloned());
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn metadata() -> TaskMetadata {
        TaskMetadata {
            channels: vec!["x".into(), "y".into()],
            sampling_rate: 10.0,
            classes: vec!["sit".into(), "walk".into()],
            task_description: "task".into(),
            data_description: "data".into(),
        }
    }

    fn dataset_file(per_label: usize) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..per_label {
            for label in ["sit", "walk"] {
                let v = i as f64;
                writeln!(file, r#"{{"data": [[{v}, 0.0], [{v}, 1.0]], "label": "{label}"}}"#).unwrap();
            }
        }
        writeln!(file).unwrap();
        file
    }

    #[test]
    fn dataset_groups_windows_by_label() {
        let file = dataset_file(5);
        let pools = load_dataset(file.path(), &metadata()).unwrap();
        assert_eq!(pools.labels().collect::<Vec<_>>(), vec!["sit", "walk"]);
        assert_eq!(pools.len(), 10);
    }

    #[test]
    fn ragged_records_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"data": [[1.0, 2.0], [3.0]], "label": "sit"}}"#).unwrap();
        let err = load_dataset(file.path(), &metadata()).unwrap_err();
        assert!(err.to_string().contains(":1: bad window"));
    }

    #[test]
    fn targets_are_disjoint_from_examples() {
        let file = dataset_file(6);
        let pools = load_dataset(file.path(), &metadata()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let (targets, examples) = pools.split_targets(2, &mut rng).unwrap();

        assert_eq!(targets.len(), 4);
        assert_eq!(examples.len(), 8);
        assert_eq!(targets.iter().map(|t| t.pid).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(targets[0].window.label(), Some("sit"));
        assert_eq!(targets[3].window.label(), Some("walk"));

        for target in &targets {
            let first = target.window.samples()[[0, 0]];
            let label = target.window.label().unwrap();
            let clash = examples.pools.iter().any(|(l, windows)| {
                l == label && windows.iter().any(|w| w.samples()[[0, 0]] == first)
            });
            assert!(!clash, "target {} reused as example", target.pid);
        }
    }

    #[test]
    fn too_few_windows_for_targets_fails() {
        let file = dataset_file(1);
        let pools = load_dataset(file.path(), &metadata()).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(pools.split_targets(2, &mut rng).is_err());
    }

    #[test]
    fn example_draws_are_seeded() {
        let file = dataset_file(8);
        let pools = load_dataset(file.path(), &metadata()).unwrap();
        let first = pools.draw_examples(2, 11);
        let again = pools.draw_examples(2, 11);
        assert_eq!(first.len(), 4);
        let key = |ws: &[SensorWindow]| ws.iter().map(|w| w.samples()[[0, 0]]).collect::<Vec<_>>();
        assert_eq!(key(&first), key(&again));
        assert_eq!(first[0].label(), Some("sit"));
        assert_eq!(first[3].label(), Some("walk"));
    }
}
