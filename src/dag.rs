use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use thiserror::Error;

use crate::channel::Channel;
use crate::path::CatalogPath;
use crate::step::{StepUri, StepUriError};

/// Dependency graph of the pipeline steps.
///
/// Loaded from a YAML file where every step is listed along with the steps it
/// depends on:
/// ```yaml
/// steps:
///   data://garden/who/2024/gho:
///     - data://meadow/who/2024/gho
///   data://meadow/who/2024/gho:
///     - snapshot://who/2024/gho.zip
/// ```
/// Dependencies that are not listed as steps themselves (usually snapshots) are
/// leaves of the graph.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    /// Every step in the graph mapped to its direct dependencies.
    deps: BTreeMap<StepUri, BTreeSet<StepUri>>,
}

#[derive(Debug, Error)]
pub enum DagError {
    #[error("IO error occurred while reading the DAG file `{path}`. {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DAG file is not valid YAML. {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Invalid step `{step}`. {source}")]
    InvalidStep {
        step: String,
        #[source]
        source: StepUriError,
    },

    #[error("Invalid dependency `{dependency}` of step `{step}`. {source}")]
    InvalidDependency {
        step: String,
        dependency: String,
        #[source]
        source: StepUriError,
    },

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

/// Layout of the DAG file.
#[derive(Debug, serde::Deserialize)]
struct DagFile {
    #[serde(default)]
    steps: BTreeMap<String, Option<Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl Dag {
    /// Read and parse the DAG file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Vec<DagError>> {
        let path = path.as_ref();
        debug!("Loading DAG from {}", path.display());

        let yaml = std::fs::read_to_string(path).map_err(|source| {
            vec![DagError::Io {
                path: path.to_owned(),
                source,
            }]
        })?;
        Self::from_yaml(&yaml)
    }

    /// Parse the DAG from YAML text. All invalid steps are reported, not only the first one.
    pub fn from_yaml(yaml: &str) -> Result<Self, Vec<DagError>> {
        let file: DagFile = serde_yml::from_str(yaml).map_err(|e| vec![DagError::from(e)])?;

        let mut errors = Vec::new();
        let mut deps: BTreeMap<StepUri, BTreeSet<StepUri>> = BTreeMap::new();

        for (raw_step, raw_deps) in file.steps {
            let step = match raw_step.parse::<StepUri>() {
                Ok(step) => step,
                Err(source) => {
                    errors.push(DagError::InvalidStep {
                        step: raw_step,
                        source,
                    });
                    continue;
                }
            };

            let mut step_deps = BTreeSet::new();
            for raw_dep in raw_deps.unwrap_or_default() {
                match raw_dep.parse::<StepUri>() {
                    Ok(dep) => {
                        step_deps.insert(dep);
                    }
                    Err(source) => errors.push(DagError::InvalidDependency {
                        step: raw_step.clone(),
                        dependency: raw_dep,
                        source,
                    }),
                }
            }

            trace!("Step `{step}` has {} dependencies", step_deps.len());
            for dep in &step_deps {
                deps.entry(dep.clone()).or_default();
            }
            deps.insert(step, step_deps);
        }

        if errors.is_empty() {
            debug!("Loaded DAG with {} steps", deps.len());
            Ok(Self { deps })
        } else {
            debug!("DAG has {} invalid entries", errors.len());
            Err(errors)
        }
    }

    /// All steps, including the leaves that are only mentioned as dependencies.
    pub fn steps(&self) -> impl Iterator<Item = &StepUri> {
        self.deps.keys()
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn contains(&self, step: &StepUri) -> bool {
        self.deps.contains_key(step)
    }

    /// Direct dependencies of the step. Empty for leaves and for unknown steps.
    pub fn dependencies<'a>(&'a self, step: &StepUri) -> impl Iterator<Item = &'a StepUri> {
        self.deps.get(step).into_iter().flatten()
    }

    /// Steps that directly depend on the given one.
    pub fn dependents<'a>(&'a self, step: &'a StepUri) -> impl Iterator<Item = &'a StepUri> {
        self.deps
            .iter()
            .filter(move |(_, deps)| deps.contains(step))
            .map(|(dependent, _)| dependent)
    }

    /// All the steps the given one depends on, directly or not.
    pub fn upstream(&self, step: &StepUri) -> BTreeSet<&StepUri> {
        let mut found = BTreeSet::new();
        let mut queue: Vec<&StepUri> = self.dependencies(step).collect();
        while let Some(dep) = queue.pop() {
            if found.insert(dep) {
                queue.extend(self.dependencies(dep));
            }
        }
        found
    }

    pub fn steps_in_channel(&self, channel: Channel) -> impl Iterator<Item = &StepUri> {
        self.deps.keys().filter(move |step| step.channel() == channel)
    }

    /// Step that builds the dataset the path points to, if it is in the graph.
    /// Public steps are preferred over private ones.
    pub fn step_for(&self, path: &CatalogPath) -> Option<&StepUri> {
        let dataset = path.without_table();
        self.deps
            .keys()
            .filter(|step| !step.scheme().is_snapshot() && *step.path() == dataset)
            .min_by_key(|step| step.is_private())
    }

    /// Order in which the steps can be built: every step comes after all of its
    /// dependencies. The order is stable for the same graph.
    pub fn build_order(&self) -> Result<Vec<&StepUri>, DagError> {
        let mut marks = HashMap::with_capacity(self.deps.len());
        let mut stack = Vec::new();
        let mut order = Vec::with_capacity(self.deps.len());
        for step in self.deps.keys() {
            self.visit(step, &mut marks, &mut stack, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        step: &'a StepUri,
        marks: &mut HashMap<&'a StepUri, Mark>,
        stack: &mut Vec<&'a StepUri>,
        order: &mut Vec<&'a StepUri>,
    ) -> Result<(), DagError> {
        match marks.get(step) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == step).unwrap_or_default();
                let cycle = stack[start..]
                    .iter()
                    .chain(std::iter::once(&step))
                    .map(|s| s.to_string())
                    .collect();
                return Err(DagError::Cycle(cycle));
            }
            None => {}
        }

        marks.insert(step, Mark::Visiting);
        stack.push(step);
        for dep in self.dependencies(step) {
            self.visit(dep, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(step, Mark::Done);
        order.push(step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
steps:
  data://grapher/who/2024/gho:
    - data://garden/who/2024/gho
  data://garden/who/2024/gho:
    - data://meadow/who/2024/gho
    - data://garden/regions/2023-09-28/regions
  data://meadow/who/2024/gho:
    - snapshot://who/2024/gho.zip
  data://garden/regions/2023-09-28/regions:
  data-private://garden/who/2024/gho:
    - snapshot-private://who/2024/gho.zip
"#;

    fn step(s: &str) -> StepUri {
        s.parse().unwrap()
    }

    fn dag() -> Dag {
        Dag::from_yaml(YAML).unwrap()
    }

    #[test]
    fn load_steps() {
        crate::init_log();

        let dag = dag();
        // Five listed steps and two snapshot leaves.
        assert_eq!(dag.len(), 7);
        assert!(dag.contains(&step("snapshot://who/2024/gho.zip")));
        assert!(!dag.contains(&step("data://garden/who/2025/gho")));
    }

    #[test]
    fn direct_dependencies() {
        let dag = dag();
        let deps: Vec<_> = dag
            .dependencies(&step("data://garden/who/2024/gho"))
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            deps,
            [
                "data://garden/regions/2023-09-28/regions",
                "data://meadow/who/2024/gho",
            ]
        );

        assert_eq!(dag.dependencies(&step("snapshot://who/2024/gho.zip")).count(), 0);
        assert_eq!(dag.dependencies(&step("data://garden/unknown/2024/x")).count(), 0);
    }

    #[test]
    fn dependents() {
        let dag = dag();
        let regions = step("data://garden/regions/2023-09-28/regions");
        let dependents: Vec<_> = dag.dependents(&regions).collect();
        assert_eq!(dependents, [&step("data://garden/who/2024/gho")]);
    }

    #[test]
    fn upstream() {
        let dag = dag();
        let up = dag.upstream(&step("data://grapher/who/2024/gho"));
        assert_eq!(up.len(), 4);
        assert!(up.contains(&step("snapshot://who/2024/gho.zip")));
        assert!(!up.contains(&step("snapshot-private://who/2024/gho.zip")));
    }

    #[test]
    fn build_order() {
        let dag = dag();
        let order = dag.build_order().unwrap();
        assert_eq!(order.len(), dag.len());

        let pos = |s: &str| {
            let s = step(s);
            order.iter().position(|o| **o == s).unwrap()
        };
        assert!(pos("snapshot://who/2024/gho.zip") < pos("data://meadow/who/2024/gho"));
        assert!(pos("data://meadow/who/2024/gho") < pos("data://garden/who/2024/gho"));
        assert!(
            pos("data://garden/regions/2023-09-28/regions") < pos("data://garden/who/2024/gho")
        );
        assert!(pos("data://garden/who/2024/gho") < pos("data://grapher/who/2024/gho"));

        assert_eq!(dag.build_order().unwrap(), order);
    }

    #[test]
    fn cycle() {
        let yaml = r#"
steps:
  data://garden/a/2024/a:
    - data://garden/b/2024/b
  data://garden/b/2024/b:
    - data://garden/c/2024/c
  data://garden/c/2024/c:
    - data://garden/a/2024/a
"#;
        let dag = Dag::from_yaml(yaml).unwrap();
        let err = dag.build_order().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dependency cycle: data://garden/a/2024/a -> data://garden/b/2024/b -> \
             data://garden/c/2024/c -> data://garden/a/2024/a"
        );
    }

    #[test]
    fn all_errors_reported() {
        let yaml = r#"
steps:
  data://garden/who/2024/gho:
    - data://meadow/who/2024/gho/table
    - meadow/who/2024/gho
  data://garden/who/latest:
  data://garden/ok/2024/ok:
"#;
        let errors = Dag::from_yaml(yaml).unwrap_err();
        assert_eq!(errors.len(), 3, "{errors:?}");
        assert!(matches!(
            &errors[0],
            DagError::InvalidDependency { dependency, .. }
                if dependency == "data://meadow/who/2024/gho/table"
        ));
        assert!(matches!(
            &errors[1],
            DagError::InvalidDependency {
                source: StepUriError::MissingScheme(_),
                ..
            }
        ));
        assert!(matches!(
            &errors[2],
            DagError::InvalidStep { step, .. } if step == "data://garden/who/latest"
        ));
    }

    #[test]
    fn invalid_yaml() {
        let errors = Dag::from_yaml("steps: [").unwrap_err();
        assert!(matches!(errors.as_slice(), [DagError::Yaml(_)]));
    }

    #[test]
    fn empty_dag() {
        let dag = Dag::from_yaml("steps: {}").unwrap();
        assert!(dag.is_empty());
        assert!(dag.build_order().unwrap().is_empty());
    }

    #[test]
    fn steps_by_channel() {
        let dag = dag();
        let garden: Vec<_> = dag
            .steps_in_channel(Channel::Garden)
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            garden,
            [
                "data://garden/regions/2023-09-28/regions",
                "data://garden/who/2024/gho",
                "data-private://garden/who/2024/gho",
            ]
        );
        assert_eq!(dag.steps_in_channel(Channel::Snapshot).count(), 2);
    }

    #[test]
    fn step_for_catalog_path() {
        let dag = dag();
        let path: CatalogPath = "garden/who/2024/gho/gho#life_expectancy".parse().unwrap();
        assert_eq!(
            dag.step_for(&path),
            Some(&step("data://garden/who/2024/gho"))
        );

        let path: CatalogPath = "garden/who/2030/gho".parse().unwrap();
        assert_eq!(dag.step_for(&path), None);
    }

    #[test]
    fn missing_file() {
        let errors = Dag::load("/nonexistent/dag.yml").unwrap_err();
        match errors.as_slice() {
            [DagError::Io { path, .. }] => assert_eq!(path, Path::new("/nonexistent/dag.yml")),
            other => panic!("expected a single IO error, got {other:?}"),
        }
    }
}
