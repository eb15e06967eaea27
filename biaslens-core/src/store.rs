//! Persistence collaborator for evaluations, findings and baselines.
//!
//! Baselines are write-once: inserting an existing name fails. Provides a
//! trait-based abstraction with two implementations:
//! - `InMemoryStore`: `RwLock<HashMap>` tables, for tests and one-shot runs.
//! - `JsonFileStore`: one JSON file per record under a data directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use crate::error::{BiasLensError, Result, StateError};
use crate::persistence::{atomic_write_json, create_json, load_json, load_json_dir, remove_if_exists};
use crate::types::{Baseline, Evaluation, Finding};

/// Storage backend the evaluation service reads from and writes to.
pub trait EvaluationStore: Send + Sync {
    /// Fetch one evaluation. Missing ids yield `NotFound`.
    fn get_evaluation(&self, id: Uuid) -> Result<Evaluation>;

    /// Insert or replace an evaluation.
    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()>;

    /// All stored evaluations, oldest first.
    fn list_evaluations(&self) -> Result<Vec<Evaluation>>;

    /// Remove an evaluation and its findings. Missing ids yield `NotFound`.
    fn delete_evaluation(&self, id: Uuid) -> Result<()>;

    /// Findings written for an evaluation; empty if none were written.
    fn get_findings(&self, evaluation_id: Uuid) -> Result<Vec<Finding>>;

    /// Replace the findings of an evaluation.
    fn save_findings(&self, evaluation_id: Uuid, findings: &[Finding]) -> Result<()>;

    /// Fetch a baseline by name. Missing names yield `NotFound`.
    fn get_baseline(&self, name: &str) -> Result<Baseline>;

    /// Insert a new baseline. An existing name yields `AlreadyExists`.
    fn insert_baseline(&self, baseline: &Baseline) -> Result<()>;

    /// All stored baselines, ordered by name.
    fn list_baselines(&self) -> Result<Vec<Baseline>>;
}

fn baseline_exists(name: &str) -> BiasLensError {
    StateError::AlreadyExists {
        what: "baseline",
        id: name.to_string(),
    }
    .into()
}

fn sort_evaluations(evaluations: &mut [Evaluation]) {
    evaluations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

/// In-memory store. Does not persist across process restarts.
#[derive(Default)]
pub struct InMemoryStore {
    evaluations: RwLock<HashMap<Uuid, Evaluation>>,
    findings: RwLock<HashMap<Uuid, Vec<Finding>>>,
    baselines: RwLock<HashMap<String, Baseline>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvaluationStore for InMemoryStore {
    fn get_evaluation(&self, id: Uuid) -> Result<Evaluation> {
        self.evaluations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or_else(|| BiasLensError::not_found("evaluation", id))
    }

    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        self.evaluations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(evaluation.id, evaluation.clone());
        Ok(())
    }

    fn list_evaluations(&self) -> Result<Vec<Evaluation>> {
        let mut all: Vec<Evaluation> = self
            .evaluations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        sort_evaluations(&mut all);
        Ok(all)
    }

    fn delete_evaluation(&self, id: Uuid) -> Result<()> {
        self.evaluations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or_else(|| BiasLensError::not_found("evaluation", id))?;
        self.findings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        Ok(())
    }

    fn get_findings(&self, evaluation_id: Uuid) -> Result<Vec<Finding>> {
        Ok(self
            .findings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&evaluation_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_findings(&self, evaluation_id: Uuid, findings: &[Finding]) -> Result<()> {
        self.findings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(evaluation_id, findings.to_vec());
        Ok(())
    }

    fn get_baseline(&self, name: &str) -> Result<Baseline> {
        self.baselines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| BiasLensError::not_found("baseline", name))
    }

    fn insert_baseline(&self, baseline: &Baseline) -> Result<()> {
        let mut baselines = self.baselines.write().unwrap_or_else(PoisonError::into_inner);
        if baselines.contains_key(&baseline.name) {
            return Err(baseline_exists(&baseline.name));
        }
        baselines.insert(baseline.name.clone(), baseline.clone());
        Ok(())
    }

    fn list_baselines(&self) -> Result<Vec<Baseline>> {
        let mut all: Vec<Baseline> = self
            .baselines
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

/// File-backed store.
///
/// Layout under the data directory:
///
/// ```text
/// evaluations/<id>.json
/// findings/<evaluation id>.json
/// baselines/<hex of name>.json
/// ```
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn evaluation_path(&self, id: Uuid) -> PathBuf {
        self.root.join("evaluations").join(format!("{id}.json"))
    }

    fn findings_path(&self, id: Uuid) -> PathBuf {
        self.root.join("findings").join(format!("{id}.json"))
    }

    fn baseline_path(&self, name: &str) -> PathBuf {
        self.root
            .join("baselines")
            .join(format!("{}.json", file_stem(name)))
    }
}

/// Lowercase hex of the name's UTF-8 bytes: path-safe and injective.
fn file_stem(name: &str) -> String {
    name.bytes().map(|b| format!("{b:02x}")).collect()
}

impl EvaluationStore for JsonFileStore {
    fn get_evaluation(&self, id: Uuid) -> Result<Evaluation> {
        load_json(&self.evaluation_path(id))?.ok_or_else(|| BiasLensError::not_found("evaluation", id))
    }

    fn save_evaluation(&self, evaluation: &Evaluation) -> Result<()> {
        atomic_write_json(&self.evaluation_path(evaluation.id), evaluation)
    }

    fn list_evaluations(&self) -> Result<Vec<Evaluation>> {
        let mut all: Vec<Evaluation> = load_json_dir(&self.root.join("evaluations"))?;
        sort_evaluations(&mut all);
        Ok(all)
    }

    fn delete_evaluation(&self, id: Uuid) -> Result<()> {
        if !remove_if_exists(&self.evaluation_path(id))? {
            return Err(BiasLensError::not_found("evaluation", id));
        }
        remove_if_exists(&self.findings_path(id))?;
        Ok(())
    }

    fn get_findings(&self, evaluation_id: Uuid) -> Result<Vec<Finding>> {
        Ok(load_json(&self.findings_path(evaluation_id))?.unwrap_or_default())
    }

    fn save_findings(&self, evaluation_id: Uuid, findings: &[Finding]) -> Result<()> {
        atomic_write_json(&self.findings_path(evaluation_id), findings)
    }

    fn get_baseline(&self, name: &str) -> Result<Baseline> {
        load_json::<Baseline>(&self.baseline_path(name))?
            .ok_or_else(|| BiasLensError::not_found("baseline", name))
    }

    fn insert_baseline(&self, baseline: &Baseline) -> Result<()> {
        if create_json(&self.baseline_path(&baseline.name), baseline)? {
            Ok(())
        } else {
            Err(baseline_exists(&baseline.name))
        }
    }

    fn list_baselines(&self) -> Result<Vec<Baseline>> {
        let mut all: Vec<Baseline> = load_json_dir(&self.root.join("baselines"))?;
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}
