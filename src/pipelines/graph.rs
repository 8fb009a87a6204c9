//! Job dependency graph shared by every target

use crate::error::ValidationError;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Jobs and the jobs they need, in declaration order
#[derive(Debug, Clone, Default)]
pub struct JobGraph {
    jobs: IndexMap<String, Vec<String>>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a job; every id may appear once
    pub fn add<I, S>(&mut self, id: impl Into<String>, needs: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        if self.jobs.contains_key(&id) {
            return Err(ValidationError::DuplicateJob(id));
        }
        self.jobs
            .insert(id, needs.into_iter().map(Into::into).collect());
        Ok(())
    }

    pub fn needs(&self, id: &str) -> &[String] {
        self.jobs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    /// Check every need names a declared job and the graph is acyclic
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (job, needs) in &self.jobs {
            if let Some(missing) = needs.iter().find(|need| !self.jobs.contains_key(*need)) {
                return Err(ValidationError::UnknownNeed {
                    job: job.clone(),
                    needs: missing.clone(),
                });
            }
        }

        let mut visited = HashSet::new();
        let mut recursion_stack = HashSet::new();
        for job in self.jobs.keys() {
            if !visited.contains(job.as_str()) {
                self.dfs_check(job, &mut visited, &mut recursion_stack)?;
            }
        }
        Ok(())
    }

    fn dfs_check<'a>(
        &'a self,
        job: &'a str,
        visited: &mut HashSet<&'a str>,
        recursion_stack: &mut HashSet<&'a str>,
    ) -> Result<(), ValidationError> {
        visited.insert(job);
        recursion_stack.insert(job);

        for need in self.needs(job) {
            if recursion_stack.contains(need.as_str()) {
                return Err(ValidationError::JobCycle(need.clone()));
            }
            if !visited.contains(need.as_str()) {
                self.dfs_check(need, visited, recursion_stack)?;
            }
        }

        recursion_stack.remove(job);
        Ok(())
    }

    /// Topological order; ties keep declaration order
    pub fn execution_order(&self) -> Result<Vec<String>, ValidationError> {
        self.validate()?;

        let mut result = Vec::with_capacity(self.jobs.len());
        let mut visited = HashSet::new();
        for job in self.jobs.keys() {
            self.visit(job, &mut visited, &mut result);
        }
        Ok(result)
    }

    fn visit<'a>(&'a self, job: &'a str, visited: &mut HashSet<&'a str>, result: &mut Vec<String>) {
        if !visited.insert(job) {
            return;
        }
        for need in self.needs(job) {
            self.visit(need, visited, result);
        }
        result.push(job.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> JobGraph {
        let mut graph = JobGraph::new();
        graph.add("synth", Vec::<String>::new()).unwrap();
        graph.add("assetUpload", ["synth"]).unwrap();
        graph.add("deploy-dev", ["assetUpload"]).unwrap();
        graph.add("deploy-prod", ["assetUpload", "deploy-dev"]).unwrap();
        graph
    }

    #[test]
    fn test_execution_order_respects_needs() {
        let order = linear().execution_order().unwrap();
        assert_eq!(order, vec!["synth", "assetUpload", "deploy-dev", "deploy-prod"]);
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let mut graph = JobGraph::new();
        graph.add("deploy", ["build"]).unwrap();
        graph.add("lint", Vec::<String>::new()).unwrap();
        graph.add("build", Vec::<String>::new()).unwrap();
        assert_eq!(graph.execution_order().unwrap(), vec!["build", "deploy", "lint"]);
    }

    #[test]
    fn test_unknown_need_fails() {
        let mut graph = linear();
        graph.add("deploy-qa", ["deploy-staging"]).unwrap();
        assert_eq!(
            graph.validate().unwrap_err(),
            ValidationError::UnknownNeed {
                job: "deploy-qa".to_string(),
                needs: "deploy-staging".to_string(),
            }
        );
    }

    #[test]
    fn test_cycle_fails() {
        let mut graph = JobGraph::new();
        graph.add("a", ["c"]).unwrap();
        graph.add("b", ["a"]).unwrap();
        graph.add("c", ["b"]).unwrap();
        assert!(matches!(graph.validate(), Err(ValidationError::JobCycle(_))));
        assert!(graph.execution_order().is_err());
    }

    #[test]
    fn test_duplicate_job_fails() {
        let mut graph = linear();
        assert_eq!(
            graph.add("synth", Vec::<String>::new()).unwrap_err(),
            ValidationError::DuplicateJob("synth".to_string())
        );
    }
}
