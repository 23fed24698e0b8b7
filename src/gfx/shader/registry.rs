use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::backend::ShaderBackend;
use super::program::ShaderProgram;
use super::report::ShaderReport;
use super::wgpu_backend::WgpuBackend;

/// Named shader programs sharing one root directory.
pub struct ProgramRegistry<B: ShaderBackend = WgpuBackend> {
    root_dir: PathBuf,
    programs: HashMap<String, ShaderProgram<B>>,
}

impl<B: ShaderBackend> ProgramRegistry<B> {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            programs: HashMap::new(),
        }
    }

    /// Returns the program called `name`, creating an unbuilt one if absent.
    pub fn get_or_create(&mut self, name: &str) -> &mut ShaderProgram<B> {
        let root_dir = &self.root_dir;
        self.programs.entry(name.to_string()).or_insert_with(|| {
            log::debug!("registering shader program '{}'", name);
            ShaderProgram::new(root_dir.clone(), name)
        })
    }

    pub fn get(&self, name: &str) -> Option<&ShaderProgram<B>> {
        self.programs.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ShaderProgram<B>> {
        self.programs.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ShaderProgram<B>> {
        self.programs.remove(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// List all registered program names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Builds every registered program, collecting the reports of those that failed.
    pub fn build_all(&mut self, backend: &B) -> Result<(), Vec<(String, ShaderReport)>> {
        let mut errors = Vec::new();

        for (name, program) in self.programs.iter_mut() {
            if !program.build(backend) {
                errors.push((name.clone(), program.report().clone()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
