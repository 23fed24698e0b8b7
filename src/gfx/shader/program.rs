use std::path::{Path, PathBuf};

use cgmath::{Matrix2, Matrix3, Matrix4, Vector2, Vector3, Vector4};

use super::backend::{BindProgram, LinkedProgram, ShaderBackend};
use super::reflect::{UniformLayout, UniformLocation};
use super::report::{BuildPhase, ReportTarget, ShaderError, ShaderReport};
use super::stage::{canonical_path, ProgramKind, ShaderDefinition, ShaderStage};
use super::uniform::UniformValue;
use super::wgpu_backend::WgpuBackend;

/// Progress of the most recent build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Unbuilt,
    Reading,
    Compiling,
    Linking,
    Ready,
    Failed,
}

struct Stages<M> {
    vertex: Option<ShaderDefinition<M>>,
    fragment: Option<ShaderDefinition<M>>,
    geometry: Option<ShaderDefinition<M>>,
    compute: Option<ShaderDefinition<M>>,
}

impl<M> Stages<M> {
    fn empty() -> Self {
        Self {
            vertex: None,
            fragment: None,
            geometry: None,
            compute: None,
        }
    }

    fn slot(&mut self, stage: ShaderStage) -> &mut Option<ShaderDefinition<M>> {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
            ShaderStage::Geometry => &mut self.geometry,
            ShaderStage::Compute => &mut self.compute,
        }
    }

    fn get(&self, stage: ShaderStage) -> Option<&ShaderDefinition<M>> {
        match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Fragment => self.fragment.as_ref(),
            ShaderStage::Geometry => self.geometry.as_ref(),
            ShaderStage::Compute => self.compute.as_ref(),
        }
    }

    fn release_modules(&mut self) {
        for def in [
            &mut self.vertex,
            &mut self.fragment,
            &mut self.geometry,
            &mut self.compute,
        ]
        .into_iter()
        .flatten()
        {
            def.release_module();
        }
    }
}

/// A GPU program assembled from per-stage source files.
///
/// Stages are attached by path, then [`build`](Self::build) reads, compiles and links them.
/// The outcome is kept in a [`ShaderReport`]; uniforms are set by name once the program
/// is built.
pub struct ShaderProgram<B: ShaderBackend = WgpuBackend> {
    root_dir: PathBuf,
    label: String,
    kind: Option<ProgramKind>,
    stages: Stages<B::Module>,
    linked: Option<B::Program>,
    report: ShaderReport,
    state: BuildState,
    uniforms: UniformLayout,
    config: B::Config,
}

impl<B: ShaderBackend> ShaderProgram<B> {
    /// Creates an unbuilt program whose relative stage paths resolve against `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            label: label.into(),
            kind: None,
            stages: Stages::empty(),
            linked: None,
            report: ShaderReport::default(),
            state: BuildState::Unbuilt,
            uniforms: UniformLayout::default(),
            config: B::Config::default(),
        }
    }

    /// Attaches a vertex and a fragment stage, plus an optional geometry stage.
    pub fn attach_graphics<P: AsRef<Path>>(
        &mut self,
        vertex: P,
        fragment: P,
        geometry: Option<P>,
    ) -> &mut Self {
        self.detach();
        self.attach(ShaderStage::Vertex, vertex);
        self.attach(ShaderStage::Fragment, fragment);
        self.kind = Some(match geometry {
            Some(path) => {
                self.attach(ShaderStage::Geometry, path);
                ProgramKind::GraphicsWithGeometry
            }
            None => ProgramKind::GraphicsWithoutGeometry,
        });
        self
    }

    /// Attaches a single compute stage.
    pub fn attach_compute(&mut self, compute: impl AsRef<Path>) -> &mut Self {
        self.detach();
        self.attach(ShaderStage::Compute, compute);
        self.kind = Some(ProgramKind::Compute);
        self
    }

    fn attach(&mut self, stage: ShaderStage, path: impl AsRef<Path>) {
        let path = canonical_path(&self.root_dir, path);
        *self.stages.slot(stage) = Some(ShaderDefinition::new(stage, path));
    }

    fn detach(&mut self) {
        self.stages = Stages::empty();
        self.reset();
    }

    fn reset(&mut self) {
        self.linked = None;
        self.report.clear();
        self.uniforms = UniformLayout::default();
        self.stages.release_modules();
        self.state = BuildState::Unbuilt;
    }

    /// Replaces the backend specific pipeline options used by the next build.
    pub fn with_config(&mut self, config: B::Config) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut B::Config {
        &mut self.config
    }

    /// Reads, compiles and links every attached stage.
    ///
    /// Stops at the first failure, which is recorded in the report. Calling it again
    /// rebuilds from the files on disk. Returns [`was_successful`](Self::was_successful).
    pub fn build(&mut self, backend: &B) -> bool {
        self.reset();

        let Some(kind) = self.kind else {
            return self.fail(ShaderError::new(
                BuildPhase::Reading,
                ReportTarget::Program,
                "no shader stages attached",
            ));
        };

        for &stage in kind.stages() {
            if let Err(error) = self.prepare_stage(backend, stage) {
                return self.fail(error);
            }
        }

        match self.link(backend, kind) {
            Ok(()) => {
                log::debug!("shader program '{}' ready", self.label);
                true
            }
            Err(error) => self.fail(error),
        }
    }

    fn prepare_stage(&mut self, backend: &B, stage: ShaderStage) -> Result<(), ShaderError> {
        self.state = BuildState::Reading;
        let label = format!("{} ({})", self.label, stage);
        let def = self
            .stages
            .slot(stage)
            .as_mut()
            .ok_or_else(|| ShaderError::new(BuildPhase::Reading, stage, "stage not attached"))?;
        def.read()
            .map_err(|message| ShaderError::new(BuildPhase::Reading, stage, message))?;

        self.state = BuildState::Compiling;
        let module = backend
            .compile(stage, &label, def.source())
            .map_err(|message| ShaderError::new(BuildPhase::Compilation, stage, message))?;
        def.set_module(module);
        Ok(())
    }

    fn link(&mut self, backend: &B, kind: ProgramKind) -> Result<(), ShaderError> {
        self.state = BuildState::Linking;
        let link_error =
            |message: String| ShaderError::new(BuildPhase::Linking, ReportTarget::Program, message);

        let sources: Vec<&str> = kind
            .stages()
            .iter()
            .filter_map(|&stage| self.stages.get(stage))
            .map(ShaderDefinition::source)
            .collect();
        let uniforms = UniformLayout::reflect(&sources).map_err(|e| link_error(e.to_string()))?;

        let modules: Vec<(ShaderStage, &B::Module)> = kind
            .stages()
            .iter()
            .filter_map(|&stage| {
                self.stages
                    .get(stage)
                    .and_then(ShaderDefinition::module)
                    .map(|module| (stage, module))
            })
            .collect();
        let linked = backend
            .link(&self.label, kind, &modules, &uniforms, &self.config)
            .map_err(link_error)?;

        self.stages.release_modules();
        self.linked = Some(linked);
        self.uniforms = uniforms;
        self.state = BuildState::Ready;
        Ok(())
    }

    fn fail(&mut self, error: ShaderError) -> bool {
        log::error!("shader program '{}': {}", self.label, error);
        self.report.set(error);
        self.state = BuildState::Failed;
        false
    }

    /// Makes the program current on `pass`. Does nothing unless the program is built.
    pub fn use_program<P: BindProgram<B::Program>>(&self, pass: &mut P) {
        match &self.linked {
            Some(linked) => pass.bind_program(linked),
            None => log::debug!("shader program '{}' is not built", self.label),
        }
    }

    /// Sets the uniform called `name`; draws recorded after the next
    /// [`use_program`](Self::use_program) see the value.
    ///
    /// Unknown names, unbuilt programs and values of the wrong type are ignored.
    pub fn set_uniform(&self, name: &str, value: impl Into<UniformValue>) {
        let Some(linked) = &self.linked else {
            log::debug!("uniform '{}' set on unbuilt program '{}'", name, self.label);
            return;
        };
        let Some(location) = self.uniforms.location(name) else {
            log::debug!("program '{}' has no uniform '{}'", self.label, name);
            return;
        };
        let value = value.into();
        match value.encode(location.ty) {
            Some(bytes) => linked.write_uniform(location, &bytes),
            None => log::debug!(
                "uniform '{}' is {:?}, cannot set it to {:?}",
                name,
                location.ty,
                value
            ),
        }
    }

    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_uniform(name, value);
    }

    pub fn set_int(&self, name: &str, value: i32) {
        self.set_uniform(name, value);
    }

    pub fn set_uint(&self, name: &str, value: u32) {
        self.set_uniform(name, value);
    }

    pub fn set_float(&self, name: &str, value: f32) {
        self.set_uniform(name, value);
    }

    pub fn set_vec2(&self, name: &str, value: impl Into<Vector2<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn set_vec3(&self, name: &str, value: impl Into<Vector3<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn set_vec4(&self, name: &str, value: impl Into<Vector4<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn set_mat2(&self, name: &str, value: impl Into<Matrix2<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn set_mat3(&self, name: &str, value: impl Into<Matrix3<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn set_mat4(&self, name: &str, value: impl Into<Matrix4<f32>>) {
        self.set_uniform(name, value.into());
    }

    pub fn was_successful(&self) -> bool {
        self.report.success()
    }

    pub fn report(&self) -> &ShaderReport {
        &self.report
    }

    pub fn definition(&self, stage: ShaderStage) -> Option<&ShaderDefinition<B::Module>> {
        self.stages.get(stage)
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn kind(&self) -> Option<ProgramKind> {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn uniform_location(&self, name: &str) -> Option<&UniformLocation> {
        self.uniforms.location(name)
    }

    pub fn uniforms(&self) -> &UniformLayout {
        &self.uniforms
    }

    /// The linked program, once built.
    pub fn linked(&self) -> Option<&B::Program> {
        self.linked.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::shader::testing::{MockBackend, MockPass, FAIL_COMPILE, FAIL_LINK};
    use cgmath::{SquareMatrix, Vector3};
    use std::fs;
    use tempfile::TempDir;

    const VERTEX: &str = r#"
        struct Globals {
            view_proj: mat4x4<f32>,
            tint: vec3<f32>,
            time: f32,
        }
        @group(0) @binding(0) var<uniform> globals: Globals;

        @vertex
        fn main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
            return globals.view_proj * vec4<f32>(position, 1.0);
        }
    "#;

    const FRAGMENT: &str = r#"
        @fragment
        fn main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.5, 0.2, 1.0);
        }
    "#;

    fn write(dir: &TempDir, name: &str, source: &str) {
        fs::write(dir.path().join(name), source).unwrap();
    }

    fn program(dir: &TempDir) -> ShaderProgram<MockBackend> {
        ShaderProgram::new(dir.path(), "test")
    }

    #[test]
    fn test_missing_vertex_reports_reading_failure() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        let ok = program
            .attach_graphics("missing.vert.wgsl", "basic.frag.wgsl", None)
            .build(&backend);

        assert!(!ok);
        assert!(!program.was_successful());
        assert_eq!(program.state(), BuildState::Failed);
        let error = program.report().error().unwrap();
        assert_eq!(error.phase, BuildPhase::Reading);
        assert_eq!(error.target, ReportTarget::Stage(ShaderStage::Vertex));
        assert!(program
            .report()
            .to_string()
            .starts_with("Could not read vertex shader (message: "));

        // fragment never touched
        assert!(backend.compiled.borrow().is_empty());
        assert!(program
            .definition(ShaderStage::Fragment)
            .unwrap()
            .source()
            .is_empty());
    }

    #[test]
    fn test_valid_sources_build_and_bind() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        assert!(program
            .attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", None)
            .build(&backend));
        assert_eq!(program.state(), BuildState::Ready);
        assert_eq!(program.report().to_string(), "(message: ).");
        assert_eq!(
            *backend.compiled.borrow(),
            vec![ShaderStage::Vertex, ShaderStage::Fragment]
        );

        let linked = program.linked().unwrap();
        let mut pass = MockPass::default();
        program.use_program(&mut pass);
        assert_eq!(pass.bound, vec![linked.id]);

        // modules are released once linked
        assert!(program.definition(ShaderStage::Vertex).unwrap().module().is_none());
        assert_eq!(
            program.definition(ShaderStage::Vertex).unwrap().path(),
            dir.path().join("basic.vert.wgsl")
        );
    }

    #[test]
    fn test_compile_failure_stops_build() {
        let dir = TempDir::new().unwrap();
        write(&dir, "bad.vert.wgsl", &format!("// {}\n{}", FAIL_COMPILE, VERTEX));
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        assert!(!program
            .attach_graphics("bad.vert.wgsl", "basic.frag.wgsl", None)
            .build(&backend));
        assert_eq!(
            program.report().to_string(),
            "Compilation on vertex shader (message: error: bad vertex source)."
        );
        assert_eq!(*backend.compiled.borrow(), vec![ShaderStage::Vertex]);
        assert!(backend.linked.borrow().is_empty());
    }

    #[test]
    fn test_link_failure_targets_program() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "bad.frag.wgsl", &format!("// {}\n{}", FAIL_LINK, FRAGMENT));
        let backend = MockBackend::default();

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "bad.frag.wgsl", None);
        assert!(!program.build(&backend));

        let error = program.report().error().unwrap();
        assert_eq!(error.phase, BuildPhase::Linking);
        assert_eq!(error.target, ReportTarget::Program);
        assert!(program.linked().is_none());
    }

    #[test]
    fn test_conflicting_uniforms_fail_linking() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(
            &dir,
            "other.frag.wgsl",
            "@group(0) @binding(0) var<uniform> exposure: f32;",
        );
        let backend = MockBackend::default();

        let mut program = program(&dir);
        assert!(!program
            .attach_graphics("basic.vert.wgsl", "other.frag.wgsl", None)
            .build(&backend));
        assert_eq!(program.report().error().unwrap().phase, BuildPhase::Linking);
        assert!(backend.linked.borrow().is_empty());
    }

    #[test]
    fn test_geometry_stage_is_built_first() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        write(&dir, "basic.geom.wgsl", "");
        let backend = MockBackend::default();

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", Some("basic.geom.wgsl"));
        assert_eq!(program.kind(), Some(ProgramKind::GraphicsWithGeometry));
        assert!(program.build(&backend));

        let order = vec![ShaderStage::Geometry, ShaderStage::Vertex, ShaderStage::Fragment];
        assert_eq!(*backend.compiled.borrow(), order);
        assert_eq!(backend.linked.borrow()[0], order);
    }

    #[test]
    fn test_compute_program() {
        let dir = TempDir::new().unwrap();
        write(&dir, "step.comp.wgsl", "@compute @workgroup_size(64) fn main() {}");
        let backend = MockBackend::default();

        let mut program = program(&dir);
        assert!(program.attach_compute("step.comp.wgsl").build(&backend));
        assert_eq!(program.kind(), Some(ProgramKind::Compute));
        assert_eq!(*backend.compiled.borrow(), vec![ShaderStage::Compute]);
        assert!(program.definition(ShaderStage::Vertex).is_none());
    }

    #[test]
    fn test_build_without_stages() {
        let dir = TempDir::new().unwrap();
        let mut program = program(&dir);
        assert!(!program.build(&MockBackend::default()));
        assert_eq!(
            program.report().to_string(),
            "Could not read shader program (message: no shader stages attached)."
        );
    }

    #[test]
    fn test_rebuild_picks_up_fixed_source() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", &format!("// {}\n{}", FAIL_COMPILE, VERTEX));
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", None);
        assert!(!program.build(&backend));

        write(&dir, "basic.vert.wgsl", VERTEX);
        assert!(program.build(&backend));
        assert!(program.was_successful());
        assert!(program.report().error().is_none());
    }

    #[test]
    fn test_uniform_upload() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", None);

        // unbuilt: ignored
        program.set_float("time", 1.0);
        assert!(program.build(&backend));

        program.set_float("time", 2.0);
        program.set_vec3("globals.tint", Vector3::<f32>::new(1.0, 0.0, 0.0));
        program.set_mat4("view_proj", Matrix4::<f32>::identity());
        // unknown name and wrong type: ignored
        program.set_float("missing", 1.0);
        program.set_int("time", 3);

        let writes = program.linked().unwrap().writes.borrow();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0], (0, 76, 2.0f32.to_ne_bytes().to_vec()));
        assert_eq!(writes[1].1, 64);
        assert_eq!(writes[2].1, 0);
        assert_eq!(writes[2].2.len(), 64);
    }

    #[test]
    fn test_each_bind_sees_values_set_before_it() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "basic.frag.wgsl", FRAGMENT);
        let backend = MockBackend::default();

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", None);
        assert!(program.build(&backend));

        let mut pass = MockPass::default();
        program.set_float("time", 1.0);
        program.use_program(&mut pass);
        program.set_float("time", 2.0);
        program.use_program(&mut pass);

        let time = |bind: usize| {
            let block = &pass.snapshots[bind][0];
            f32::from_ne_bytes(block[76..80].try_into().unwrap())
        };
        assert_eq!(pass.snapshots.len(), 2);
        assert_eq!(time(0), 1.0);
        assert_eq!(time(1), 2.0);
    }

    #[test]
    fn test_uniform_locations_exposed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "basic.vert.wgsl", VERTEX);
        write(&dir, "basic.frag.wgsl", FRAGMENT);

        let mut program = program(&dir);
        program.attach_graphics("basic.vert.wgsl", "basic.frag.wgsl", None);
        assert!(program.uniform_location("tint").is_none());
        program.build(&MockBackend::default());
        assert_eq!(program.uniform_location("tint").unwrap().offset, 64);
        assert_eq!(program.uniforms().blocks()[0].size, 80);
    }
}
