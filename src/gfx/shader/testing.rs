//! In-memory backend for exercising program builds without a GPU.

use std::cell::{Cell, RefCell};

use super::backend::{BindProgram, LinkedProgram, ShaderBackend};
use super::reflect::{UniformLayout, UniformLocation};
use super::stage::{ProgramKind, ShaderStage};

/// Sources containing this marker fail to compile.
pub const FAIL_COMPILE: &str = "mock: fail-compile";
/// Sources containing this marker compile but fail to link.
pub const FAIL_LINK: &str = "mock: fail-link";

#[derive(Debug)]
pub struct MockModule {
    pub stage: ShaderStage,
    pub source: String,
}

#[derive(Debug)]
pub struct MockProgram {
    pub id: u32,
    pub stages: Vec<ShaderStage>,
    pub writes: RefCell<Vec<(usize, u64, Vec<u8>)>>,
    /// Current contents of each uniform block.
    pub blocks: RefCell<Vec<Vec<u8>>>,
}

impl LinkedProgram for MockProgram {
    fn write_uniform(&self, location: &UniformLocation, bytes: &[u8]) {
        self.writes
            .borrow_mut()
            .push((location.block, location.offset, bytes.to_vec()));
        if let Some(block) = self.blocks.borrow_mut().get_mut(location.block) {
            let start = location.offset as usize;
            block[start..start + bytes.len()].copy_from_slice(bytes);
        }
    }
}

/// Records every compile and link call.
#[derive(Debug, Default)]
pub struct MockBackend {
    pub compiled: RefCell<Vec<ShaderStage>>,
    pub linked: RefCell<Vec<Vec<ShaderStage>>>,
    next_id: Cell<u32>,
}

impl ShaderBackend for MockBackend {
    type Module = MockModule;
    type Program = MockProgram;
    type Config = ();

    fn compile(&self, stage: ShaderStage, _label: &str, source: &str) -> Result<MockModule, String> {
        self.compiled.borrow_mut().push(stage);
        if source.contains(FAIL_COMPILE) {
            return Err(format!("error: bad {} source", stage));
        }
        Ok(MockModule {
            stage,
            source: source.to_string(),
        })
    }

    fn link(
        &self,
        _label: &str,
        _kind: ProgramKind,
        stages: &[(ShaderStage, &MockModule)],
        uniforms: &UniformLayout,
        _config: &(),
    ) -> Result<MockProgram, String> {
        let order: Vec<ShaderStage> = stages.iter().map(|(stage, _)| *stage).collect();
        self.linked.borrow_mut().push(order.clone());
        if stages.iter().any(|(_, module)| module.source.contains(FAIL_LINK)) {
            return Err("error: unresolved symbol".to_string());
        }

        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        Ok(MockProgram {
            id,
            stages: order,
            writes: RefCell::new(Vec::new()),
            blocks: RefCell::new(
                uniforms
                    .blocks()
                    .iter()
                    .map(|block| vec![0; block.size as usize])
                    .collect(),
            ),
        })
    }
}

/// Pass that remembers which programs were bound and the uniform blocks each bind saw.
#[derive(Debug, Default)]
pub struct MockPass {
    pub bound: Vec<u32>,
    pub snapshots: Vec<Vec<Vec<u8>>>,
}

impl BindProgram<MockProgram> for MockPass {
    fn bind_program(&mut self, program: &MockProgram) {
        self.bound.push(program.id);
        self.snapshots.push(program.blocks.borrow().clone());
    }
}
