//! Named uniform locations recovered from WGSL source.
//!
//! Every `var<uniform>` declared in bind group 0 becomes a block backed by its own buffer.
//! Leaf members (scalars, vectors, matrices) get a location addressable by name:
//!
//! - struct members by their own name (`model`) and qualified by the variable (`u.model`),
//! - nested struct members by dotted path (`light.color`),
//! - array elements by index (`offsets[2]`), the bare array name meaning element 0,
//! - non-struct variables by the variable name.
//!
//! A bare member name declared by more than one block is ambiguous and only reachable in
//! its qualified form. Each stage source is parsed as its own module by naga, whose
//! layouter supplies member offsets, array strides and block sizes.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use wgpu::naga::{self, front::wgsl, AddressSpace, ArraySize, Handle, Module, TypeInner};

/// Scalar component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    F32,
    I32,
    U32,
}

/// Type of a leaf uniform member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Scalar(ScalarKind),
    /// `vecN<T>` with N in 2..=4.
    Vector(u8, ScalarKind),
    /// Square `matNxN<f32>` with N in 2..=4.
    Matrix(u8),
}

impl MemberType {
    pub fn align(self) -> u64 {
        match self {
            MemberType::Scalar(_) => 4,
            MemberType::Vector(2, _) => 8,
            MemberType::Vector(_, _) => 16,
            MemberType::Matrix(n) => MemberType::Vector(n, ScalarKind::F32).align(),
        }
    }

    pub fn size(self) -> u64 {
        match self {
            MemberType::Scalar(_) => 4,
            MemberType::Vector(n, _) => 4 * n as u64,
            MemberType::Matrix(n) => self.column_stride() * n as u64,
        }
    }

    /// Distance between matrix columns; zero for non-matrix types.
    pub fn column_stride(self) -> u64 {
        match self {
            MemberType::Matrix(n) => {
                let column = MemberType::Vector(n, ScalarKind::F32);
                column.size().div_ceil(column.align()) * column.align()
            }
            _ => 0,
        }
    }
}

/// Where a named uniform lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    /// Index into [`UniformLayout::blocks`].
    pub block: usize,
    pub offset: u64,
    pub ty: MemberType,
}

/// One `var<uniform>` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub binding: u32,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReflectError {
    #[error("invalid WGSL: {0}")]
    Parse(String),
    #[error("type `{0}` is not supported in uniform blocks")]
    UnsupportedType(String),
    #[error("uniform `{0}` has no @group/@binding attributes")]
    MissingBinding(String),
    #[error("conflicting declarations for uniform binding {0}")]
    ConflictingBinding(u32),
}

/// Named uniform locations of a linked program.
#[derive(Debug, Clone, Default)]
pub struct UniformLayout {
    blocks: Vec<UniformBlock>,
    locations: HashMap<String, UniformLocation>,
}

/// A block as declared by one stage, before names are assigned.
struct DeclaredBlock {
    block: UniformBlock,
    ty: Resolved,
}

impl UniformLayout {
    /// Reflects the uniform declarations of all stage sources of one program.
    ///
    /// A block repeated in several stages must be declared identically. Blocks are ordered
    /// by binding number.
    pub fn reflect<S: AsRef<str>>(sources: &[S]) -> Result<Self, ReflectError> {
        let mut declared: Vec<DeclaredBlock> = Vec::new();

        for source in sources {
            let module = wgsl::parse_str(source.as_ref())
                .map_err(|e| ReflectError::Parse(e.message().to_string()))?;

            for (_, var) in module.global_variables.iter() {
                if var.space != AddressSpace::Uniform {
                    continue;
                }
                let name = var.name.clone().unwrap_or_default();
                let binding = var
                    .binding
                    .as_ref()
                    .ok_or_else(|| ReflectError::MissingBinding(name.clone()))?;
                if binding.group != 0 {
                    log::debug!("ignoring uniform `{}` in bind group {}", name, binding.group);
                    continue;
                }

                let ty = resolve(&module, var.ty)?;
                let size = module.types[var.ty].inner.size(module.to_ctx()) as u64;

                let existing = declared.iter().find(|d| d.block.binding == binding.binding);
                if let Some(existing) = existing {
                    if existing.block.name == name && existing.ty == ty {
                        continue;
                    }
                    return Err(ReflectError::ConflictingBinding(binding.binding));
                }

                declared.push(DeclaredBlock {
                    block: UniformBlock {
                        name,
                        binding: binding.binding,
                        size,
                    },
                    ty,
                });
            }
        }

        declared.sort_by_key(|d| d.block.binding);

        let mut layout = UniformLayout::default();
        let mut ambiguous = HashSet::new();
        for (index, DeclaredBlock { block, ty }) in declared.into_iter().enumerate() {
            match &ty {
                Resolved::Struct(members) => {
                    for member in members {
                        let qualified = format!("{}.{}", block.name, member.name);
                        for name in [member.name.as_str(), qualified.as_str()] {
                            let offset = member.offset;
                            layout.insert_tree(&mut ambiguous, index, offset, name, &member.ty);
                        }
                    }
                }
                other => layout.insert_tree(&mut ambiguous, index, 0, &block.name, other),
            }
            layout.blocks.push(block);
        }

        for name in ambiguous {
            log::debug!("uniform name `{}` is declared by several blocks", name);
            layout.locations.remove(&name);
        }

        Ok(layout)
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    pub fn location(&self, name: &str) -> Option<&UniformLocation> {
        self.locations.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    fn insert_tree(
        &mut self,
        ambiguous: &mut HashSet<String>,
        block: usize,
        offset: u64,
        name: &str,
        ty: &Resolved,
    ) {
        match ty {
            Resolved::Leaf(leaf) => {
                let location = UniformLocation {
                    block,
                    offset,
                    ty: *leaf,
                };
                match self.locations.entry(name.to_string()) {
                    Entry::Vacant(entry) => {
                        entry.insert(location);
                    }
                    Entry::Occupied(entry) => {
                        if entry.get().block != block {
                            ambiguous.insert(name.to_string());
                        }
                    }
                }
            }
            Resolved::Array { element, count, stride } => {
                for i in 0..*count {
                    let element_name = format!("{}[{}]", name, i);
                    let element_offset = offset + stride * i as u64;
                    self.insert_tree(ambiguous, block, element_offset, &element_name, element);
                }
                if *count > 0 {
                    self.insert_tree(ambiguous, block, offset, name, element);
                }
            }
            Resolved::Struct(members) => {
                for member in members {
                    let member_name = format!("{}.{}", name, member.name);
                    let member_offset = offset + member.offset;
                    self.insert_tree(ambiguous, block, member_offset, &member_name, &member.ty);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Leaf(MemberType),
    Array {
        element: Box<Resolved>,
        count: u32,
        stride: u64,
    },
    Struct(Vec<ResolvedMember>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedMember {
    name: String,
    offset: u64,
    ty: Resolved,
}

fn scalar_kind(scalar: naga::Scalar) -> Option<ScalarKind> {
    match (scalar.kind, scalar.width) {
        (naga::ScalarKind::Float, 4) => Some(ScalarKind::F32),
        (naga::ScalarKind::Sint, 4) => Some(ScalarKind::I32),
        (naga::ScalarKind::Uint, 4) => Some(ScalarKind::U32),
        _ => None,
    }
}

fn resolve(module: &Module, handle: Handle<naga::Type>) -> Result<Resolved, ReflectError> {
    let unsupported = || ReflectError::UnsupportedType(type_name(module, handle));

    let resolved = match module.types[handle].inner {
        TypeInner::Scalar(scalar) => {
            Resolved::Leaf(MemberType::Scalar(scalar_kind(scalar).ok_or_else(unsupported)?))
        }
        TypeInner::Vector { size, scalar } => Resolved::Leaf(MemberType::Vector(
            size as u8,
            scalar_kind(scalar).ok_or_else(unsupported)?,
        )),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } if columns == rows && scalar_kind(scalar) == Some(ScalarKind::F32) => {
            Resolved::Leaf(MemberType::Matrix(columns as u8))
        }
        TypeInner::Array {
            base,
            size: ArraySize::Constant(count),
            stride,
        } => Resolved::Array {
            element: Box::new(resolve(module, base)?),
            count: count.get(),
            stride: stride as u64,
        },
        TypeInner::Struct { ref members, .. } => Resolved::Struct(
            members
                .iter()
                .map(|member| {
                    Ok(ResolvedMember {
                        name: member.name.clone().unwrap_or_default(),
                        offset: member.offset as u64,
                        ty: resolve(module, member.ty)?,
                    })
                })
                .collect::<Result<_, ReflectError>>()?,
        ),
        _ => return Err(unsupported()),
    };
    Ok(resolved)
}

fn scalar_name(scalar: naga::Scalar) -> String {
    let bits = scalar.width as u32 * 8;
    match scalar.kind {
        naga::ScalarKind::Bool => "bool".to_string(),
        naga::ScalarKind::Float => format!("f{}", bits),
        naga::ScalarKind::Sint => format!("i{}", bits),
        naga::ScalarKind::Uint => format!("u{}", bits),
        naga::ScalarKind::AbstractInt | naga::ScalarKind::AbstractFloat => "abstract".to_string(),
    }
}

/// Short WGSL-like spelling of a type for diagnostics.
fn type_name(module: &Module, handle: Handle<naga::Type>) -> String {
    let ty = &module.types[handle];
    if let Some(name) = &ty.name {
        return name.clone();
    }
    match ty.inner {
        TypeInner::Scalar(scalar) => scalar_name(scalar),
        TypeInner::Vector { size, scalar } => format!("vec{}<{}>", size as u8, scalar_name(scalar)),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => format!("mat{}x{}<{}>", columns as u8, rows as u8, scalar_name(scalar)),
        TypeInner::Atomic(scalar) => format!("atomic<{}>", scalar_name(scalar)),
        TypeInner::Array { .. } | TypeInner::BindingArray { .. } => "array".to_string(),
        _ => "opaque type".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GLOBALS: &str = r#"
        // camera and model transforms
        struct Globals {
            view_proj: mat4x4<f32>,
            model: mat4x4f,
            tint: vec3<f32>,
            time: f32,
            scale: vec2f,
            flags: u32,
        };

        @group(0) @binding(0) var<uniform> globals: Globals;

        @vertex
        fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
            let x = f32(i) * globals.time;
            return globals.view_proj * vec4<f32>(x, 0.0, 0.0, 1.0);
        }
    "#;

    fn offset(layout: &UniformLayout, name: &str) -> u64 {
        layout.location(name).unwrap_or_else(|| panic!("missing {}", name)).offset
    }

    #[test]
    fn test_struct_member_offsets() {
        let layout = UniformLayout::reflect(&[GLOBALS]).unwrap();
        assert_eq!(layout.blocks().len(), 1);
        assert_eq!(offset(&layout, "view_proj"), 0);
        assert_eq!(offset(&layout, "model"), 64);
        assert_eq!(offset(&layout, "tint"), 128);
        // f32 packs into the vec3 tail
        assert_eq!(offset(&layout, "time"), 140);
        assert_eq!(offset(&layout, "scale"), 144);
        assert_eq!(offset(&layout, "flags"), 152);
        assert_eq!(layout.blocks()[0].size, 160);
        assert_eq!(
            layout.location("globals.tint").unwrap().ty,
            MemberType::Vector(3, ScalarKind::F32)
        );
    }

    #[test]
    fn test_matrix_strides() {
        assert_eq!(MemberType::Matrix(2).size(), 16);
        assert_eq!(MemberType::Matrix(3).size(), 48);
        assert_eq!(MemberType::Matrix(3).column_stride(), 16);
        assert_eq!(MemberType::Matrix(4).size(), 64);
    }

    #[test]
    fn test_plain_uniform_and_bindings() {
        let src = r#"
            @group(0) @binding(1) var<uniform> exposure: f32;
            @group(0) @binding(0) var<uniform> color: vec4f;
            @group(1) @binding(0) var<uniform> ignored: vec4f;
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert_eq!(layout.blocks().len(), 2);
        // ordered by binding
        assert_eq!(layout.blocks()[0].name, "color");
        let exposure = layout.location("exposure").unwrap();
        assert_eq!(layout.blocks()[exposure.block].binding, 1);
        assert_eq!(layout.blocks()[exposure.block].size, 4);
        assert!(layout.location("ignored").is_none());
    }

    #[test]
    fn test_nested_structs_and_arrays() {
        let src = r#"
            struct Light { color: vec3<f32>, intensity: f32 }
            struct Lights {
                count: u32,
                lights: array<Light, 2>,
                weights: array<vec4<f32>, 3>,
            }
            @group(0) @binding(0) var<uniform> u: Lights;
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert_eq!(offset(&layout, "count"), 0);
        assert_eq!(offset(&layout, "lights[0].color"), 16);
        assert_eq!(offset(&layout, "lights[0].intensity"), 28);
        assert_eq!(offset(&layout, "lights[1].color"), 32);
        assert_eq!(offset(&layout, "weights[0]"), 48);
        assert_eq!(offset(&layout, "weights"), 48);
        assert_eq!(offset(&layout, "u.weights[2]"), 80);
    }

    #[test]
    fn test_explicit_align_and_size_attributes() {
        let src = r#"
            struct U {
                a: f32,
                @align(16) b: f32,
                @size(32) c: vec4<f32>,
                d: f32,
            }
            @group(0) @binding(0) var<uniform> u: U;
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert_eq!(offset(&layout, "b"), 16);
        assert_eq!(offset(&layout, "c"), 32);
        assert_eq!(offset(&layout, "d"), 64);
        assert_eq!(layout.blocks()[0].size, 80);
    }

    #[test]
    fn test_const_sized_array() {
        let src = r#"
            const N: u32 = 4u;
            struct Palette { colors: array<vec4<f32>, N>, count: u32 }
            @group(0) @binding(0) var<uniform> palette: Palette;
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert_eq!(offset(&layout, "colors[3]"), 48);
        assert_eq!(offset(&layout, "count"), 64);
        assert_eq!(layout.blocks()[0].size, 80);
    }

    #[test]
    fn test_same_struct_name_in_each_stage() {
        let vertex = r#"
            struct Params { offset: vec4<f32> }
            @group(0) @binding(0) var<uniform> vp: Params;
        "#;
        let fragment = r#"
            struct Params { gain: f32, bias: f32 }
            @group(0) @binding(1) var<uniform> fp: Params;
        "#;
        let layout = UniformLayout::reflect(&[vertex, fragment]).unwrap();
        assert_eq!(layout.blocks().len(), 2);
        assert_eq!(layout.blocks()[0].size, 16);
        assert_eq!(layout.blocks()[1].size, 8);
        assert_eq!(layout.location("vp.offset").unwrap().block, 0);
        assert!(layout.location("vp.gain").is_none());
        assert_eq!(offset(&layout, "fp.bias"), 4);
    }

    #[test]
    fn test_identical_blocks_across_stages_merge() {
        let fragment = r#"
            /* shared /* nested */ block */
            struct Globals { view_proj: mat4x4<f32>, model: mat4x4f, tint: vec3<f32>, time: f32, scale: vec2f, flags: u32 }
            @group(0) @binding(0) var<uniform> globals: Globals;
            @fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(globals.tint, 1.0); }
        "#;
        let layout = UniformLayout::reflect(&[GLOBALS, fragment]).unwrap();
        assert_eq!(layout.blocks().len(), 1);
        assert_eq!(offset(&layout, "time"), 140);
    }

    #[test]
    fn test_conflicting_blocks_fail() {
        let a = "@group(0) @binding(0) var<uniform> a: vec4f;";
        let b = "@group(0) @binding(0) var<uniform> b: f32;";
        assert_eq!(
            UniformLayout::reflect(&[a, b]).unwrap_err(),
            ReflectError::ConflictingBinding(0)
        );
    }

    #[test]
    fn test_same_size_different_members_conflict() {
        let a = "struct P { x: f32, y: f32 } @group(0) @binding(0) var<uniform> p: P;";
        let b = "struct P { y: f32, x: f32 } @group(0) @binding(0) var<uniform> p: P;";
        assert_eq!(
            UniformLayout::reflect(&[a, b]).unwrap_err(),
            ReflectError::ConflictingBinding(0)
        );
    }

    #[test]
    fn test_shared_member_name_is_only_qualified() {
        let src = r#"
            struct A { time: f32, scale: f32 }
            struct B { time: f32 }
            @group(0) @binding(0) var<uniform> a: A;
            @group(0) @binding(1) var<uniform> b: B;
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert!(layout.location("time").is_none());
        assert_eq!(layout.location("a.time").unwrap().block, 0);
        assert_eq!(layout.location("b.time").unwrap().block, 1);
        assert_eq!(offset(&layout, "scale"), 4);
    }

    #[test]
    fn test_unsupported_and_invalid_types() {
        let unknown = "@group(0) @binding(0) var<uniform> a: Missing;";
        assert!(matches!(
            UniformLayout::reflect(&[unknown]),
            Err(ReflectError::Parse(_))
        ));
        let boolean = "@group(0) @binding(0) var<uniform> a: bool;";
        assert_eq!(
            UniformLayout::reflect(&[boolean]).unwrap_err(),
            ReflectError::UnsupportedType("bool".to_string())
        );
    }

    #[test]
    fn test_missing_binding() {
        let src = "var<uniform> a: vec4f;";
        assert_eq!(
            UniformLayout::reflect(&[src]).unwrap_err(),
            ReflectError::MissingBinding("a".to_string())
        );
    }

    #[test]
    fn test_non_uniform_vars_are_skipped() {
        let src = r#"
            @group(0) @binding(0) var<storage, read_write> cells: array<u32>;
            @group(0) @binding(1) var t: texture_2d<f32>;
            var<private> seed: u32 = 7u;
            @compute @workgroup_size(8, 8) fn cs_main() {}
        "#;
        let layout = UniformLayout::reflect(&[src]).unwrap();
        assert!(layout.is_empty());
    }
}
