//! Materials.
//!
//! A [`Material`] selects one shader type per stage, carries the scalar and
//! texture parameters those shaders read, and lazily resolves the concrete
//! shader instances for every vertex factory layout it is drawn with.
//!
//! Only an asset reference of a material is ever serialized; see
//! [`save_material_ref`] and [`load_material_ref`].

mod material;
mod reference;

pub use material::{Material, MaterialRef, MaterialUsage};
pub use reference::{load_material_ref, save_material_ref};
