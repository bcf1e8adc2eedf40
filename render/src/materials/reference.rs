//! Material reference serialization.
//!
//! A reference is written as the material's [`AssetReference`]; a null
//! reference, or a material that was never saved to a package, is written
//! as the invalid reference. Loading resolves through an
//! [`AssetResolver`] and yields `None` when the asset is unavailable.

use std::io::{Read, Write};

use redlilium_core::asset::{AssetReference, AssetResolver};

use super::material::{Material, MaterialRef};
use crate::error::RenderError;

/// Write a material reference.
pub fn save_material_ref<W: Write>(
    writer: &mut W,
    material: Option<&MaterialRef>,
) -> Result<(), RenderError> {
    let reference = material.map_or_else(AssetReference::invalid, |material| {
        material.asset_reference().clone()
    });
    bincode::serialize_into(writer, &reference)?;
    Ok(())
}

/// Read a material reference and resolve it.
///
/// `Ok(None)` means the reference was null or did not resolve. Errors are
/// returned only for malformed input.
pub fn load_material_ref<R: Read>(
    reader: &mut R,
    resolver: &dyn AssetResolver<Material>,
) -> Result<Option<MaterialRef>, RenderError> {
    let reference: AssetReference = bincode::deserialize_from(reader)?;
    if !reference.is_valid() {
        return Ok(None);
    }
    let material = resolver.find_asset(&reference);
    if material.is_none() {
        log::warn!("Material {} is not available", reference);
    }
    Ok(material)
}
