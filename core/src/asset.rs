//! Asset identity.
//!
//! An asset is addressed by the package it lives in plus a hash of its name
//! inside that package. Live objects never get serialized; only an
//! [`AssetReference`] does, and loading resolves it back through an
//! [`AssetResolver`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::hash::{INVALID_HASH, fnv1a_hash};

/// Kind of asset stored in a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetType {
    #[default]
    Unknown,
    Texture2D,
    Material,
    StaticMesh,
}

impl AssetType {
    /// Name used in textual asset paths (`Material'Package:Name`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Texture2D => "Texture2D",
            Self::Material => "Material",
            Self::StaticMesh => "StaticMesh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Texture2D" => Some(Self::Texture2D),
            "Material" => Some(Self::Material),
            "StaticMesh" => Some(Self::StaticMesh),
            _ => None,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a textual asset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPathError {
    /// The path has no `Type'` prefix.
    MissingType(String),
    /// The prefix names no known asset type.
    UnknownType(String),
    /// The path has no `Package:Name` body.
    MissingName(String),
}

impl fmt::Display for AssetPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingType(path) => write!(f, "asset path '{path}' has no type prefix"),
            Self::UnknownType(name) => write!(f, "unknown asset type '{name}'"),
            Self::MissingName(path) => {
                write!(f, "asset path '{path}' is not of the form Package:Name")
            }
        }
    }
}

impl std::error::Error for AssetPathError {}

/// Serialized identity of an asset: `(package path, asset hash)` plus its type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetReference {
    pub asset_type: AssetType,
    pub package_path: String,
    pub hash: u32,
}

impl AssetReference {
    pub fn new(asset_type: AssetType, package_path: impl Into<String>, hash: u32) -> Self {
        Self {
            asset_type,
            package_path: package_path.into(),
            hash,
        }
    }

    /// Reference for the asset `name` inside `package_path`.
    pub fn from_name(asset_type: AssetType, package_path: impl Into<String>, name: &str) -> Self {
        Self::new(asset_type, package_path, Self::asset_hash(name))
    }

    /// The reference written for a null object.
    pub fn invalid() -> Self {
        Self::new(AssetType::Unknown, String::new(), INVALID_HASH)
    }

    pub fn is_valid(&self) -> bool {
        self.hash != INVALID_HASH && !self.package_path.is_empty()
    }

    /// Hash of an asset name inside its package.
    pub fn asset_hash(name: &str) -> u32 {
        fnv1a_hash(name.as_bytes())
    }

    /// Parse `Type'Package:Name`, e.g. `Material'EditorMaterials:AxisX_Mat`.
    pub fn parse(path: &str) -> Result<Self, AssetPathError> {
        let (type_name, body) = path
            .split_once('\'')
            .ok_or_else(|| AssetPathError::MissingType(path.to_string()))?;
        let asset_type = AssetType::from_name(type_name)
            .ok_or_else(|| AssetPathError::UnknownType(type_name.to_string()))?;
        let body = body.trim_end_matches('\'');
        match body.split_once(':') {
            Some((package, name)) if !package.is_empty() && !name.is_empty() => {
                Ok(Self::from_name(asset_type, package, name))
            }
            _ => Err(AssetPathError::MissingName(path.to_string())),
        }
    }
}

impl Default for AssetReference {
    fn default() -> Self {
        Self::invalid()
    }
}

impl FromStr for AssetReference {
    type Err = AssetPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AssetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}'{}:{:08x}",
            self.asset_type, self.package_path, self.hash
        )
    }
}

/// Looks assets up by reference. Lookups may fail; callers treat `None` as
/// "asset unavailable".
pub trait AssetResolver<T>: Send + Sync {
    fn find_asset(&self, reference: &AssetReference) -> Option<Arc<T>>;
}

/// In-memory asset table for one asset type.
pub struct AssetRegistry<T> {
    asset_type: AssetType,
    assets: RwLock<HashMap<(String, u32), Arc<T>>>,
}

impl<T> AssetRegistry<T> {
    pub fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            assets: RwLock::new(HashMap::new()),
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Register an asset. Returns the previously registered asset under the
    /// same identity, if any. Invalid or mistyped references are ignored.
    pub fn register(&self, reference: &AssetReference, asset: Arc<T>) -> Option<Arc<T>> {
        if !reference.is_valid() || reference.asset_type != self.asset_type {
            log::warn!(
                "AssetRegistry: refusing to register {} in a {} registry",
                reference,
                self.asset_type
            );
            return None;
        }
        log::trace!("AssetRegistry: registered {}", reference);
        self.assets
            .write()
            .insert((reference.package_path.clone(), reference.hash), asset)
    }

    pub fn unregister(&self, reference: &AssetReference) -> Option<Arc<T>> {
        self.assets
            .write()
            .remove(&(reference.package_path.clone(), reference.hash))
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

impl<T: Send + Sync> AssetResolver<T> for AssetRegistry<T> {
    fn find_asset(&self, reference: &AssetReference) -> Option<Arc<T>> {
        if !reference.is_valid() || reference.asset_type != self.asset_type {
            return None;
        }
        self.assets
            .read()
            .get(&(reference.package_path.clone(), reference.hash))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_editor_material_path() {
        let reference = AssetReference::parse("Material'EditorMaterials:AxisX_Mat").unwrap();
        assert_eq!(reference.asset_type, AssetType::Material);
        assert_eq!(reference.package_path, "EditorMaterials");
        assert_eq!(reference.hash, AssetReference::asset_hash("AxisX_Mat"));
        assert!(reference.is_valid());
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert!(matches!(
            AssetReference::parse("EditorMaterials:AxisX_Mat"),
            Err(AssetPathError::MissingType(_))
        ));
        assert!(matches!(
            AssetReference::parse("Sound'Pkg:Name"),
            Err(AssetPathError::UnknownType(_))
        ));
        assert!(matches!(
            AssetReference::parse("Material'NoName"),
            Err(AssetPathError::MissingName(_))
        ));
    }

    #[test]
    fn invalid_reference_is_default() {
        assert!(!AssetReference::default().is_valid());
        assert_eq!(AssetReference::default().hash, INVALID_HASH);
    }

    #[test]
    fn registry_resolves_by_identity() {
        let registry = AssetRegistry::new(AssetType::Material);
        let reference = AssetReference::from_name(AssetType::Material, "Pkg", "Mat");
        let asset = Arc::new(7u32);
        registry.register(&reference, asset.clone());

        let found = registry.find_asset(&reference).unwrap();
        assert!(Arc::ptr_eq(&found, &asset));

        let other = AssetReference::from_name(AssetType::Material, "Pkg", "Other");
        assert!(registry.find_asset(&other).is_none());
        assert!(registry.find_asset(&AssetReference::invalid()).is_none());
    }

    #[test]
    fn registry_rejects_wrong_type() {
        let registry = AssetRegistry::new(AssetType::Material);
        let reference = AssetReference::from_name(AssetType::Texture2D, "Pkg", "Tex");
        assert!(registry.register(&reference, Arc::new(1u32)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn reference_survives_bincode() {
        let reference = AssetReference::parse("Texture2D'Textures:Checker").unwrap();
        let bytes = bincode::serialize(&reference).unwrap();
        let back: AssetReference = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, reference);
    }
}
