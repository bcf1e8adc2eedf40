//! 2D texture assets.

use std::sync::Arc;

use redlilium_core::asset::AssetReference;

use crate::rhi::{PixelFormat, Rhi, TextureRhiRef};

/// A 2D texture asset and its device resource.
///
/// The device resource is created by [`init_rhi`](Texture2D::init_rhi). A
/// texture without one is still a valid material parameter; it just binds
/// nothing.
#[derive(Debug, Clone)]
pub struct Texture2D {
    name: String,
    asset_reference: AssetReference,
    width: u32,
    height: u32,
    format: PixelFormat,
    rhi: Option<TextureRhiRef>,
}

impl Texture2D {
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            name: name.into(),
            asset_reference: AssetReference::invalid(),
            width,
            height,
            format,
            rhi: None,
        }
    }

    pub fn with_asset_reference(mut self, asset_reference: AssetReference) -> Self {
        self.asset_reference = asset_reference;
        self
    }

    /// Upload `data` to the device. Returns `false` if the device refused it.
    pub fn init_rhi(&mut self, rhi: &dyn Rhi, data: &[u8]) -> bool {
        self.rhi = rhi.create_texture_2d(&self.name, self.width, self.height, self.format, data);
        if self.rhi.is_none() {
            log::warn!(
                "Texture '{}': device returned no texture for {}x{} {:?}",
                self.name,
                self.width,
                self.height,
                self.format
            );
        }
        self.rhi.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn asset_reference(&self) -> &AssetReference {
        &self.asset_reference
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn rhi(&self) -> Option<&TextureRhiRef> {
        self.rhi.as_ref()
    }
}

pub type Texture2DRef = Arc<Texture2D>;

static_assertions::assert_impl_all!(Texture2D: Send, Sync);
