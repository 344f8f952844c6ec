use std::path::Path;

use anyhow::Context;
use bhuvan_shared::catalog::{self, CatalogLayer, LayerKind};

pub struct Assets {
    pub layers: Vec<CatalogLayer>,
}

impl Assets {
    /// Read `layers.json` from `assets_dir`, or fall back to the built-in catalog
    /// when the file does not exist.
    pub fn load(assets_dir: &Path) -> anyhow::Result<Self> {
        let layers_path = assets_dir.join("layers.json");
        let layers = match std::fs::read_to_string(&layers_path) {
            Ok(data) => serde_json::from_str::<Vec<CatalogLayer>>(&data)
                .with_context(|| format!("Failed to parse {}", layers_path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %layers_path.display(), "no layer catalog file, using built-in layers");
                catalog::builtin()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", layers_path.display()))
            }
        };

        tracing::info!(layers = layers.len(), "Loaded layer catalog");

        Ok(Assets { layers })
    }

    pub fn layers_of(&self, kind: Option<LayerKind>) -> impl Iterator<Item = &CatalogLayer> {
        self.layers
            .iter()
            .filter(move |l| kind.is_none_or(|k| l.kind == k))
    }
}
