//! Loading of external assets.
//!
//! Native builds read files below an asset directory (`./assets` unless told
//! otherwise), web builds fetch them relative to the page origin. Texture sets
//! and material assembly live in [`texture`].

pub mod texture;

use anyhow::Context as _;

/// Where asset files are looked up.
#[derive(Debug, Clone)]
pub struct Assets {
    root: String,
}

impl Default for Assets {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl Assets {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub async fn load_binary(&self, file_name: &str) -> anyhow::Result<Vec<u8>> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = format_url(&self.root, file_name)?;
            reqwest::get(url).await?.bytes().await?.to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = std::path::Path::new(&self.root).join(file_name);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?
        };

        Ok(data)
    }

    pub async fn load_image(&self, file_name: &str) -> anyhow::Result<image::DynamicImage> {
        let data = self.load_binary(file_name).await?;
        let img = image::load_from_memory(&data).with_context(|| format!("decoding {file_name}"))?;
        log::debug!("loaded {file_name}: {}", crate::data_structures::texture::describe(&img));
        Ok(img)
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("page origin unavailable: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/{}/", root.trim_matches('/')))?;
    Ok(base.join(file_name)?)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_errors_with_the_path() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let assets = Assets::new("does-not-exist");
        let err = runtime
            .block_on(assets.load_binary("floor/alpha.webp"))
            .unwrap_err();
        assert!(format!("{err:#}").contains("floor/alpha.webp"));
    }
}
