/* Stage 1. Every image description document is read and parsed in parallel, then the images are
 * merged (in command-line order) into one `ImageRegistry`. The registry is an arena: images are
 * addressed by `ImageToken`s, which stay valid for the whole run, so the resolver can keep its
 * working order as a plain vector of tokens.
 */

use std::collections::HashMap;
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use vec_map::VecDict;

use crate::errors::LayoutError;
use crate::misc::{ImageToken, APP};
use crate::processing_stage_2::SizeOverrides;
use crate::schemes::{ImageGroupScheme, Placement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub name: String,
    pub placement: Placement,
    pub size: Option<u64>,
    pub address: Option<u64>,
    pub out_path: Option<PathBuf>,
}

impl Image {
    pub fn new(name: &str, placement: Placement, size: Option<u64>) -> Self {
        Image {
            name: name.to_string(),
            placement,
            size,
            address: None,
            out_path: None,
        }
    }
}

#[derive(Debug)]
pub struct ImageRegistry {
    images: VecDict<ImageToken, Image>,
    tokens: HashMap<String, ImageToken>,
    overrides: SizeOverrides,
    app: ImageToken,
}

impl Default for ImageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageRegistry {
    /// Creates a registry holding only the application image.
    pub fn new() -> Self {
        let mut images = VecDict::new(0);
        let app = images.push(Image::new(APP, Placement::Unconstrained, None));

        ImageRegistry {
            images,
            tokens: HashMap::from([(APP.to_string(), app)]),
            overrides: SizeOverrides::new(),
            app,
        }
    }

    pub fn with_images<I: IntoIterator<Item = Image>>(images: I) -> Result<Self, LayoutError> {
        let mut registry = ImageRegistry::new();
        for image in images {
            registry.insert(image)?;
        }
        Ok(registry)
    }

    /// Adds an image. A name that is already known is replaced as a whole, keeping its token.
    pub fn insert(&mut self, image: Image) -> Result<ImageToken, LayoutError> {
        if image.name == APP {
            return Err(LayoutError::ReservedName(image.name));
        }

        match self.tokens.get(&image.name) {
            Some(&token) => {
                warn!(
                    "image `{}` is declared more than once, using the last declaration",
                    image.name
                );
                self.images.insert(&token, image);
                Ok(token)
            }
            None => {
                let name = image.name.clone();
                let token = self.images.push(image);
                self.tokens.insert(name, token);
                Ok(token)
            }
        }
    }

    pub fn set_overrides(&mut self, overrides: SizeOverrides) {
        self.overrides = overrides;
    }

    pub fn app(&self) -> ImageToken {
        self.app
    }

    pub fn token(&self, name: &str) -> Option<ImageToken> {
        self.tokens.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Tokens in the order the images were first declared, the application image first.
    pub fn tokens(&self) -> impl Iterator<Item = ImageToken> + '_ {
        self.images.tok_iter().map(|(token, _)| token)
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.images.values()
    }

    pub fn get(&self, name: &str) -> Option<&Image> {
        self.token(name).map(|token| &self.images[&token])
    }

    /// The declared size, falling back to the configured override.
    pub fn resolve_size(&self, token: ImageToken) -> Result<u64, LayoutError> {
        let image = &self.images[&token];

        image
            .size
            .or_else(|| self.overrides.get(&image.name.to_lowercase()).copied())
            .ok_or_else(|| LayoutError::MissingSize(image.name.clone()))
    }
}

impl Index<&ImageToken> for ImageRegistry {
    type Output = Image;

    fn index(&self, token: &ImageToken) -> &Self::Output {
        &self.images[token]
    }
}

impl IndexMut<&ImageToken> for ImageRegistry {
    fn index_mut(&mut self, token: &ImageToken) -> &mut Self::Output {
        &mut self.images[token]
    }
}

/// Reads one document. Only its first image gets an output header, `output_file_name` placed next
/// to the document.
pub fn read_image_group(path: &Path, output_file_name: &str) -> Result<Vec<Image>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read image description `{}`", path.display()))?;

    let group: ImageGroupScheme = serde_yaml::from_str(&content)
        .with_context(|| format!("Cannot parse image description `{}`", path.display()))?;

    let out_path = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(output_file_name);

    let mut images = Vec::with_capacity(group.len());

    for (index, (name, scheme)) in group.into_iter().enumerate() {
        let placement = Placement::from_scheme(&name, scheme.placement)
            .with_context(|| format!("In image description `{}`", path.display()))?;

        let mut image = Image::new(&name, placement, scheme.size);
        if index == 0 {
            image.out_path = Some(out_path.clone());
        } else {
            debug!("image `{}` shares `{}` and gets no output", name, path.display());
        }
        images.push(image);
    }

    Ok(images)
}

pub fn load_registry(input_files: &[PathBuf], output_file_name: &str) -> Result<ImageRegistry> {
    let groups: Vec<Vec<Image>> = input_files
        .par_iter()
        .map(|path| read_image_group(path, output_file_name))
        .collect::<Result<_>>()?;

    let mut registry = ImageRegistry::new();
    for image in groups.into_iter().flatten() {
        registry.insert(image)?;
    }

    Ok(registry)
}
