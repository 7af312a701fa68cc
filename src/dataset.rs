//! Labeled image datasets, loaded from a folder per class.
//!
//! ```text
//! root/
//!     cat/
//!         001.jpg
//!         002.png
//!     dog/
//!         001.jpg
//! ```
//!
//! Classes are numbered in order of their directory names; images within a
//! class are taken in order of their file names.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::GenericImageView;
use log::{debug, info};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::metrics::argmax_rows;

const SUPPORTED_FILES: [&str; 4] = ["bmp", "jpg", "jpeg", "png"];

/// In-memory set of `(image, one-hot label)` pairs.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Shape `(n, height, width, 3)`, values in `[0, 1]`.
    images: Array4<f32>,
    /// Shape `(n, num_classes)`, one 1.0 per row.
    labels: Array2<f32>,
    class_names: Vec<String>,
    /// Source file of each example. Empty for datasets built from arrays.
    paths: Vec<PathBuf>,
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            SUPPORTED_FILES.contains(&ext.to_ascii_lowercase().as_str())
        })
}

/// Sorted entries of `dir` that satisfy `keep`.
fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut entries = vec![];
    for entry in fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
        let path = entry.map_err(|err| Error::io(dir, err))?.path();
        if keep(&path) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Decode an image, convert it to RGB, resize it to exactly
/// `width × height`, and scale the pixels to `[0, 1]`.
pub fn load_image(path: &Path, height: usize, width: usize) -> Result<Array3<f32>> {
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let img = if img.height() as usize == height && img.width() as usize == width {
        img
    } else {
        img.resize_exact(width as u32, height as u32, FilterType::Lanczos3)
    };
    let rgb = img.to_rgb8().into_raw();
    let pixels = Array3::from_shape_vec((height, width, 3), rgb)
        .expect("an RGB image has three bytes per pixel");
    Ok(pixels.mapv(|v| f32::from(v) / 255.0))
}

impl Dataset {
    /// Load every image under `root`, resized to `height × width`.
    ///
    /// There must be exactly `num_classes` class subdirectories, each with at
    /// least one image. Files that aren't bmp, jpeg or png are ignored.
    pub fn load(root: impl AsRef<Path>, height: usize, width: usize, num_classes: usize) -> Result<Self> {
        let root = root.as_ref();
        let class_dirs = sorted_entries(root, Path::is_dir)?;
        if class_dirs.is_empty() {
            return Err(Error::NoClasses {
                root: root.to_path_buf(),
            });
        }
        if class_dirs.len() != num_classes {
            return Err(Error::ClassCount {
                root: root.to_path_buf(),
                expected: num_classes,
                found: class_dirs.len(),
            });
        }

        let mut class_names = vec![];
        let mut items: Vec<(PathBuf, usize)> = vec![];
        for (class, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let files = sorted_entries(dir, |p| p.is_file() && is_image(p))?;
            if files.is_empty() {
                return Err(Error::EmptyClass {
                    root: root.to_path_buf(),
                    class: name,
                });
            }
            debug!("class {class} {name:?}: {} images", files.len());
            items.extend(files.into_iter().map(|path| (path, class)));
            class_names.push(name);
        }

        let decoded = items
            .par_iter()
            .map(|(path, _)| load_image(path, height, width))
            .collect::<Result<Vec<Array3<f32>>>>()?;

        let n = items.len();
        let mut images = Array4::zeros((n, height, width, 3));
        for (mut dst, src) in images.outer_iter_mut().zip(&decoded) {
            dst.assign(src);
        }
        let mut labels = Array2::zeros((n, num_classes));
        for (mut row, (_, class)) in labels.outer_iter_mut().zip(&items) {
            row[*class] = 1.0;
        }

        info!(
            "loaded {n} images in {} classes {class_names:?} from {root:?}",
            class_names.len()
        );
        Ok(Dataset {
            images,
            labels,
            class_names,
            paths: items.into_iter().map(|(path, _)| path).collect(),
        })
    }

    /// Build a dataset from arrays already in memory.
    ///
    /// `labels` must have one row per image and one column per class name.
    pub fn from_arrays(images: Array4<f32>, labels: Array2<f32>, class_names: Vec<String>) -> Result<Self> {
        if labels.nrows() != images.len_of(Axis(0)) || labels.ncols() != class_names.len() {
            return Err(Error::ShapeMismatch {
                what: "labels",
                got: labels.shape().to_vec(),
                expected: vec![images.len_of(Axis(0)), class_names.len()],
            });
        }
        Ok(Dataset {
            images,
            labels,
            class_names,
            paths: vec![],
        })
    }

    pub fn len(&self) -> usize {
        self.images.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    pub fn images(&self) -> ArrayView4<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> ArrayView2<'_, f32> {
        self.labels.view()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Class index of each example: the position of the 1 in its label.
    pub fn class_indices(&self) -> Array1<usize> {
        argmax_rows(self.labels.view())
    }

    /// Example `i` as `(image, one-hot label)`.
    pub fn get(&self, i: usize) -> (ArrayView3<'_, f32>, ArrayView1<'_, f32>) {
        (
            self.images.index_axis(Axis(0), i),
            self.labels.index_axis(Axis(0), i),
        )
    }
}
