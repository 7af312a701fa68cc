//! Saving and loading model parameters.
//!
//! A model file is a bincode-encoded header (magic and format version)
//! followed by a [`SavedModel`]. Besides the parameters it records the
//! topology that produced them, and the topology's fingerprint, so loading
//! into a different network fails instead of silently producing garbage.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::info;
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Model;
use crate::topology::LayerSpec;
use crate::traits::{Layer, Loss};

const MAGIC: [u8; 8] = *b"CVCLASS\0";
const FORMAT_VERSION: u32 = 1;

/// Leads the file, so anything that isn't a model file is caught before the
/// body is decoded.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: [u8; 8],
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedModel {
    pub fingerprint: u64,
    pub topology: Vec<LayerSpec>,
    pub params: Vec<f32>,
}

impl SavedModel {
    pub fn read(path: &Path) -> Result<Self> {
        let encoding = |source| Error::Encoding {
            path: path.to_path_buf(),
            source,
        };
        let mut f = BufReader::new(File::open(path).map_err(|err| Error::io(path, err))?);
        let header: Header = bincode::deserialize_from(&mut f).map_err(encoding)?;
        if header.magic != MAGIC || header.version != FORMAT_VERSION {
            return Err(Error::BadMagic {
                path: path.to_path_buf(),
            });
        }
        bincode::deserialize_from(&mut f).map_err(encoding)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let encoding = |source| Error::Encoding {
            path: path.to_path_buf(),
            source,
        };
        let mut f = BufWriter::new(File::create(path).map_err(|err| Error::io(path, err))?);
        let header = Header {
            magic: MAGIC,
            version: FORMAT_VERSION,
        };
        bincode::serialize_into(&mut f, &header).map_err(encoding)?;
        bincode::serialize_into(&mut f, self).map_err(encoding)?;
        f.flush().map_err(|err| Error::io(path, err))
    }
}

impl<N, L> Model<N, L>
where
    N: Layer<Ix4, Output = Ix2>,
    L: Loss<Ix2>,
{
    /// Write the parameters to `path`, creating its directory if needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))?;
        }
        SavedModel {
            fingerprint: self.fingerprint(),
            topology: self.topology().to_vec(),
            params: self.params().to_vec(),
        }
        .write(path)?;
        info!("saved {} parameters to {path:?}", self.num_params());
        Ok(())
    }

    /// Replace this model's parameters with those saved in `path`.
    ///
    /// The file must have been saved from a network with the same topology.
    /// On error the model is unchanged.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let saved = SavedModel::read(path)?;
        if saved.fingerprint != self.fingerprint() {
            return Err(Error::TopologyMismatch {
                expected: self.fingerprint(),
                found: saved.fingerprint,
            });
        }
        self.set_params(Array1::from_vec(saved.params))?;
        info!("loaded {} parameters from {path:?}", self.num_params());
        Ok(())
    }
}
