use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::flash::{ConfigError, FlashConfig};
use crate::flash::store::FlashStore;
use crate::uf2::codec::{self, DecodeError, EncodeError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Presence
{
	/// A missing file yields an empty store.
	Optional,
	Required,
}

pub fn load(path: &Path, config: &FlashConfig, presence: Presence) -> Result<FlashStore, ImageError>
{
	let mut store = FlashStore::new(config.translator()?);
	match std::fs::read(path)
	{
		Ok(buff) =>
		{
			let frames = codec::decode(&buff, &mut store).map_err(|err| ImageError::Decode{path: path.to_path_buf(), err})?;
			debug!("loaded {frames} frames from {}", path.display());
		},
		Err(e) if e.kind() == io::ErrorKind::NotFound && presence == Presence::Optional =>
		{
			info!("{} does not exist, starting from an empty image", path.display());
		},
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ImageError::Missing(path.to_path_buf())),
		Err(err) => return Err(ImageError::Io{path: path.to_path_buf(), err}),
	}
	Ok(store)
}

pub fn save(path: &Path, config: &FlashConfig, store: &FlashStore) -> Result<(), ImageError>
{
	let buff = codec::encode(store, config.family_id)?;
	std::fs::write(path, &buff).map_err(|err| ImageError::Io{path: path.to_path_buf(), err})?;
	debug!("wrote {} bytes to {}", buff.len(), path.display());
	Ok(())
}

#[derive(Debug, Error)]
pub enum ImageError
{
	#[error("image {0:?} does not exist")]
	Missing(PathBuf),
	#[error("could not access image {path:?}")]
	Io{path: PathBuf, #[source] err: io::Error},
	#[error("could not decode image {path:?}")]
	Decode{path: PathBuf, #[source] err: DecodeError},
	#[error("could not encode image")]
	Encode(#[from] EncodeError),
	#[error("invalid flash configuration")]
	Config(#[from] ConfigError),
}
