use littlefs2::consts;
use littlefs2::driver::Storage;
use littlefs2::fs::Filesystem;
use littlefs2::io::{Error as LfsError, Result as LfsResult};
use thiserror::Error;
use tracing::{debug, warn};

use crate::flash::{FlashAddressTranslator, FlashError, FlashGeometry};
use crate::flash::store::FlashStore;

pub mod ops;


pub const FS_GEOMETRY: FlashGeometry = FlashGeometry::PICO;

pub struct RegionStorage<'l>
{
	store: &'l mut FlashStore,
	translator: FlashAddressTranslator,
}

impl<'l> RegionStorage<'l>
{
	pub fn new(store: &'l mut FlashStore) -> Result<Self, FsError>
	{
		let geometry = store.geometry();
		if geometry != FS_GEOMETRY
		{
			return Err(FsError::Geometry{have: geometry, need: FS_GEOMETRY});
		}
		let translator = *store.translator();
		Ok(Self{store, translator})
	}

	pub fn erase_block(&mut self, block: u32) -> Result<(), FlashError>
	{
		self.store.erase(block)
	}

	pub fn read_block(&self, block: u32, offset: u32, dst: &mut [u8]) -> Result<(), FlashError>
	{
		let addr = self.translator.block_address(block, offset, dst.len())?;
		self.store.read_into(addr, dst)
	}

	/// Programs `data` page by page, `offset` must be page aligned.
	pub fn program_block(&mut self, block: u32, offset: u32, data: &[u8]) -> Result<(), FlashError>
	{
		// whole range is checked up front so a bad call programs nothing
		let addr = self.translator.block_address(block, offset, data.len())?;
		let page_size = self.translator.geometry().page_size() as usize;
		for (i, page) in data.chunks(page_size).enumerate()
		{
			// in bounds: the range lies inside one block of the region
			self.store.write(addr + (i * page_size) as u32, page)?;
		}
		Ok(())
	}

	fn split(off: usize) -> (u32, u32)
	{
		let size = FS_GEOMETRY.erase_block_size() as usize;
		(u32::try_from(off / size).unwrap_or(u32::MAX), (off % size) as u32)
	}
}

fn lfs_err(err: FlashError) -> LfsError
{
	warn!("flash access failed: {err}");
	LfsError::IO
}

impl<'l> Storage for RegionStorage<'l>
{
	const READ_SIZE: usize = 16;
	const WRITE_SIZE: usize = FS_GEOMETRY.page_size() as usize;
	const BLOCK_SIZE: usize = FS_GEOMETRY.erase_block_size() as usize;
	const BLOCK_COUNT: usize = FS_GEOMETRY.block_count() as usize;
	type CACHE_SIZE = consts::U256;
	type LOOKAHEAD_SIZE = consts::U16;

	fn read(&mut self, off: usize, buf: &mut [u8]) -> LfsResult<usize>
	{
		let (block, offset) = Self::split(off);
		self.read_block(block, offset, buf).map_err(lfs_err)?;
		Ok(buf.len())
	}

	fn write(&mut self, off: usize, data: &[u8]) -> LfsResult<usize>
	{
		let (block, offset) = Self::split(off);
		self.program_block(block, offset, data).map_err(lfs_err)?;
		Ok(data.len())
	}

	fn erase(&mut self, off: usize, len: usize) -> LfsResult<usize>
	{
		if off % Self::BLOCK_SIZE != 0 || len % Self::BLOCK_SIZE != 0
		{
			return Err(LfsError::INVALID);
		}
		let (first, _) = Self::split(off);
		let count = u32::try_from(len / Self::BLOCK_SIZE).unwrap_or(u32::MAX);
		for block in first..first.saturating_add(count)
		{
			self.erase_block(block).map_err(lfs_err)?;
		}
		Ok(len)
	}
}

pub fn format(store: &mut FlashStore) -> Result<(), FsError>
{
	let mut storage = RegionStorage::new(store)?;
	Filesystem::format(&mut storage).map_err(FsError::format)?;
	Filesystem::mount_and_then(&mut storage, |_| Ok(())).map_err(FsError::mount)?;
	debug!("formatted filesystem region");
	Ok(())
}

/// Formats first if the region holds no filesystem, a failed mount after that is not retried.
pub fn with_filesystem<'l, R, F>(store: &'l mut FlashStore, f: F) -> Result<R, FsError>
	where F: FnOnce(&Filesystem<'_, RegionStorage<'l>>) -> Result<R, FsError>
{
	let mut storage = RegionStorage::new(store)?;
	if !Filesystem::is_mountable(&mut storage)
	{
		warn!("no filesystem found in image, formatting");
		Filesystem::format(&mut storage).map_err(FsError::format)?;
	}
	run_mounted(&mut storage, f)
}

pub fn mount_existing<'l, R, F>(store: &'l mut FlashStore, f: F) -> Result<R, FsError>
	where F: FnOnce(&Filesystem<'_, RegionStorage<'l>>) -> Result<R, FsError>
{
	let mut storage = RegionStorage::new(store)?;
	if !Filesystem::is_mountable(&mut storage)
	{
		return Err(FsError::NotMountable);
	}
	run_mounted(&mut storage, f)
}

fn run_mounted<'l, R, F>(storage: &mut RegionStorage<'l>, f: F) -> Result<R, FsError>
	where F: FnOnce(&Filesystem<'_, RegionStorage<'l>>) -> Result<R, FsError>
{
	// errors from `f` are carried out of the LittleFS closure untouched
	let mut result = None;
	Filesystem::mount_and_then(storage, |fs|
	{
		result = Some(f(fs));
		Ok(())
	}).map_err(FsError::mount)?;
	result.unwrap_or(Err(FsError::NotMountable))
}

#[derive(Debug, Error)]
pub enum FsError
{
	#[error("filesystem needs geometry {need:?} (image has {have:?})")]
	Geometry{have: FlashGeometry, need: FlashGeometry},
	#[error("no mountable filesystem in region")]
	NotMountable,
	#[error("mount failed (littlefs error {0})")]
	Mount(i32),
	#[error("format failed (littlefs error {0})")]
	Format(i32),
	#[error("invalid filesystem path {0:?}")]
	Path(String),
	#[error("{op} {path:?} failed (littlefs error {code})")]
	Op{op: &'static str, path: String, code: i32},
	#[error("could not read host file {path:?}")]
	Host{path: String, #[source] err: std::io::Error},
}

impl FsError
{
	fn mount(err: LfsError) -> Self
	{
		Self::Mount(err.code())
	}

	fn format(err: LfsError) -> Self
	{
		Self::Format(err.code())
	}

	pub(crate) fn op<'a>(op: &'static str, path: &'a str) -> impl FnOnce(LfsError) -> Self + 'a
	{
		move |err| Self::Op{op, path: path.to_owned(), code: err.code()}
	}
}
