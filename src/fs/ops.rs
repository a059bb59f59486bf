use std::path::Path as HostPath;

use littlefs2::driver::Storage;
use littlefs2::fs::Filesystem;
use littlefs2::path::PathBuf;
use tracing::debug;

use crate::fs::FsError;

pub const BOOT_COUNT_FILE: &str = "boot_count";

fn fs_path(path: &str) -> Result<PathBuf, FsError>
{
	PathBuf::try_from(path).map_err(|_| FsError::Path(path.to_owned()))
}

/// Increments the little-endian counter in `boot_count`, a missing or short file counts as zero.
pub fn bump_boot_count<S: Storage>(fs: &Filesystem<'_, S>) -> Result<u32, FsError>
{
	let path = fs_path(BOOT_COUNT_FILE)?;
	let mut word = [0u8; 4];
	if fs.exists(&path)
	{
		let len = fs.open_file_and_then(&path, |file| file.read(&mut word)).map_err(FsError::op("read", BOOT_COUNT_FILE))?;
		if len < word.len() {word = [0u8; 4];}
	}
	let count = u32::from_le_bytes(word).wrapping_add(1);
	fs.write(&path, &count.to_le_bytes()).map_err(FsError::op("write", BOOT_COUNT_FILE))?;
	debug!("boot count now {count}");
	Ok(count)
}

pub fn add_file<S: Storage>(fs: &Filesystem<'_, S>, host: &HostPath, dest: Option<&str>) -> Result<String, FsError>
{
	let host_name = host.to_string_lossy().into_owned();
	let data = std::fs::read(host).map_err(|err| FsError::Host{path: host_name.clone(), err})?;
	let dest = match dest
	{
		Some(dest) => dest.to_owned(),
		None => match host.file_name()
		{
			Some(name) => name.to_string_lossy().into_owned(),
			None => return Err(FsError::Path(host_name)),
		},
	};
	let trimmed = dest.trim_start_matches('/');
	if trimmed.is_empty()
	{
		return Err(FsError::Path(dest));
	}
	if let Some((parent, _)) = trimmed.rsplit_once('/')
	{
		if !parent.is_empty()
		{
			fs.create_dir_all(&fs_path(parent)?).map_err(FsError::op("mkdir", parent))?;
		}
	}
	fs.write(&fs_path(trimmed)?, &data).map_err(FsError::op("write", trimmed))?;
	debug!("added {} bytes from {host_name:?} as {trimmed:?}", data.len());
	Ok(trimmed.to_owned())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntryKind
{
	Dir,
	File(usize),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirListing
{
	pub name: String,
	pub kind: EntryKind,
}

pub fn list_dir<S: Storage>(fs: &Filesystem<'_, S>, dir: &str) -> Result<Vec<DirListing>, FsError>
{
	let path = fs_path(dir)?;
	fs.read_dir_and_then(&path, |entries|
	{
		let mut found = Vec::new();
		for entry in entries
		{
			let entry = entry?;
			let name = format!("{}", entry.file_name());
			if name == "." || name == ".." {continue;}
			let metadata = entry.metadata();
			let kind = if metadata.is_dir() {EntryKind::Dir} else {EntryKind::File(metadata.len())};
			found.push(DirListing{name, kind});
		}
		Ok(found)
	}).map_err(FsError::op("list", dir))
}
