use std::io::{self, Read, Write};

use thiserror::Error;
use tracing::{debug, trace};

use crate::flash::FlashError;
use crate::flash::store::FlashStore;
use crate::uf2::{BLOCK_LEN, FLAG_FAMILY_ID, MAX_DATA_LEN, NewError, ReadError, Uf2Frame};

fn apply(store: &mut FlashStore, idx: u32, frame: &Uf2Frame) -> Result<(), DecodeError>
{
	let addr = frame.target_addr;
	// the first page of each block erases it, later pages only program
	if store.is_block_start(addr)
	{
		let block = store.block_index(addr).map_err(|err| DecodeError::Flash{idx, err})?;
		store.erase(block).map_err(|err| DecodeError::Flash{idx, err})?;
	}
	store.write(addr, frame.payload()).map_err(|err| DecodeError::Flash{idx, err})?;
	trace!("uf2 frame {idx}: {addr:08X}, {}", frame.payload_size);
	Ok(())
}

/// Any malformed frame aborts the whole decode, frames after it are never applied.
pub fn decode(src: &[u8], store: &mut FlashStore) -> Result<u32, DecodeError>
{
	if src.len() % BLOCK_LEN != 0
	{
		return Err(DecodeError::Truncated{have: src.len()});
	}
	let mut count = 0;
	for chunk in src.chunks_exact(BLOCK_LEN)
	{
		let frame = Uf2Frame::read(chunk).map_err(|err| DecodeError::Frame{idx: count, err})?;
		apply(store, count, &frame)?;
		count += 1;
	}
	debug!("decoded {count} uf2 frames");
	Ok(count)
}

pub fn decode_from<R: Read>(mut src: R, store: &mut FlashStore) -> Result<u32, DecodeError>
{
	let mut count = 0;
	let mut consumed = 0;
	let mut buff = [0u8; BLOCK_LEN];
	loop
	{
		let mut pos = 0;
		while pos < BLOCK_LEN
		{
			match src.read(&mut buff[pos..])
			{
				Ok(0) => break,
				Ok(n) => pos += n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
				Err(e) => return Err(DecodeError::Io(e)),
			}
		}
		consumed += pos;
		if pos == 0 {break;}
		if pos < BLOCK_LEN
		{
			return Err(DecodeError::Truncated{have: consumed});
		}
		let frame = Uf2Frame::read(&buff).map_err(|err| DecodeError::Frame{idx: count, err})?;
		apply(store, count, &frame)?;
		count += 1;
	}
	debug!("decoded {count} uf2 frames");
	Ok(count)
}

fn frames(store: &FlashStore, family_id: u32) -> Result<impl Iterator<Item = Result<Uf2Frame, EncodeError>> + '_, EncodeError>
{
	let geometry = store.geometry();
	let page_size = geometry.page_size() as usize;
	if page_size > MAX_DATA_LEN
	{
		return Err(EncodeError::PageSize(page_size));
	}
	// `num_blocks` has to be known before the first frame goes out
	let total = store.count_pages();
	let translator = *store.translator();
	Ok(store.present_pages().enumerate().map(move |(i, (block, page))|
	{
		let addr = translator.absolute_address(block, page * geometry.page_size());
		let data = store.read(addr, page_size)?;
		trace!("uf2 page: {addr:08X}, {page_size}");
		Ok(Uf2Frame::new(FLAG_FAMILY_ID, addr, i as u32, total, family_id, &data)?)
	}))
}

pub fn encode(store: &FlashStore, family_id: u32) -> Result<Vec<u8>, EncodeError>
{
	let mut dst = Vec::with_capacity(store.count_pages() as usize * BLOCK_LEN);
	for frame in frames(store, family_id)?
	{
		dst.extend_from_slice(&frame?.to_bytes());
	}
	debug!("encoded {} uf2 frames", dst.len() / BLOCK_LEN);
	Ok(dst)
}

pub fn encode_to<W: Write>(store: &FlashStore, family_id: u32, mut dst: W) -> Result<u32, EncodeError>
{
	let mut count = 0;
	for frame in frames(store, family_id)?
	{
		dst.write_all(&frame?.to_bytes())?;
		count += 1;
	}
	dst.flush()?;
	debug!("encoded {count} uf2 frames");
	Ok(count)
}

#[derive(Debug, Error)]
pub enum DecodeError
{
	#[error("truncated uf2 image ({have} bytes is not a whole number of blocks)")]
	Truncated{have: usize},
	#[error("malformed uf2 block (index {idx})")]
	Frame{idx: u32, #[source] err: ReadError},
	#[error("uf2 block {idx} does not fit the flash region")]
	Flash{idx: u32, #[source] err: FlashError},
	#[error("could not read uf2 image")]
	Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError
{
	#[error("page size {0} does not fit in a uf2 block")]
	PageSize(usize),
	#[error("could not read flash page")]
	Flash(#[from] FlashError),
	#[error("could not build uf2 block")]
	Frame(#[from] NewError),
	#[error("could not write uf2 image")]
	Io(#[from] io::Error),
}
