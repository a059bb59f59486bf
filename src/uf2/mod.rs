use thiserror::Error;

pub mod codec;

#[cfg(test)]
mod test;

pub const BLOCK_LEN: usize = 512;
pub const MAGIC_START0: u32 = 0x0A324655;
pub const MAGIC_START1: u32 = 0x9E5D5157;
pub const MAGIC_END: u32 = 0x0AB16F30;
pub const FLAG_NOT_MAIN_FLASH: u32 = 0x00000001;
pub const FLAG_FILE_CONTAINER: u32 = 0x00001000;
pub const FLAG_FAMILY_ID: u32 = 0x00002000;
pub const FLAG_MD5_CHECKSUM: u32 = 0x00004000;
pub const FLAG_EXTENSION_TAGS: u32 = 0x00008000;
pub const DATA_START: usize = 0x20;
pub const PADDING_END: usize = BLOCK_LEN - 4;
pub const MAX_DATA_LEN: usize = PADDING_END - DATA_START;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Uf2Frame
{
	pub flags: u32,
	pub target_addr: u32,
	pub payload_size: u32,
	pub block_no: u32,
	pub num_blocks: u32,
	/// Family ID, file size or zero depending on `flags`.
	pub reserved: u32,
	pub data: [u8; MAX_DATA_LEN],
}

fn get_u32(src: &[u8], pos: usize) -> u32
{
	let mut word = [0u8; 4];
	word.copy_from_slice(&src[pos..pos + 4]);
	u32::from_le_bytes(word)
}

fn check_magic(src: &[u8], pos: usize, expect: u32, field: MagicField) -> Result<(), ReadError>
{
	let have = get_u32(src, pos);
	if have != expect {Err(ReadError::Magic{field, expect, have})} else {Ok(())}
}

impl Uf2Frame
{
	pub fn new(flags: u32, target_addr: u32, block_no: u32, num_blocks: u32, reserved: u32, payload: &[u8]) -> Result<Self, NewError>
	{
		if payload.len() > MAX_DATA_LEN
		{
			return Err(NewError::Overflow{need: payload.len(), have: MAX_DATA_LEN});
		}
		let mut data = [0u8; MAX_DATA_LEN];
		data[..payload.len()].copy_from_slice(payload);
		Ok(Self{flags, target_addr, payload_size: payload.len() as u32, block_no, num_blocks, reserved, data})
	}

	pub fn payload(&self) -> &[u8]
	{
		&self.data[..self.payload_size as usize]
	}

	pub fn read(src: &[u8]) -> Result<Self, ReadError>
	{
		if src.len() < BLOCK_LEN
		{
			return Err(ReadError::Underflow{need: BLOCK_LEN, have: src.len()});
		}
		check_magic(src, 0x000, MAGIC_START0, MagicField::Start0)?;
		check_magic(src, 0x004, MAGIC_START1, MagicField::Start1)?;
		check_magic(src, PADDING_END, MAGIC_END, MagicField::End)?;
		let payload_size = get_u32(src, 0x010);
		if payload_size as usize > MAX_DATA_LEN
		{
			return Err(ReadError::PayloadSize(payload_size));
		}
		let mut data = [0u8; MAX_DATA_LEN];
		data.copy_from_slice(&src[DATA_START..PADDING_END]);
		Ok(Self
		{
			flags: get_u32(src, 0x008),
			target_addr: get_u32(src, 0x00C),
			payload_size,
			block_no: get_u32(src, 0x014),
			num_blocks: get_u32(src, 0x018),
			reserved: get_u32(src, 0x01C),
			data,
		})
	}

	pub fn write(&self, dst: &mut [u8; BLOCK_LEN])
	{
		dst[0x000..0x004].copy_from_slice(&u32::to_le_bytes(MAGIC_START0));
		dst[0x004..0x008].copy_from_slice(&u32::to_le_bytes(MAGIC_START1));
		dst[0x008..0x00C].copy_from_slice(&u32::to_le_bytes(self.flags));
		dst[0x00C..0x010].copy_from_slice(&u32::to_le_bytes(self.target_addr));
		dst[0x010..0x014].copy_from_slice(&u32::to_le_bytes(self.payload_size));
		dst[0x014..0x018].copy_from_slice(&u32::to_le_bytes(self.block_no));
		dst[0x018..0x01C].copy_from_slice(&u32::to_le_bytes(self.num_blocks));
		dst[0x01C..DATA_START].copy_from_slice(&u32::to_le_bytes(self.reserved));
		dst[DATA_START..PADDING_END].copy_from_slice(&self.data);
		dst[PADDING_END..BLOCK_LEN].copy_from_slice(&u32::to_le_bytes(MAGIC_END));
	}

	pub fn to_bytes(&self) -> [u8; BLOCK_LEN]
	{
		let mut dst = [0u8; BLOCK_LEN];
		self.write(&mut dst);
		dst
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MagicField
{
	Start0, Start1, End,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ReadError
{
	#[error("input buffer underflow (need {need}, got {have})")]
	Underflow{need: usize, have: usize},
	#[error("bad {field:?} magic (expected {expect:#010X}, got {have:#010X})")]
	Magic{field: MagicField, expect: u32, have: u32},
	#[error("payload size {0} exceeds 476 bytes")]
	PayloadSize(u32),
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum NewError
{
	#[error("payload overflow (need {need}, have {have})")]
	Overflow{need: usize, have: usize},
}
