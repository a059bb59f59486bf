use thiserror::Error;

pub mod store;


pub const PICO_FLASH_BASE: u32 = 0x10000000;
pub const PICO_FLASH_SIZE: u32 = 0x200000;
pub const PICO_FAMILY_ID: u32 = 0xE48BFF56;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlashGeometry
{
	erase_block_size: u32,
	page_size: u32,
	block_count: u32,
}

impl FlashGeometry
{
	/// 4K sectors, 256 byte pages, 128 blocks (512K at the end of a 2M Pico flash).
	pub const PICO: Self = FlashGeometry{erase_block_size: 4096, page_size: 256, block_count: 128};

	pub fn new(erase_block_size: u32, page_size: u32, block_count: u32) -> Result<Self, ConfigError>
	{
		if page_size == 0 || erase_block_size == 0 || erase_block_size % page_size != 0
		{
			return Err(ConfigError::PageSize{page_size, erase_block_size});
		}
		if block_count == 0
		{
			return Err(ConfigError::BlockCount);
		}
		if erase_block_size.checked_mul(block_count).is_none()
		{
			return Err(ConfigError::RegionOverflow{erase_block_size, block_count});
		}
		Ok(Self{erase_block_size, page_size, block_count})
	}

	pub const fn erase_block_size(&self) -> u32
	{
		self.erase_block_size
	}

	pub const fn page_size(&self) -> u32
	{
		self.page_size
	}

	pub const fn block_count(&self) -> u32
	{
		self.block_count
	}

	pub const fn pages_per_block(&self) -> u32
	{
		self.erase_block_size / self.page_size
	}

	pub const fn region_size(&self) -> u32
	{
		// checked in `new`
		self.erase_block_size * self.block_count
	}
}

impl Default for FlashGeometry
{
	fn default() -> Self
	{
		Self::PICO
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlashConfig
{
	pub flash_base: u32,
	pub flash_size: u32,
	pub family_id: u32,
	pub geometry: FlashGeometry,
}

impl FlashConfig
{
	pub fn translator(&self) -> Result<FlashAddressTranslator, ConfigError>
	{
		FlashAddressTranslator::new(self.flash_base, self.flash_size, self.geometry)
	}
}

impl Default for FlashConfig
{
	fn default() -> Self
	{
		Self{flash_base: PICO_FLASH_BASE, flash_size: PICO_FLASH_SIZE, family_id: PICO_FAMILY_ID, geometry: FlashGeometry::PICO}
	}
}

// region sits at the end of flash, firmware lives at the start
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlashAddressTranslator
{
	base_address: u32,
	geometry: FlashGeometry,
}

impl FlashAddressTranslator
{
	pub fn new(flash_base: u32, flash_size: u32, geometry: FlashGeometry) -> Result<Self, ConfigError>
	{
		let region = geometry.region_size();
		if region > flash_size
		{
			return Err(ConfigError::RegionTooLarge{need: region, have: flash_size});
		}
		let Some(flash_end) = flash_base.checked_add(flash_size - 1)
		else
		{
			return Err(ConfigError::FlashOverflow{flash_base, flash_size});
		};
		Ok(Self{base_address: flash_end - (region - 1), geometry})
	}

	pub fn base_address(&self) -> u32
	{
		self.base_address
	}

	pub fn geometry(&self) -> FlashGeometry
	{
		self.geometry
	}

	pub fn absolute_address(&self, block: u32, offset: u32) -> u32
	{
		self.base_address.wrapping_add(block.wrapping_mul(self.geometry.erase_block_size)).wrapping_add(offset)
	}

	/// Checked form of `absolute_address` for `len` bytes that must stay inside one block.
	pub fn block_address(&self, block: u32, offset: u32, len: usize) -> Result<u32, FlashError>
	{
		let count = self.geometry.block_count;
		if block >= count
		{
			return Err(FlashError::BlockIndex{block, count});
		}
		let block_size = self.geometry.erase_block_size;
		let fits = (offset as usize).checked_add(len).is_some_and(|end| end <= block_size as usize);
		if offset >= block_size || !fits
		{
			return Err(FlashError::BlockOffset{block, offset, len, block_size});
		}
		Ok(self.absolute_address(block, offset))
	}

	pub fn region_offset(&self, addr: u32) -> Option<u32>
	{
		let off = addr.checked_sub(self.base_address)?;
		if off < self.geometry.region_size() {Some(off)} else {None}
	}
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ConfigError
{
	#[error("invalid page size ({page_size} for erase block size {erase_block_size})")]
	PageSize{page_size: u32, erase_block_size: u32},
	#[error("block count must not be zero")]
	BlockCount,
	#[error("region size overflow ({block_count} blocks of {erase_block_size})")]
	RegionOverflow{erase_block_size: u32, block_count: u32},
	#[error("filesystem region does not fit in flash (need {need}, have {have})")]
	RegionTooLarge{need: u32, have: u32},
	#[error("flash range overflows the address space ({flash_size} bytes at {flash_base:#010X})")]
	FlashOverflow{flash_base: u32, flash_size: u32},
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FlashError
{
	#[error("address range out of bounds ({len} bytes at {addr:#010X})")]
	OutOfRange{addr: u32, len: usize},
	#[error("block index out of bounds ({block}, have {count})")]
	BlockIndex{block: u32, count: u32},
	#[error("range outside block {block} ({len} bytes at offset {offset}, block size {block_size})")]
	BlockOffset{block: u32, offset: u32, len: usize, block_size: u32},
	#[error("misaligned write at {addr:#010X} (page size {page_size})")]
	Misaligned{addr: u32, page_size: u32},
	#[error("write exceeds page (length {len}, page size {page_size})")]
	PageOverflow{len: usize, page_size: u32},
}
