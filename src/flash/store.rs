use tracing::trace;

use crate::flash::{FlashAddressTranslator, FlashError, FlashGeometry};

#[derive(Clone, Debug)]
pub struct FlashStore
{
	translator: FlashAddressTranslator,
	data: Vec<u8>,
	present: Vec<bool>,
}

impl FlashStore
{
	pub fn new(translator: FlashAddressTranslator) -> Self
	{
		let geometry = translator.geometry();
		let pages = (geometry.block_count() * geometry.pages_per_block()) as usize;
		Self{translator, data: vec![0u8; geometry.region_size() as usize], present: vec![false; pages]}
	}

	pub fn translator(&self) -> &FlashAddressTranslator
	{
		&self.translator
	}

	pub fn geometry(&self) -> FlashGeometry
	{
		self.translator.geometry()
	}

	fn range(&self, addr: u32, len: usize) -> Result<usize, FlashError>
	{
		let Some(off) = self.translator.region_offset(addr)
		else
		{
			return Err(FlashError::OutOfRange{addr, len});
		};
		let off = off as usize;
		if self.data.len() - off < len
		{
			return Err(FlashError::OutOfRange{addr, len});
		}
		Ok(off)
	}

	fn check_block(&self, block: u32) -> Result<(), FlashError>
	{
		let count = self.geometry().block_count();
		if block >= count {Err(FlashError::BlockIndex{block, count})} else {Ok(())}
	}

	pub fn block_index(&self, addr: u32) -> Result<u32, FlashError>
	{
		let off = self.range(addr, 1)?;
		Ok(off as u32 / self.geometry().erase_block_size())
	}

	pub fn erase(&mut self, block: u32) -> Result<(), FlashError>
	{
		self.check_block(block)?;
		let geometry = self.geometry();
		let size = geometry.erase_block_size() as usize;
		let start = block as usize * size;
		self.data[start..start + size].fill(0);
		let pages = geometry.pages_per_block() as usize;
		self.present[block as usize * pages..(block as usize + 1) * pages].fill(false);
		trace!(block, "erase");
		Ok(())
	}

	/// Programs at most one page starting on a page boundary.
	pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>
	{
		let page_size = self.geometry().page_size();
		if data.len() > page_size as usize
		{
			return Err(FlashError::PageOverflow{len: data.len(), page_size});
		}
		let off = self.range(addr, data.len())?;
		if off % page_size as usize != 0
		{
			return Err(FlashError::Misaligned{addr, page_size});
		}
		if !data.is_empty()
		{
			let page = off / page_size as usize;
			if self.present[page]
			{
				trace!(addr, "overwriting programmed page without erase");
			}
			self.data[off..off + data.len()].copy_from_slice(data);
			self.present[page] = true;
		}
		Ok(())
	}

	pub fn read_into(&self, addr: u32, dst: &mut [u8]) -> Result<(), FlashError>
	{
		let off = self.range(addr, dst.len())?;
		dst.copy_from_slice(&self.data[off..off + dst.len()]);
		Ok(())
	}

	pub fn read(&self, addr: u32, len: usize) -> Result<Vec<u8>, FlashError>
	{
		let off = self.range(addr, len)?;
		Ok(self.data[off..off + len].to_vec())
	}

	/// Pure query: coordinates outside the region are simply not present.
	pub fn page_present(&self, block: u32, page: u32) -> bool
	{
		let geometry = self.geometry();
		if block >= geometry.block_count() || page >= geometry.pages_per_block() {return false;}
		self.present[(block * geometry.pages_per_block() + page) as usize]
	}

	pub fn is_block_start(&self, addr: u32) -> bool
	{
		match self.translator.region_offset(addr)
		{
			None => false,
			Some(off) => off % self.geometry().erase_block_size() == 0,
		}
	}

	pub fn count_pages(&self) -> u32
	{
		self.present.iter().filter(|&&p| p).count() as u32
	}

	pub fn present_pages(&self) -> impl Iterator<Item = (u32, u32)> + '_
	{
		let pages = self.geometry().pages_per_block();
		self.present.iter().enumerate().filter(|&(_, &p)| p).map(move |(i, _)| (i as u32 / pages, i as u32 % pages))
	}
}
