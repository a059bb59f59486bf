use super::*;
use super::codec::{DecodeError, decode, decode_from, encode, encode_to};
use crate::flash::{FlashConfig, FlashError, PICO_FAMILY_ID};
use crate::flash::store::FlashStore;

fn pico_store() -> FlashStore
{
	FlashStore::new(FlashConfig::default().translator().unwrap())
}

fn page_addr(store: &FlashStore, block: u32, page: u32) -> u32
{
	store.translator().absolute_address(block, page * store.geometry().page_size())
}

#[test]
fn frame_layout()
{
	let frame = Uf2Frame::new(FLAG_FAMILY_ID, 0x10180100, 3, 9, PICO_FAMILY_ID, &[0x5A; 256]).unwrap();
	let raw = frame.to_bytes();
	assert_eq!(&raw[0x000..0x004], &[0x55, 0x46, 0x32, 0x0A]);
	assert_eq!(&raw[0x004..0x008], &[0x57, 0x51, 0x5D, 0x9E]);
	assert_eq!(&raw[0x008..0x00C], &[0x00, 0x20, 0x00, 0x00]);
	assert_eq!(&raw[0x00C..0x010], &[0x00, 0x01, 0x18, 0x10]);
	assert_eq!(&raw[0x010..0x014], &[0x00, 0x01, 0x00, 0x00]);
	assert_eq!(&raw[0x014..0x018], &[3, 0, 0, 0]);
	assert_eq!(&raw[0x018..0x01C], &[9, 0, 0, 0]);
	assert_eq!(&raw[0x01C..0x020], &[0x56, 0xFF, 0x8B, 0xE4]);
	assert!(raw[0x020..0x120].iter().all(|&b| b == 0x5A));
	assert!(raw[0x120..0x1FC].iter().all(|&b| b == 0));
	assert_eq!(&raw[0x1FC..0x200], &[0x30, 0x6F, 0xB1, 0x0A]);
	assert_eq!(Uf2Frame::read(&raw), Ok(frame));
}

#[test]
fn frame_errors()
{
	let raw = Uf2Frame::new(0, 0x10180000, 0, 1, 0, b"abc").unwrap().to_bytes();
	assert_eq!(Uf2Frame::read(&raw[..511]), Err(ReadError::Underflow{need: 512, have: 511}));
	let mut bad = raw;
	bad[0] ^= 1;
	assert_eq!(Uf2Frame::read(&bad), Err(ReadError::Magic{field: MagicField::Start0, expect: MAGIC_START0, have: MAGIC_START0 ^ 1}));
	let mut bad = raw;
	bad[7] = 0;
	assert!(matches!(Uf2Frame::read(&bad), Err(ReadError::Magic{field: MagicField::Start1, ..})));
	let mut bad = raw;
	bad[511] = 0;
	assert!(matches!(Uf2Frame::read(&bad), Err(ReadError::Magic{field: MagicField::End, ..})));
	let mut bad = raw;
	bad[0x010..0x014].copy_from_slice(&477u32.to_le_bytes());
	assert_eq!(Uf2Frame::read(&bad), Err(ReadError::PayloadSize(477)));
	assert_eq!(Uf2Frame::new(0, 0, 0, 1, 0, &[0u8; 477]), Err(NewError::Overflow{need: 477, have: 476}));
	assert_eq!(Uf2Frame::new(0, 0, 0, 1, 0, &[0u8; 476]).map(|f| f.payload_size), Ok(476));
}

#[test]
fn sparse_encode()
{
	let mut store = pico_store();
	let second = page_addr(&store, 3, 5);
	let first = page_addr(&store, 0, 2);
	// written out of order, emitted by address
	store.write(second, &[2u8; 256]).unwrap();
	store.write(first, &[1u8; 256]).unwrap();
	let out = encode(&store, PICO_FAMILY_ID).unwrap();
	assert_eq!(out.len(), 2 * BLOCK_LEN);
	let a = Uf2Frame::read(&out[..BLOCK_LEN]).unwrap();
	let b = Uf2Frame::read(&out[BLOCK_LEN..]).unwrap();
	assert_eq!((a.block_no, a.num_blocks, a.target_addr), (0, 2, first));
	assert_eq!((b.block_no, b.num_blocks, b.target_addr), (1, 2, second));
	for frame in [&a, &b]
	{
		assert_eq!(frame.flags, FLAG_FAMILY_ID);
		assert_eq!(frame.reserved, PICO_FAMILY_ID);
		assert_eq!(frame.payload_size, 256);
	}
	assert!(a.payload().iter().all(|&v| v == 1));
	assert!(b.payload().iter().all(|&v| v == 2));
}

#[test]
fn encode_empty()
{
	assert!(encode(&pico_store(), PICO_FAMILY_ID).unwrap().is_empty());
}

#[test]
fn round_trip()
{
	let mut store = pico_store();
	let pages = [(0, 0), (0, 15), (1, 3), (7, 0), (64, 8), (127, 15)];
	for (i, &(block, page)) in pages.iter().enumerate()
	{
		let data: Vec<u8> = (0..256).map(|v| (v as u8).wrapping_mul(i as u8 + 3)).collect();
		let addr = page_addr(&store, block, page);
		store.write(addr, &data).unwrap();
	}
	let mut out = Vec::new();
	assert_eq!(encode_to(&store, PICO_FAMILY_ID, &mut out).unwrap(), pages.len() as u32);
	assert_eq!(out, encode(&store, PICO_FAMILY_ID).unwrap());

	let mut copy = pico_store();
	assert_eq!(decode(&out, &mut copy).unwrap(), pages.len() as u32);
	assert_eq!(copy.present_pages().collect::<Vec<_>>(), pages.to_vec());
	for &(block, page) in &pages
	{
		let addr = page_addr(&store, block, page);
		assert_eq!(copy.read(addr, 256).unwrap(), store.read(addr, 256).unwrap());
	}
}

#[test]
fn erase_before_write()
{
	let mut store = pico_store();
	let block = page_addr(&store, 7, 0);
	// stale content that decoding the block start must wipe
	for page in 0..16
	{
		store.write(block + page * 256, &[0xEE; 256]).unwrap();
	}
	let frame = Uf2Frame::new(FLAG_FAMILY_ID, block, 0, 1, PICO_FAMILY_ID, &[0x11; 100]).unwrap();
	decode(&frame.to_bytes(), &mut store).unwrap();
	let contents = store.read(block, 4096).unwrap();
	assert!(contents[..100].iter().all(|&v| v == 0x11));
	assert!(contents[100..].iter().all(|&v| v == 0));
	assert_eq!(store.count_pages(), 1);
	assert!(store.page_present(7, 0));
}

#[test]
fn later_pages_keep_block()
{
	let mut store = pico_store();
	let block = page_addr(&store, 2, 0);
	let mut image = Vec::new();
	image.extend_from_slice(&Uf2Frame::new(0, block, 0, 2, 0, &[0x11; 256]).unwrap().to_bytes());
	image.extend_from_slice(&Uf2Frame::new(0, block + 256, 1, 2, 0, &[0x22; 256]).unwrap().to_bytes());
	decode(&image, &mut store).unwrap();
	assert!(store.read(block, 256).unwrap().iter().all(|&v| v == 0x11));
	assert!(store.read(block + 256, 256).unwrap().iter().all(|&v| v == 0x22));
	assert_eq!(store.count_pages(), 2);
}

#[test]
fn bad_magic_aborts()
{
	let mut store = pico_store();
	let first = page_addr(&store, 0, 0);
	let second = page_addr(&store, 1, 0);
	let third = page_addr(&store, 2, 0);
	let mut image = Vec::new();
	image.extend_from_slice(&Uf2Frame::new(0, first, 0, 3, 0, &[1; 256]).unwrap().to_bytes());
	let mut broken = Uf2Frame::new(0, second, 1, 3, 0, &[2; 256]).unwrap().to_bytes();
	broken[PADDING_END] ^= 0xFF;
	image.extend_from_slice(&broken);
	image.extend_from_slice(&Uf2Frame::new(0, third, 2, 3, 0, &[3; 256]).unwrap().to_bytes());
	match decode(&image, &mut store)
	{
		Err(DecodeError::Frame{idx: 1, err: ReadError::Magic{field: MagicField::End, ..}}) => (),
		other => panic!("unexpected decode result {other:?}"),
	}
	assert!(store.page_present(0, 0));
	assert!(!store.page_present(1, 0));
	assert!(!store.page_present(2, 0));
	assert_eq!(store.read(second, 256).unwrap(), vec![0u8; 256]);
	assert_eq!(store.read(third, 256).unwrap(), vec![0u8; 256]);
}

#[test]
fn truncated()
{
	let mut store = pico_store();
	let addr = page_addr(&store, 0, 0);
	let mut image = Uf2Frame::new(0, addr, 0, 1, 0, &[9; 256]).unwrap().to_bytes().to_vec();
	image.extend_from_slice(&[0u8; 100]);
	assert!(matches!(decode(&image, &mut store), Err(DecodeError::Truncated{have: 612})));
	// nothing is applied when the length is already wrong
	assert_eq!(store.count_pages(), 0);
	match decode_from(image.as_slice(), &mut store)
	{
		Err(DecodeError::Truncated{have: 612}) => (),
		other => panic!("unexpected decode result {other:?}"),
	}
	assert!(store.page_present(0, 0));
}

#[test]
fn decode_stream()
{
	let mut store = pico_store();
	let addr = page_addr(&store, 5, 1);
	store.write(addr, &[0x42; 256]).unwrap();
	let image = encode(&store, PICO_FAMILY_ID).unwrap();
	let mut copy = pico_store();
	assert_eq!(decode_from(image.as_slice(), &mut copy).unwrap(), 1);
	assert_eq!(copy.read(addr, 256).unwrap(), vec![0x42; 256]);
	assert_eq!(decode_from(std::io::empty(), &mut copy).unwrap(), 0);
}

#[test]
fn outside_region()
{
	let mut store = pico_store();
	let base = store.translator().base_address();
	let image = Uf2Frame::new(0, base - 256, 0, 1, 0, &[1; 256]).unwrap().to_bytes();
	assert!(matches!(decode(&image, &mut store), Err(DecodeError::Flash{idx: 0, err: FlashError::OutOfRange{..}})));
	let image = Uf2Frame::new(0, base + 16, 0, 1, 0, &[1; 16]).unwrap().to_bytes();
	assert!(matches!(decode(&image, &mut store), Err(DecodeError::Flash{idx: 0, err: FlashError::Misaligned{..}})));
}

#[test]
fn end_to_end()
{
	let mut store = pico_store();
	let addr = page_addr(&store, 0, 0);
	store.write(addr, &[0xAB; 256]).unwrap();
	let image = encode(&store, 0xE48BFF56).unwrap();
	assert_eq!(Uf2Frame::read(&image).unwrap().reserved, 0xE48BFF56);
	let mut copy = pico_store();
	decode(&image, &mut copy).unwrap();
	let block = copy.read(addr, 4096).unwrap();
	assert!(block[..256].iter().all(|&v| v == 0xAB));
	assert!(block[256..].iter().all(|&v| v == 0));
	let rest = copy.read(addr + 4096, 0x80000 - 4096).unwrap();
	assert!(rest.iter().all(|&v| v == 0));
}
