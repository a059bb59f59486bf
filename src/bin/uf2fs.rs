use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use uf2fs::flash::{FlashConfig, PICO_FAMILY_ID, PICO_FLASH_BASE, PICO_FLASH_SIZE};
use uf2fs::fs::{self as flashfs, ops};
use uf2fs::fs::ops::EntryKind;
use uf2fs::image::{self, Presence};

#[derive(Parser)]
#[command(name = "uf2fs")]
#[command(about = "Edit the LittleFS region of a Pico UF2 flash image", long_about = None)]
struct Cli
{
	/// UF2 image holding the filesystem region
	#[arg(long, global = true, default_value = "test.uf2")]
	fs: PathBuf,

	#[command(flatten)]
	device: DeviceArgs,

	#[command(subcommand)]
	command: Command,
}

#[derive(Args)]
struct DeviceArgs
{
	/// Start address of the device flash
	#[arg(long, global = true, value_parser = parse_u32, default_value_t = PICO_FLASH_BASE)]
	flash_base: u32,

	/// Size of the device flash in bytes
	#[arg(long, global = true, value_parser = parse_u32, default_value_t = PICO_FLASH_SIZE)]
	flash_size: u32,

	/// UF2 family ID written into every block
	#[arg(long, global = true, value_parser = parse_u32, default_value_t = PICO_FAMILY_ID)]
	family_id: u32,
}

#[derive(Subcommand)]
enum Command
{
	/// Mount the filesystem and increment `boot_count`
	Bootcount,
	/// Format the filesystem region
	Format,
	/// Copy a host file into the filesystem
	Addfile
	{
		/// Host file to add
		#[arg(long)]
		add: PathBuf,

		/// Destination path inside the filesystem (defaults to the host file name)
		#[arg(long)]
		dest: Option<String>,
	},
	/// List a directory
	Ls
	{
		#[arg(long, default_value = "/")]
		dir: String,
	},
	/// Show where the region lives and how much of it the image programs
	Info,
}

fn parse_u32(arg: &str) -> Result<u32, String>
{
	let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X"))
	{
		Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
		None => arg.replace('_', "").parse(),
	};
	parsed.map_err(|e| format!("invalid number {arg:?}: {e}"))
}

fn run(cli: Cli) -> anyhow::Result<()>
{
	let config = FlashConfig
	{
		flash_base: cli.device.flash_base,
		flash_size: cli.device.flash_size,
		family_id: cli.device.family_id,
		..FlashConfig::default()
	};
	let path: &Path = &cli.fs;
	match cli.command
	{
		Command::Bootcount =>
		{
			let mut store = image::load(path, &config, Presence::Optional)?;
			let count = flashfs::with_filesystem(&mut store, |fs| ops::bump_boot_count(fs)).context("boot count update failed")?;
			image::save(path, &config, &store)?;
			println!("boot count: {count}");
		},
		Command::Format =>
		{
			let mut store = image::load(path, &config, Presence::Optional)?;
			flashfs::format(&mut store)?;
			image::save(path, &config, &store)?;
		},
		Command::Addfile{add, dest} =>
		{
			let mut store = image::load(path, &config, Presence::Optional)?;
			flashfs::with_filesystem(&mut store, |fs| ops::add_file(fs, &add, dest.as_deref()))
				.with_context(|| format!("could not add {}", add.display()))?;
			image::save(path, &config, &store)?;
		},
		Command::Ls{dir} =>
		{
			let mut store = image::load(path, &config, Presence::Required)?;
			let entries = flashfs::mount_existing(&mut store, |fs| ops::list_dir(fs, &dir))?;
			for entry in entries
			{
				match entry.kind
				{
					EntryKind::Dir => println!("'{}' (dir)", entry.name),
					EntryKind::File(size) => println!("'{}' ({size})", entry.name),
				}
			}
		},
		Command::Info =>
		{
			let store = image::load(path, &config, Presence::Required)?;
			let geometry = store.geometry();
			let base = store.translator().base_address();
			println!("region:  0x{base:08X} -> 0x{:08X}", base + (geometry.region_size() - 1));
			println!("blocks:  {} x {} bytes ({} byte pages)", geometry.block_count(), geometry.erase_block_size(), geometry.page_size());
			println!("pages:   {} programmed", store.count_pages());
		},
	}
	Ok(())
}

pub fn main() -> ExitCode
{
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	match run(Cli::parse())
	{
		Ok(()) => ExitCode::SUCCESS,
		Err(err) =>
		{
			eprintln!("Error: {err}");
			for src in err.chain().skip(1)
			{
				eprintln!("\tsource: {src}");
			}
			ExitCode::FAILURE
		},
	}
}
