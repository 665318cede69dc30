use anyhow::{Context, Result, bail};
use mbtiles_merge::pipeline::{self, ShardConfig};
use std::path::PathBuf;
use std::process::ExitCode;

const OUTPUT_PATH: &str = "merged.mbtiles";

fn main() -> ExitCode {
	env_logger::Builder::from_default_env().format_timestamp(None).init();

	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			eprintln!("error: {err:#}");
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<()> {
	let inputs: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
	if inputs.is_empty() {
		bail!("usage: mbtiles-merge file1 file2 ...");
	}

	let config = ShardConfig {
		shards: env_u32("SHARDS", 1)?,
		shard: env_u32("SHARD", 0)?,
	}
	.validate()?;

	pipeline::run(&inputs, std::path::Path::new(OUTPUT_PATH), &config)
}

/// Parses an unsigned-integer environment variable, defaulting to
/// `default` if unset (spec.md §6: only `SHARDS`/`SHARD` are read).
fn env_u32(name: &str, default: u32) -> Result<u32> {
	match std::env::var(name) {
		Ok(value) => value.parse().with_context(|| format!("invalid {name}={value:?}")),
		Err(std::env::VarError::NotPresent) => Ok(default),
		Err(std::env::VarError::NotUnicode(_)) => bail!("{name} is not valid unicode"),
	}
}
