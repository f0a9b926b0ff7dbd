use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use anyhow::Result;
use log::debug;
use thiserror::Error;

use crate::session::MeasurementPair;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("log file is missing its end-of-data trailer")]
    TrailerMissing,
    #[error("just-written block not found at the end of the log file")]
    BlockMissing,
}

const FILE_HEADER: &str = "Sensor Data Pairs\n=================\n\n";
pub const END_MARKER: &str = "END OF DATA";

/// Text appended to the log file for one run.
pub fn render_block(pairs: &[MeasurementPair]) -> String {
    let mut block = String::new();
    for (index, pair) in pairs.iter().enumerate() {
        writeln!(block, "Pair {}: {}", index + 1, pair).unwrap();
    }
    block.push('\n');
    block.push_str(END_MARKER);
    block.push('\n');
    block
}

/// Appends one block of pairs, writing the file header first if the file
/// does not exist yet. Existing content is never truncated.
pub fn append_block(path: &Path, pairs: &[MeasurementPair]) -> Result<()> {
    let fresh = !path.is_file();

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if fresh {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(render_block(pairs).as_bytes())?;

    debug!("appended {} pairs to {}", pairs.len(), path.display());
    Ok(())
}

/// Re-reads the log file and checks that it ends with the block for
/// `pairs`, trailer line included.
pub fn verify_block(path: &Path, pairs: &[MeasurementPair]) -> Result<()> {
    let contents = fs::read_to_string(path)?;

    let last_line = contents.lines().rev().find(|line| !line.trim().is_empty());
    if last_line != Some(END_MARKER) {
        return Err(VerifyError::TrailerMissing.into());
    }

    if !contents.ends_with(&render_block(pairs)) {
        return Err(VerifyError::BlockMissing.into());
    }

    Ok(())
}
