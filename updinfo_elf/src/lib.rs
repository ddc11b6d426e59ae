//! Reads the update information an AppImage carries in its `.upd_info` ELF section.

mod elf;
mod error;

use std::path::Path;

use tracing::debug;
use updinfo_types::UpdateInformation;

pub use error::{ExtractError, ReadError};

/// Name of the section holding the update information string.
pub const UPDATE_INFO_SECTION: &str = ".upd_info";

/// Returns the raw bytes of the section `name` in the ELF file at `path`.
pub fn read_section(path: impl AsRef<Path>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let mut elf = elf::ElfFile::open(path.as_ref())?;
    elf.section_data(name)
}

/// Extracts the null-terminated update information string of `path`.
///
/// Anything after the first null byte in the section is ignored.
pub fn read_update_info(path: impl AsRef<Path>) -> Result<String, ExtractError> {
    let path = path.as_ref();
    let data = read_section(path, UPDATE_INFO_SECTION)?;
    let info = payload_string(&data)?;
    debug!(path = %path.display(), update_info = %info, "read update information");
    Ok(info)
}

/// Extracts and parses the update information of `path`.
pub fn read_and_parse(path: impl AsRef<Path>) -> Result<UpdateInformation, ReadError> {
    let raw = read_update_info(path)?;
    Ok(updinfo_types::parse(&raw)?)
}

fn payload_string(data: &[u8]) -> Result<String, ExtractError> {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .ok_or(ExtractError::NoTerminator)?;
    if end == 0 {
        return Err(ExtractError::EmptyPayload);
    }
    Ok(std::str::from_utf8(&data[..end])?.to_owned())
}
