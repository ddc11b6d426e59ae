//! Minimal ELF section table reader for ELF32/ELF64 in either byte order.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::ExtractError;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const EI_NIDENT: usize = 16;
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const SHN_XINDEX: u32 = 0xffff;
const SHT_NOBITS: u32 = 8;
const SHF_COMPRESSED: u64 = 0x800;

/// Largest section payload we are willing to read.
pub(crate) const MAX_SECTION_SIZE: u64 = 64 * 1024;
/// Upper bound for section counts, extended numbering included.
const MAX_SECTIONS: u64 = 1 << 16;
/// Upper bound for the section header table in bytes.
const MAX_SECTION_TABLE_SIZE: u64 = 8 * 1024 * 1024;
/// Upper bound for the section name string table.
const MAX_NAME_TABLE_SIZE: u64 = 1024 * 1024;

#[derive(Clone, Copy)]
enum Class {
    Elf32,
    Elf64,
}

impl Class {
    /// Header size without `e_ident`.
    fn ehdr_rest(self) -> usize {
        match self {
            Class::Elf32 => 52 - EI_NIDENT,
            Class::Elf64 => 64 - EI_NIDENT,
        }
    }

    fn shdr_size(self) -> usize {
        match self {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

/// Reads fixed-width integers out of a header buffer.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
    class: Class,
    endian: Endian,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8], class: Class, endian: Endian) -> Self {
        Self { buf, pos: 0, class, endian }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u16(&mut self) -> u16 {
        let b = self.take::<2>();
        match self.endian {
            Endian::Little => u16::from_le_bytes(b),
            Endian::Big => u16::from_be_bytes(b),
        }
    }

    fn u32(&mut self) -> u32 {
        let b = self.take::<4>();
        match self.endian {
            Endian::Little => u32::from_le_bytes(b),
            Endian::Big => u32::from_be_bytes(b),
        }
    }

    fn u64(&mut self) -> u64 {
        let b = self.take::<8>();
        match self.endian {
            Endian::Little => u64::from_le_bytes(b),
            Endian::Big => u64::from_be_bytes(b),
        }
    }

    /// Address-sized field: 4 bytes on ELF32, 8 on ELF64.
    fn word(&mut self) -> u64 {
        match self.class {
            Class::Elf32 => self.u32() as u64,
            Class::Elf64 => self.u64(),
        }
    }
}

struct SectionHeader {
    name: u32,
    kind: u32,
    flags: u64,
    offset: u64,
    size: u64,
    link: u32,
}

impl SectionHeader {
    fn parse(buf: &[u8], class: Class, endian: Endian) -> Self {
        let mut f = Fields::new(buf, class, endian);
        let name = f.u32();
        let kind = f.u32();
        let flags = f.word();
        let _addr = f.word();
        let offset = f.word();
        let size = f.word();
        let link = f.u32();
        Self { name, kind, flags, offset, size, link }
    }
}

/// An opened ELF file with its section header table loaded.
///
/// Dropping it closes the underlying file.
pub(crate) struct ElfFile {
    file: File,
    path: PathBuf,
    len: u64,
    sections: Vec<SectionHeader>,
    shstrndx: usize,
}

impl ElfFile {
    pub(crate) fn open(path: &Path) -> Result<Self, ExtractError> {
        let not_found = |source: io::Error| ExtractError::FileNotFound {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(not_found)?;
        let len = file.metadata().map_err(not_found)?.len();

        let mut elf = ElfFile {
            file,
            path: path.to_path_buf(),
            len,
            sections: Vec::new(),
            shstrndx: 0,
        };
        elf.load_section_table()?;
        Ok(elf)
    }

    fn not_elf(&self, reason: impl Into<String>) -> ExtractError {
        ExtractError::NotAnElfFile {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn load_section_table(&mut self) -> Result<(), ExtractError> {
        let mut ident = [0u8; EI_NIDENT];
        self.read_at(0, &mut ident)
            .map_err(|_| self.not_elf("file too small for ELF header"))?;
        if ident[..4] != ELF_MAGIC {
            return Err(self.not_elf("bad magic"));
        }
        let class = match ident[4] {
            ELFCLASS32 => Class::Elf32,
            ELFCLASS64 => Class::Elf64,
            other => return Err(self.not_elf(format!("unknown ELF class {other}"))),
        };
        let endian = match ident[5] {
            ELFDATA2LSB => Endian::Little,
            ELFDATA2MSB => Endian::Big,
            other => return Err(self.not_elf(format!("unknown data encoding {other}"))),
        };

        let mut rest = vec![0u8; class.ehdr_rest()];
        self.read_at(EI_NIDENT as u64, &mut rest)
            .map_err(|_| self.not_elf("truncated ELF header"))?;
        let mut f = Fields::new(&rest, class, endian);
        let _e_type = f.u16();
        let _e_machine = f.u16();
        let _e_version = f.u32();
        let _e_entry = f.word();
        let _e_phoff = f.word();
        let shoff = f.word();
        let _e_flags = f.u32();
        let _e_ehsize = f.u16();
        let _e_phentsize = f.u16();
        let _e_phnum = f.u16();
        let shentsize = f.u16() as usize;
        let mut shnum = f.u16() as u64;
        let mut shstrndx = f.u16() as u32;

        if shoff == 0 {
            // no section header table at all
            return Ok(());
        }
        if shentsize < class.shdr_size() {
            return Err(self.not_elf(format!("section header size {shentsize} too small")));
        }

        let mut entry = vec![0u8; shentsize];
        self.read_at(shoff, &mut entry)
            .map_err(|_| self.not_elf("section header table out of bounds"))?;
        let first = SectionHeader::parse(&entry, class, endian);
        // extended section numbering keeps the real values in section 0
        if shnum == 0 {
            shnum = first.size;
        }
        if shstrndx == SHN_XINDEX {
            shstrndx = first.link;
        }

        if shnum > MAX_SECTIONS {
            return Err(self.not_elf(format!("{shnum} sections exceed the limit of {MAX_SECTIONS}")));
        }

        let table_len = shnum
            .checked_mul(shentsize as u64)
            .filter(|n| *n <= MAX_SECTION_TABLE_SIZE)
            .filter(|n| shoff.checked_add(*n).is_some_and(|end| end <= self.len))
            .ok_or_else(|| self.not_elf("section header table out of bounds"))?;
        let mut table = vec![0u8; table_len as usize];
        self.read_at(shoff, &mut table)
            .map_err(|_| self.not_elf("section header table out of bounds"))?;

        self.sections = table
            .chunks_exact(shentsize)
            .map(|chunk| SectionHeader::parse(chunk, class, endian))
            .collect();
        if !self.sections.is_empty() && shstrndx as usize >= self.sections.len() {
            return Err(self.not_elf(format!("section name table index {shstrndx} out of range")));
        }
        self.shstrndx = shstrndx as usize;
        trace!(path = %self.path.display(), sections = self.sections.len(), "loaded section table");
        Ok(())
    }

    fn read_data(&mut self, idx: usize, name: &str, limit: Option<u64>) -> Result<Vec<u8>, ExtractError> {
        let unreadable = |reason: String| ExtractError::SectionUnreadable {
            section: name.to_string(),
            reason,
        };
        let sh = &self.sections[idx];
        if sh.kind == SHT_NOBITS {
            return Err(unreadable("section occupies no space in the file".into()));
        }
        if sh.flags & SHF_COMPRESSED != 0 {
            return Err(unreadable("compressed sections are not supported".into()));
        }
        if let Some(limit) = limit {
            if sh.size > limit {
                return Err(unreadable(format!("section is {} bytes, limit is {limit}", sh.size)));
            }
        }
        if sh.offset.checked_add(sh.size).is_none_or(|end| end > self.len) {
            return Err(unreadable("section extends past end of file".into()));
        }

        let (offset, size) = (sh.offset, sh.size as usize);
        let mut data = vec![0u8; size];
        self.read_at(offset, &mut data)
            .map_err(|e| unreadable(e.to_string()))?;
        Ok(data)
    }

    /// Reads the payload of the first section called `name`.
    pub(crate) fn section_data(&mut self, name: &str) -> Result<Vec<u8>, ExtractError> {
        if self.sections.is_empty() {
            return Err(ExtractError::SectionMissing(name.to_string()));
        }
        let strtab = self
            .read_data(self.shstrndx, ".shstrtab", Some(MAX_NAME_TABLE_SIZE))
            .map_err(|e| self.not_elf(format!("cannot read section names: {e}")))?;

        let idx = self
            .sections
            .iter()
            .position(|sh| section_name(&strtab, sh.name) == Some(name.as_bytes()))
            .ok_or_else(|| ExtractError::SectionMissing(name.to_string()))?;
        debug!(path = %self.path.display(), section = name, index = idx, "found section");

        self.read_data(idx, name, Some(MAX_SECTION_SIZE))
    }
}

fn section_name(strtab: &[u8], offset: u32) -> Option<&[u8]> {
    let tail = strtab.get(offset as usize..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    Some(&tail[..end])
}
