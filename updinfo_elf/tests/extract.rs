use std::io::Write;

use tempfile::NamedTempFile;
use updinfo_elf::{ExtractError, ReadError, UPDATE_INFO_SECTION, read_and_parse, read_section, read_update_info};
use updinfo_types::{ParseError, UpdateInformation, ValidationError};

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHT_NOBITS: u32 = 8;

struct Section {
    name: String,
    kind: u32,
    data: Vec<u8>,
}

fn progbits(name: &str, data: &[u8]) -> Section {
    Section {
        name: name.to_string(),
        kind: SHT_PROGBITS,
        data: data.to_vec(),
    }
}

/// Writes just enough of an ELF image for section lookup to work.
struct Fixture {
    elf64: bool,
    big_endian: bool,
    extended_numbering: bool,
    sections: Vec<Section>,
}

impl Fixture {
    fn new(sections: Vec<Section>) -> Self {
        Self {
            elf64: true,
            big_endian: false,
            extended_numbering: false,
            sections,
        }
    }

    fn put16(&self, out: &mut Vec<u8>, v: u16) {
        if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn put32(&self, out: &mut Vec<u8>, v: u32) {
        if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn word(&self, out: &mut Vec<u8>, v: u64) {
        if !self.elf64 {
            self.put32(out, v as u32);
        } else if self.big_endian {
            out.extend_from_slice(&v.to_be_bytes());
        } else {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn section_header(&self, out: &mut Vec<u8>, name: u32, kind: u32, offset: u64, size: u64, link: u32) {
        self.put32(out, name);
        self.put32(out, kind);
        self.word(out, 0); // flags
        self.word(out, 0); // addr
        self.word(out, offset);
        self.word(out, size);
        self.put32(out, link);
        self.put32(out, 0); // info
        self.word(out, 1); // addralign
        self.word(out, 0); // entsize
    }

    fn build(&self) -> Vec<u8> {
        let ehsize: u16 = if self.elf64 { 64 } else { 52 };
        let shentsize: u16 = if self.elf64 { 64 } else { 40 };
        let mut out = vec![0u8; ehsize as usize];

        let mut strtab = vec![0u8];
        let mut placed = Vec::new();
        for s in &self.sections {
            let name_off = strtab.len() as u32;
            strtab.extend_from_slice(s.name.as_bytes());
            strtab.push(0);
            let offset = out.len() as u64;
            if s.kind != SHT_NOBITS {
                out.extend_from_slice(&s.data);
            }
            placed.push((name_off, s.kind, offset, s.data.len() as u64));
        }
        let shstrtab_name = strtab.len() as u32;
        strtab.extend_from_slice(b".shstrtab\0");
        let strtab_off = out.len() as u64;
        out.extend_from_slice(&strtab);
        while out.len() % 8 != 0 {
            out.push(0);
        }

        let shoff = out.len() as u64;
        let shnum = self.sections.len() as u16 + 2;
        let shstrndx = shnum - 1;
        if self.extended_numbering {
            self.section_header(&mut out, 0, 0, 0, shnum as u64, shstrndx as u32);
        } else {
            self.section_header(&mut out, 0, 0, 0, 0, 0);
        }
        for (name, kind, offset, size) in placed {
            self.section_header(&mut out, name, kind, offset, size, 0);
        }
        self.section_header(&mut out, shstrtab_name, SHT_STRTAB, strtab_off, strtab.len() as u64, 0);

        let mut ehdr = Vec::new();
        ehdr.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
        ehdr.push(if self.elf64 { 2 } else { 1 });
        ehdr.push(if self.big_endian { 2 } else { 1 });
        ehdr.push(1);
        ehdr.resize(16, 0);
        self.put16(&mut ehdr, 2); // ET_EXEC
        self.put16(&mut ehdr, 62);
        self.put32(&mut ehdr, 1);
        self.word(&mut ehdr, 0); // entry
        self.word(&mut ehdr, 0); // phoff
        self.word(&mut ehdr, shoff);
        self.put32(&mut ehdr, 0);
        self.put16(&mut ehdr, ehsize);
        self.put16(&mut ehdr, 0);
        self.put16(&mut ehdr, 0);
        self.put16(&mut ehdr, shentsize);
        if self.extended_numbering {
            self.put16(&mut ehdr, 0);
            self.put16(&mut ehdr, 0xffff);
        } else {
            self.put16(&mut ehdr, shnum);
            self.put16(&mut ehdr, shstrndx);
        }
        assert_eq!(ehdr.len(), ehsize as usize);
        out[..ehdr.len()].copy_from_slice(&ehdr);
        out
    }

    fn write(&self) -> NamedTempFile {
        write_bytes(&self.build())
    }
}

fn write_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(bytes).expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

fn appimage_like(info: &str) -> Fixture {
    // AppImages reserve a fixed, zero padded block for the string
    let mut data = info.as_bytes().to_vec();
    data.resize(1024, 0);
    Fixture::new(vec![
        progbits(".text", &[0x90; 32]),
        progbits(UPDATE_INFO_SECTION, &data),
        progbits(".sha256_sig", &[0; 64]),
    ])
}

#[test]
fn reads_update_info_from_section() {
    let file = Fixture::new(vec![progbits(
        UPDATE_INFO_SECTION,
        b"zsync|https://example.com/app.zsync\0",
    )])
    .write();
    assert_eq!(
        read_update_info(file.path()).unwrap(),
        "zsync|https://example.com/app.zsync"
    );
}

#[test]
fn ignores_bytes_after_terminator() {
    let file = appimage_like("gh-releases-zsync|me|app|latest|app-*.AppImage.zsync").write();
    assert_eq!(
        read_update_info(file.path()).unwrap(),
        "gh-releases-zsync|me|app|latest|app-*.AppImage.zsync"
    );
}

#[test]
fn reads_elf32_big_endian() {
    let mut fixture = appimage_like("zsync|http://example.com/x.zsync");
    fixture.elf64 = false;
    fixture.big_endian = true;
    let file = fixture.write();
    assert_eq!(read_update_info(file.path()).unwrap(), "zsync|http://example.com/x.zsync");
}

#[test]
fn reads_with_extended_section_numbering() {
    let mut fixture = appimage_like("zsync|http://example.com/x.zsync");
    fixture.extended_numbering = true;
    let file = fixture.write();
    assert_eq!(read_update_info(file.path()).unwrap(), "zsync|http://example.com/x.zsync");
}

#[test]
fn read_section_returns_whole_payload() {
    let file = appimage_like("zsync|http://example.com/x.zsync").write();
    let data = read_section(file.path(), UPDATE_INFO_SECTION).unwrap();
    assert_eq!(data.len(), 1024);
    let sig = read_section(file.path(), ".sha256_sig").unwrap();
    assert_eq!(sig, vec![0u8; 64]);
}

#[test]
fn missing_section() {
    let file = Fixture::new(vec![progbits(".text", &[0xc3])]).write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::SectionMissing(name)) if name == UPDATE_INFO_SECTION
    ));
}

#[test]
fn section_name_must_match_exactly() {
    let file = Fixture::new(vec![progbits(".upd_info2", b"zsync|http://a/b.zsync\0")]).write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::SectionMissing(_))
    ));
}

#[test]
fn missing_terminator() {
    let file = Fixture::new(vec![progbits(
        UPDATE_INFO_SECTION,
        b"zsync|https://example.com/app.zsync",
    )])
    .write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::NoTerminator)
    ));
}

#[test]
fn empty_payload() {
    let file = appimage_like("").write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::EmptyPayload)
    ));
}

#[test]
fn invalid_utf8() {
    let file = Fixture::new(vec![progbits(UPDATE_INFO_SECTION, b"zsync|\xc3\x28.zsync\0")]).write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::InvalidEncoding(_))
    ));
}

#[test]
fn nobits_section_is_unreadable() {
    let file = Fixture::new(vec![Section {
        name: UPDATE_INFO_SECTION.to_string(),
        kind: SHT_NOBITS,
        data: vec![0; 1024],
    }])
    .write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::SectionUnreadable { .. })
    ));
}

#[test]
fn oversized_section_is_unreadable() {
    let file = Fixture::new(vec![progbits(UPDATE_INFO_SECTION, &vec![b'a'; 128 * 1024])]).write();
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::SectionUnreadable { .. })
    ));
}

#[test]
fn truncated_section_is_unreadable() {
    let mut bytes = appimage_like("zsync|http://example.com/x.zsync").build();
    // keep the headers but point the section past the end of the file
    let shoff = u64::from_le_bytes(bytes[40..48].try_into().unwrap()) as usize;
    let upd_info = shoff + 2 * 64;
    bytes[upd_info + 24..upd_info + 32].copy_from_slice(&(1u64 << 40).to_le_bytes());
    let file = write_bytes(&bytes);
    assert!(matches!(
        read_update_info(file.path()),
        Err(ExtractError::SectionUnreadable { .. })
    ));
}

#[test]
fn section_count_is_capped() {
    let mut fixture = appimage_like("zsync|http://example.com/x.zsync");
    fixture.extended_numbering = true;
    let mut bytes = fixture.build();
    let shoff = u64::from_le_bytes(bytes[40..48].try_into().unwrap()) as usize;

    // a table this long really is in the file, but holds more sections than allowed
    let shnum: u64 = (1 << 16) + 1;
    bytes.resize(shoff + shnum as usize * 64, 0);
    bytes[shoff + 32..shoff + 40].copy_from_slice(&shnum.to_le_bytes());
    let file = write_bytes(&bytes);
    assert!(read_update_info(file.path()).unwrap_err().is_not_elf());
}

#[test]
fn oversized_name_table_is_refused() {
    let long_name = format!(".{}", "n".repeat(2 * 1024 * 1024));
    let file = Fixture::new(vec![
        progbits(&long_name, &[0]),
        progbits(UPDATE_INFO_SECTION, b"zsync|http://example.com/x.zsync\0"),
    ])
    .write();
    assert!(read_update_info(file.path()).unwrap_err().is_not_elf());
}

#[test]
fn not_an_elf_file() {
    let file = write_bytes(b"#!/bin/sh\necho hello\n");
    let err = read_update_info(file.path()).unwrap_err();
    assert!(err.is_not_elf(), "unexpected error: {err}");

    let file = write_bytes(&[0x7f, b'E', b'L']);
    assert!(read_update_info(file.path()).unwrap_err().is_not_elf());

    let mut header_only = vec![0x7f, b'E', b'L', b'F', 2, 1, 1];
    header_only.resize(20, 0);
    let file = write_bytes(&header_only);
    assert!(read_update_info(file.path()).unwrap_err().is_not_elf());
}

#[test]
fn file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.AppImage");
    assert!(matches!(
        read_update_info(&missing),
        Err(ExtractError::FileNotFound { path, .. }) if path == missing
    ));
}

#[test]
fn read_and_parse_end_to_end() {
    let file = appimage_like(
        "gh-releases-zsync|exampleuser|exampleapp|latest|exampleapp-*-x86_64.AppImage.zsync",
    )
    .write();
    assert_eq!(
        read_and_parse(file.path()).unwrap(),
        UpdateInformation::GithubReleasesZsync {
            owner: "exampleuser".into(),
            repo: "exampleapp".into(),
            release_name: "latest".into(),
            zsync_filename_pattern: "exampleapp-*-x86_64.AppImage.zsync".into(),
        }
    );

    let file = appimage_like("ftp|example.com/file.zsync").write();
    assert!(matches!(
        read_and_parse(file.path()),
        Err(ReadError::Parse(ParseError::Invalid(ValidationError::UnknownMechanism(_))))
    ));
}
