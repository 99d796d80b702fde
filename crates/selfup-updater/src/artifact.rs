//! Structural validation of downloaded executables.
//!
//! A release asset is only swapped in if it parses as an executable image for
//! the running platform: ELF on Linux and the BSDs, Mach-O (thin or universal)
//! on macOS, PE on Windows. The container headers are checked, and every
//! segment, section or slice they describe must lie inside the file, so a
//! download cut short is rejected. Signatures are out of scope.
//!
//! [`validate_artifact`] owns the file handle for its whole lifetime and drops
//! it before returning, so the caller may rename or delete the file right away
//! even on platforms that lock open files.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

/// Bytes read from the start of the file for header inspection.
const HEAD_LEN: u64 = 4096;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const MACHO_MAGIC_32: u32 = 0xfeed_face;
const MACHO_MAGIC_64: u32 = 0xfeed_facf;
const MACHO_FAT_MAGIC: u32 = 0xcafe_babe;
const MACHO_EXECUTE: u32 = 0x2;
/// Java class files share the fat magic; their "arch count" is a class file
/// version of 45 or more.
const MACHO_MAX_FAT_ARCHS: u32 = 32;
const PE_EXECUTABLE_IMAGE: u16 = 0x0002;

/// Executable container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Executable and Linkable Format.
    Elf,
    /// Single-architecture Mach-O image.
    MachO,
    /// Universal Mach-O binary.
    MachOFat,
    /// Portable Executable.
    Pe,
}

impl ArtifactFormat {
    /// The format executables of the running platform use.
    #[must_use]
    pub const fn native() -> Self {
        if cfg!(target_os = "windows") {
            Self::Pe
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::MachO
        } else {
            Self::Elf
        }
    }

    /// Check whether this platform can run images of this format.
    #[must_use]
    pub fn is_native(&self) -> bool {
        match (Self::native(), self) {
            (Self::MachO, Self::MachO | Self::MachOFat) => true,
            (native, format) => native == *format,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf => write!(f, "ELF"),
            Self::MachO => write!(f, "Mach-O"),
            Self::MachOFat => write!(f, "universal Mach-O"),
            Self::Pe => write!(f, "PE"),
        }
    }
}

/// A file that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidArtifact {
    /// Detected container format.
    pub format: ArtifactFormat,
    /// File size in bytes.
    pub size: u64,
}

/// Why a file is not a usable executable.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The file is empty.
    #[error("file is empty")]
    Empty,

    /// No known executable signature at the start of the file.
    #[error("not an executable image (unrecognised header)")]
    UnknownFormat,

    /// The file ends before a header field or a region the headers describe.
    #[error("{format} image is truncated ({size} bytes)")]
    Truncated {
        /// Detected format.
        format: ArtifactFormat,
        /// File size in bytes.
        size: u64,
    },

    /// A header field holds an impossible value.
    #[error("malformed {format} image: {reason}")]
    Malformed {
        /// Detected format.
        format: ArtifactFormat,
        /// What was wrong.
        reason: &'static str,
    },

    /// A valid image for a different platform.
    #[error("{found} image cannot run on this platform (expected {expected})")]
    ForeignPlatform {
        /// Detected format.
        found: ArtifactFormat,
        /// Native format.
        expected: ArtifactFormat,
    },

    /// The file could not be read.
    #[error("failed to read artifact: {0}")]
    Io(#[from] io::Error),
}

impl ArtifactError {
    /// Check whether the file content is at fault, as opposed to the system.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Validate that `path` holds an executable image for this platform.
pub fn validate_artifact(path: &Path) -> Result<ValidArtifact, ArtifactError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Err(ArtifactError::Empty);
    }

    let mut head = Vec::with_capacity(HEAD_LEN.min(size) as usize);
    (&mut file).take(HEAD_LEN).read_to_end(&mut head)?;

    let format = inspect(&head, size, &mut file)?;
    drop(file);

    if !format.is_native() {
        return Err(ArtifactError::ForeignPlatform {
            found: format,
            expected: ArtifactFormat::native(),
        });
    }

    Ok(ValidArtifact { format, size })
}

/// Identify and check the container.
fn inspect(head: &[u8], size: u64, file: &mut File) -> Result<ArtifactFormat, ArtifactError> {
    if head.starts_with(&ELF_MAGIC) {
        check_elf(head, size, file)?;
        return Ok(ArtifactFormat::Elf);
    }
    if head.starts_with(b"MZ") {
        check_pe(head, size, file)?;
        return Ok(ArtifactFormat::Pe);
    }
    match read_u32(head, 0, Endian::Big) {
        Some(MACHO_FAT_MAGIC) => {
            check_macho_fat(head, size)?;
            Ok(ArtifactFormat::MachOFat)
        }
        Some(magic) if is_macho_magic(magic) || is_macho_magic(magic.swap_bytes()) => {
            check_macho(head, size, file)?;
            Ok(ArtifactFormat::MachO)
        }
        _ => Err(ArtifactError::UnknownFormat),
    }
}

#[derive(Debug, Clone, Copy)]
enum Endian {
    Little,
    Big,
}

fn read_u16(buf: &[u8], offset: usize, endian: Endian) -> Option<u16> {
    let bytes: [u8; 2] = buf.get(offset..offset + 2)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(bytes),
        Endian::Big => u16::from_be_bytes(bytes),
    })
}

fn read_u32(buf: &[u8], offset: usize, endian: Endian) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(bytes),
        Endian::Big => u32::from_be_bytes(bytes),
    })
}

fn read_u64(buf: &[u8], offset: usize, endian: Endian) -> Option<u64> {
    let bytes: [u8; 8] = buf.get(offset..offset + 8)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u64::from_le_bytes(bytes),
        Endian::Big => u64::from_be_bytes(bytes),
    })
}

/// Whether `len` bytes starting at `offset` lie inside a file of `size` bytes.
fn fits(offset: u64, len: u64, size: u64) -> bool {
    offset.checked_add(len).is_some_and(|end| end <= size)
}

/// Read `len` bytes at `offset`. A range past the end of the file means the
/// image is truncated.
fn read_range(
    file: &mut File,
    size: u64,
    format: ArtifactFormat,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>, ArtifactError> {
    let truncated = ArtifactError::Truncated { format, size };
    if !fits(offset, len, size) {
        return Err(truncated);
    }
    let len = usize::try_from(len).map_err(|_| truncated)?;
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn check_elf(head: &[u8], size: u64, file: &mut File) -> Result<(), ArtifactError> {
    const FORMAT: ArtifactFormat = ArtifactFormat::Elf;
    const PT_LOAD: u32 = 1;
    let truncated = || ArtifactError::Truncated { format: FORMAT, size };
    let malformed = |reason| ArtifactError::Malformed {
        format: FORMAT,
        reason,
    };

    if head.len() < 16 {
        return Err(truncated());
    }
    let is_64 = match head[4] {
        1 => false,
        2 => true,
        _ => return Err(malformed("unknown ELF class")),
    };
    let endian = match head[5] {
        1 => Endian::Little,
        2 => Endian::Big,
        _ => return Err(malformed("unknown byte order")),
    };
    if head[6] != 1 {
        return Err(malformed("unsupported ELF version"));
    }

    let header_len = if is_64 { 64 } else { 52 };
    if head.len() < header_len {
        return Err(truncated());
    }

    // ET_EXEC or ET_DYN (position independent executables).
    let e_type = read_u16(head, 16, endian).ok_or_else(truncated)?;
    if e_type != 2 && e_type != 3 {
        return Err(malformed("not an executable object"));
    }

    let (ph_offset, ph_entry_size, ph_count, sh_offset, sh_entry_size, sh_count) = if is_64 {
        (
            read_u64(head, 32, endian),
            read_u16(head, 54, endian),
            read_u16(head, 56, endian),
            read_u64(head, 40, endian),
            read_u16(head, 58, endian),
            read_u16(head, 60, endian),
        )
    } else {
        (
            read_u32(head, 28, endian).map(u64::from),
            read_u16(head, 42, endian),
            read_u16(head, 44, endian),
            read_u32(head, 32, endian).map(u64::from),
            read_u16(head, 46, endian),
            read_u16(head, 48, endian),
        )
    };
    let ph_offset = ph_offset.ok_or_else(truncated)?;
    let ph_entry_size = ph_entry_size.ok_or_else(truncated)?;
    let ph_count = ph_count.ok_or_else(truncated)?;
    let sh_offset = sh_offset.ok_or_else(truncated)?;
    let sh_entry_size = sh_entry_size.ok_or_else(truncated)?;
    let sh_count = sh_count.ok_or_else(truncated)?;

    if ph_count == 0 || ph_entry_size == 0 {
        return Err(malformed("no program headers"));
    }
    let min_entry_size: u16 = if is_64 { 56 } else { 32 };
    if ph_entry_size < min_entry_size {
        return Err(malformed("program header entries are too small"));
    }

    // Every loadable segment must be fully present.
    let table_len = u64::from(ph_entry_size) * u64::from(ph_count);
    let table = read_range(file, size, FORMAT, ph_offset, table_len)?;
    for entry in table.chunks_exact(usize::from(ph_entry_size)) {
        if read_u32(entry, 0, endian) != Some(PT_LOAD) {
            continue;
        }
        let (offset, file_size) = if is_64 {
            (read_u64(entry, 8, endian), read_u64(entry, 32, endian))
        } else {
            (
                read_u32(entry, 4, endian).map(u64::from),
                read_u32(entry, 16, endian).map(u64::from),
            )
        };
        let (offset, file_size) = offset.zip(file_size).ok_or_else(truncated)?;
        if !fits(offset, file_size, size) {
            return Err(truncated());
        }
    }

    // The section header table is normally the last thing in the file.
    // A count of zero with a table present means extended numbering, which
    // still has at least one entry.
    if sh_offset != 0 {
        let sh_len = u64::from(sh_entry_size) * u64::from(sh_count.max(1));
        if !fits(sh_offset, sh_len, size) {
            return Err(truncated());
        }
    }
    Ok(())
}

fn is_macho_magic(magic: u32) -> bool {
    magic == MACHO_MAGIC_32 || magic == MACHO_MAGIC_64
}

fn check_macho(head: &[u8], size: u64, file: &mut File) -> Result<(), ArtifactError> {
    const FORMAT: ArtifactFormat = ArtifactFormat::MachO;
    const LC_SEGMENT: u32 = 0x1;
    const LC_SEGMENT_64: u32 = 0x19;
    let truncated = || ArtifactError::Truncated { format: FORMAT, size };
    let malformed = |reason| ArtifactError::Malformed {
        format: FORMAT,
        reason,
    };

    // The magic reads back correctly in the file's own byte order.
    let big = read_u32(head, 0, Endian::Big).ok_or_else(truncated)?;
    let endian = if is_macho_magic(big) {
        Endian::Big
    } else {
        Endian::Little
    };
    let magic = read_u32(head, 0, endian).ok_or_else(truncated)?;
    let header_len: u64 = if magic == MACHO_MAGIC_64 { 32 } else { 28 };

    let file_type = read_u32(head, 12, endian).ok_or_else(truncated)?;
    if file_type != MACHO_EXECUTE {
        return Err(malformed("not an executable file type"));
    }

    let command_count = read_u32(head, 16, endian).ok_or_else(truncated)?;
    let commands_len = read_u32(head, 20, endian).ok_or_else(truncated)?;
    if command_count == 0 {
        return Err(malformed("no load commands"));
    }
    let commands = read_range(file, size, FORMAT, header_len, u64::from(commands_len))?;

    let mut offset = 0usize;
    for _ in 0..command_count {
        let overrun = || malformed("load commands overrun their table");
        let command_type = read_u32(&commands, offset, endian).ok_or_else(overrun)?;
        let command_len = read_u32(&commands, offset + 4, endian).ok_or_else(overrun)? as usize;
        if command_len < 8 {
            return Err(malformed("load command is too small"));
        }
        let end = offset.checked_add(command_len).ok_or_else(overrun)?;
        let command = commands.get(offset..end).ok_or_else(overrun)?;

        let segment = match command_type {
            LC_SEGMENT => Some(
                read_u32(command, 32, endian)
                    .map(u64::from)
                    .zip(read_u32(command, 36, endian).map(u64::from)),
            ),
            LC_SEGMENT_64 => Some(read_u64(command, 40, endian).zip(read_u64(command, 48, endian))),
            _ => None,
        };
        if let Some(segment) = segment {
            let (file_offset, file_size) =
                segment.ok_or_else(|| malformed("segment command is too small"))?;
            if !fits(file_offset, file_size, size) {
                return Err(truncated());
            }
        }
        offset = end;
    }
    Ok(())
}

fn check_macho_fat(head: &[u8], size: u64) -> Result<(), ArtifactError> {
    const FORMAT: ArtifactFormat = ArtifactFormat::MachOFat;
    let truncated = || ArtifactError::Truncated { format: FORMAT, size };

    let arch_count = read_u32(head, 4, Endian::Big).ok_or_else(truncated)?;
    if arch_count == 0 || arch_count > MACHO_MAX_FAT_ARCHS {
        return Err(ArtifactError::Malformed {
            format: FORMAT,
            reason: "implausible architecture count",
        });
    }

    // 8-byte fat header followed by 20-byte fat_arch records.
    for index in 0..arch_count as usize {
        let record = 8 + 20 * index;
        let offset = read_u32(head, record + 8, Endian::Big).ok_or_else(truncated)?;
        let len = read_u32(head, record + 12, Endian::Big).ok_or_else(truncated)?;
        if !fits(u64::from(offset), u64::from(len), size) {
            return Err(truncated());
        }
    }
    Ok(())
}

fn check_pe(head: &[u8], size: u64, file: &mut File) -> Result<(), ArtifactError> {
    const FORMAT: ArtifactFormat = ArtifactFormat::Pe;
    const SECTION_HEADER_LEN: u64 = 40;
    let truncated = || ArtifactError::Truncated { format: FORMAT, size };

    let pe_offset = u64::from(read_u32(head, 0x3c, Endian::Little).ok_or_else(truncated)?);
    // "PE\0\0" + 20-byte COFF header.
    let coff = read_range(file, size, FORMAT, pe_offset, 24)?;

    if &coff[..4] != b"PE\0\0" {
        return Err(ArtifactError::Malformed {
            format: FORMAT,
            reason: "missing PE signature",
        });
    }
    let section_count = read_u16(&coff, 4 + 2, Endian::Little).ok_or_else(truncated)?;
    let optional_len = read_u16(&coff, 4 + 16, Endian::Little).ok_or_else(truncated)?;
    let characteristics = read_u16(&coff, 4 + 18, Endian::Little).ok_or_else(truncated)?;
    if characteristics & PE_EXECUTABLE_IMAGE == 0 {
        return Err(ArtifactError::Malformed {
            format: FORMAT,
            reason: "image is not marked executable",
        });
    }

    let table_offset = pe_offset + 24 + u64::from(optional_len);
    let table = read_range(
        file,
        size,
        FORMAT,
        table_offset,
        SECTION_HEADER_LEN * u64::from(section_count),
    )?;
    for section in table.chunks_exact(SECTION_HEADER_LEN as usize) {
        let raw_len = read_u32(section, 16, Endian::Little).ok_or_else(truncated)?;
        let raw_offset = read_u32(section, 20, Endian::Little).ok_or_else(truncated)?;
        if !fits(u64::from(raw_offset), u64::from(raw_len), size) {
            return Err(truncated());
        }
    }
    Ok(())
}
