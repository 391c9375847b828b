//! PE image access for CLI metadata loading.
//!
//! This module provides the [`File`] abstraction: a fully buffered PE image
//! together with the pieces of the envelope the metadata engine needs — the
//! section table for RVA translation and the CLR data directory that locates
//! the Cor20 header. The heavy lifting of PE parsing is delegated to the
//! `goblin` crate; everything the engine keeps is copied out into owned
//! structures so the image buffer can be sliced freely afterwards.
//!
//! # Example
//!
//! ```rust,no_run
//! use cilforge::file::File;
//!
//! let file = File::from_file("library.dll".as_ref())?;
//! let (clr_rva, clr_size) = file.clr();
//! println!("CLR header at RVA 0x{:x}, {} bytes", clr_rva, clr_size);
//! # Ok::<(), cilforge::Error>(())
//! ```

pub mod io;
pub mod parser;

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{Error::NotSupported, Result};

/// Backing storage for a loaded image.
///
/// Disk files are memory-mapped; in-memory buffers are taken as-is. Both
/// present the same fully buffered byte slice to the engine, which never
/// performs further I/O during a load.
enum Backend {
    Mapped(Mmap),
    Memory(Vec<u8>),
}

impl Backend {
    fn data(&self) -> &[u8] {
        match self {
            Backend::Mapped(map) => map,
            Backend::Memory(vec) => vec,
        }
    }
}

/// One entry of the PE section table, reduced to the fields needed for
/// RVA translation.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section name, trimmed of trailing NULs (e.g. `.text`)
    pub name: String,
    /// RVA at which the section is mapped
    pub virtual_address: u32,
    /// Size of the section in memory
    pub virtual_size: u32,
    /// File offset of the raw section data
    pub pointer_to_raw_data: u32,
    /// Size of the raw section data in the file
    pub size_of_raw_data: u32,
}

/// A buffered PE image with the envelope information the metadata engine
/// consumes: sections for RVA to file offset mapping and the CLR directory.
pub struct File {
    backend: Backend,
    imagebase: u64,
    sections: Vec<Section>,
    clr_rva: u32,
    clr_size: u32,
}

impl File {
    /// Load a PE image from disk via memory mapping.
    ///
    /// ## Arguments
    /// * 'path' - Path of the image to load
    ///
    /// # Errors
    /// Returns an error for I/O failures, non-PE inputs, or PE images
    /// without a CLR data directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        // Read-only map over a file we never mutate
        let map = unsafe { Mmap::map(&file)? };

        Self::from_backend(Backend::Mapped(map))
    }

    /// Load a PE image from an in-memory buffer.
    ///
    /// ## Arguments
    /// * 'data' - The image bytes, fully buffered
    ///
    /// # Errors
    /// Returns an error for non-PE inputs or PE images without a CLR
    /// data directory.
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_backend(Backend::Memory(data))
    }

    fn from_backend(backend: Backend) -> Result<Self> {
        if backend.data().is_empty() {
            return Err(crate::Error::Empty);
        }

        let pe = goblin::pe::PE::parse(backend.data())?;

        let Some(optional_header) = pe.header.optional_header else {
            return Err(NotSupported);
        };

        let Some(clr_dir) = optional_header
            .data_directories
            .get_clr_runtime_header()
        else {
            return Err(NotSupported);
        };

        if clr_dir.virtual_address == 0 || clr_dir.size == 0 {
            return Err(NotSupported);
        }

        let sections = pe
            .sections
            .iter()
            .map(|section| Section {
                name: String::from_utf8_lossy(&section.name)
                    .trim_end_matches('\0')
                    .to_string(),
                virtual_address: section.virtual_address,
                virtual_size: section.virtual_size,
                pointer_to_raw_data: section.pointer_to_raw_data,
                size_of_raw_data: section.size_of_raw_data,
            })
            .collect();

        let imagebase = optional_header.windows_fields.image_base;
        let (clr_rva, clr_size) = (clr_dir.virtual_address, clr_dir.size);

        Ok(File {
            backend,
            imagebase,
            sections,
            clr_rva,
            clr_size,
        })
    }

    /// The full image bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.backend.data()
    }

    /// The total image size in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.backend.data().len()
    }

    /// Returns true if the image is empty (never the case after a load)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend.data().is_empty()
    }

    /// The preferred image base from the optional header
    #[must_use]
    pub fn imagebase(&self) -> u64 {
        self.imagebase
    }

    /// The parsed section table
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// RVA and size of the CLR (Cor20) data directory
    #[must_use]
    pub fn clr(&self) -> (u32, u32) {
        (self.clr_rva, self.clr_size)
    }

    /// Translate an RVA into a file offset via the section table.
    ///
    /// ## Arguments
    /// * 'rva' - The relative virtual address to translate
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the RVA is not covered by
    /// any section's raw data.
    pub fn rva_to_offset(&self, rva: u32) -> Result<usize> {
        for section in &self.sections {
            let span = section.virtual_size.max(section.size_of_raw_data);
            if rva >= section.virtual_address && rva < section.virtual_address + span {
                let delta = rva - section.virtual_address;
                if delta >= section.size_of_raw_data {
                    return Err(malformed_error!(
                        "RVA 0x{:x} points into uninitialised data of section {}",
                        rva,
                        section.name
                    ));
                }
                return Ok((section.pointer_to_raw_data + delta) as usize);
            }
        }

        Err(malformed_error!(
            "RVA 0x{:x} is not mapped by any section",
            rva
        ))
    }

    /// Borrow `len` bytes starting at the file offset for `rva`.
    ///
    /// # Errors
    /// Returns an error when the RVA is unmapped or the range leaves the file.
    pub fn data_at_rva(&self, rva: u32, len: usize) -> Result<&[u8]> {
        let offset = self.rva_to_offset(rva)?;
        let data = self.backend.data();
        let Some(end) = offset.checked_add(len) else {
            return Err(crate::Error::OutOfBounds);
        };
        if end > data.len() {
            return Err(crate::Error::OutOfBounds);
        }
        Ok(&data[offset..end])
    }

    /// Borrow everything from the file offset for `rva` to the end of its
    /// section's raw data. Used for method bodies, whose length is only known
    /// after the header is decoded.
    ///
    /// # Errors
    /// Returns an error when the RVA is unmapped.
    pub fn data_from_rva(&self, rva: u32) -> Result<&[u8]> {
        for section in &self.sections {
            let span = section.virtual_size.max(section.size_of_raw_data);
            if rva >= section.virtual_address && rva < section.virtual_address + span {
                let delta = rva - section.virtual_address;
                if delta >= section.size_of_raw_data {
                    break;
                }
                let start = (section.pointer_to_raw_data + delta) as usize;
                let end = (section.pointer_to_raw_data + section.size_of_raw_data) as usize;
                let data = self.backend.data();
                if start >= data.len() {
                    return Err(crate::Error::OutOfBounds);
                }
                return Ok(&data[start..end.min(data.len())]);
            }
        }

        Err(malformed_error!(
            "RVA 0x{:x} is not mapped by any section",
            rva
        ))
    }
}
