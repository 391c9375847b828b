//! The load pipeline root: a PE image with its CLI metadata parsed.
//!
//! [`CilImage`] owns the image bytes and drives the read sequence: PE
//! envelope, Cor20 header, metadata root, heap views, and the eagerly
//! materialised table rows. Loading is transactional — any failure discards
//! the whole image. Heap values resolve lazily through the stream views;
//! the linked object model comes from [`CilImage::resolve`].

use std::path::Path;

use crate::{
    file::File,
    metadata::{
        cor20::Cor20Header,
        method::MethodBody,
        resolver::{self, ObjectModel},
        root::Root,
        streams::{Blob, Guid, Strings, UserStrings},
        tables::{ParsedTables, TableInfoRef, TableSet},
        token::Token,
    },
    Result,
};

/// Reserved single-NUL heap used when a stream is absent from the image
const EMPTY_HEAP: &[u8] = &[0];

/// A loaded PE/CLI image: envelope, streams and materialised table rows.
///
/// # Example
///
/// ```rust,no_run
/// use cilforge::CilImage;
///
/// let image = CilImage::from_file("library.dll".as_ref())?;
/// println!("metadata version {}", image.version());
/// println!("{} TypeDef rows", image.tables().type_def.len());
/// # Ok::<(), cilforge::Error>(())
/// ```
pub struct CilImage {
    file: File,
    cor20: Cor20Header,
    root: Root,
    /// Absolute file offset of the metadata root
    metadata_offset: usize,
    strings_range: Option<(usize, usize)>,
    user_strings_range: Option<(usize, usize)>,
    blob_range: Option<(usize, usize)>,
    guid_range: Option<(usize, usize)>,
    parsed: ParsedTables,
}

impl CilImage {
    /// Load an image from disk.
    ///
    /// # Errors
    /// Fails for I/O errors, non-CLI images and malformed metadata; the
    /// whole load is discarded on any error.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_pe(File::from_file(path)?)
    }

    /// Load an image from a fully buffered byte vector.
    ///
    /// # Errors
    /// Same failure modes as [`CilImage::from_file`]
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_pe(File::from_mem(data)?)
    }

    fn from_pe(file: File) -> Result<Self> {
        let (clr_rva, clr_size) = file.clr();
        let cor20 = Cor20Header::read(file.data_at_rva(clr_rva, clr_size as usize)?)?;

        let metadata_offset = file.rva_to_offset(cor20.meta_data_rva)?;
        let metadata =
            file.data_at_rva(cor20.meta_data_rva, cor20.meta_data_size as usize)?;
        let root = Root::read(metadata)?;

        let stream_range = |name: &str| -> Option<(usize, usize)> {
            root.stream(name).map(|header| {
                (
                    metadata_offset + header.offset as usize,
                    header.size as usize,
                )
            })
        };

        let strings_range = stream_range("#Strings");
        let user_strings_range = stream_range("#US");
        let blob_range = stream_range("#Blob");
        let guid_range = stream_range("#GUID");

        let tables_header = root
            .stream("#~")
            .or_else(|| root.stream("#-"))
            .ok_or_else(|| malformed_error!("Image carries no table stream"))?;
        let tables_data = &metadata[tables_header.offset as usize
            ..tables_header.offset as usize + tables_header.size as usize];
        let parsed = TableSet::parse(tables_data)?;

        Ok(CilImage {
            file,
            cor20,
            root,
            metadata_offset,
            strings_range,
            user_strings_range,
            blob_range,
            guid_range,
            parsed,
        })
    }

    fn stream_slice(&self, range: Option<(usize, usize)>) -> &[u8] {
        match range {
            Some((offset, size)) => &self.file.data()[offset..offset + size],
            None => EMPTY_HEAP,
        }
    }

    /// The `#Strings` heap view
    ///
    /// # Errors
    /// Fails when the heap bytes are malformed
    pub fn strings(&self) -> Result<Strings<'_>> {
        Strings::from(self.stream_slice(self.strings_range))
    }

    /// The `#US` heap view
    ///
    /// # Errors
    /// Fails when the heap bytes are malformed
    pub fn user_strings(&self) -> Result<UserStrings<'_>> {
        UserStrings::from(self.stream_slice(self.user_strings_range))
    }

    /// The `#Blob` heap view
    ///
    /// # Errors
    /// Fails when the heap bytes are malformed
    pub fn blobs(&self) -> Result<Blob<'_>> {
        Blob::from(self.stream_slice(self.blob_range))
    }

    /// The `#GUID` heap view
    ///
    /// # Errors
    /// Fails when the heap bytes are malformed
    pub fn guids(&self) -> Result<Guid<'_>> {
        match self.guid_range {
            Some(range) => Guid::from(self.stream_slice(Some(range))),
            None => Guid::from(&[]),
        }
    }

    /// The materialised metadata tables
    #[must_use]
    pub fn tables(&self) -> &TableSet {
        &self.parsed.tables
    }

    /// Index sizing of the loaded image, frozen at header parse time
    #[must_use]
    pub fn table_info(&self) -> &TableInfoRef {
        &self.parsed.info
    }

    /// The Cor20 (CLI) header
    #[must_use]
    pub fn cor20(&self) -> &Cor20Header {
        &self.cor20
    }

    /// The metadata root directory
    #[must_use]
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// The metadata version string, e.g. `v4.0.30319`
    #[must_use]
    pub fn version(&self) -> &str {
        &self.root.version
    }

    /// The entry point token, when the image declares one
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        if self.cor20.entry_point_token == 0 {
            None
        } else {
            Some(Token::new(self.cor20.entry_point_token))
        }
    }

    /// The PE envelope of this image
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Bytes from a method body RVA to the end of its section
    ///
    /// # Errors
    /// Fails when the RVA is not mapped by any section
    pub fn body_slice(&self, rva: u32) -> Result<&[u8]> {
        self.file.data_from_rva(rva)
    }

    /// Parse the method body at an RVA
    ///
    /// # Errors
    /// Fails when the RVA is unmapped or the body header is malformed
    pub fn method_body(&self, rva: u32) -> Result<MethodBody> {
        MethodBody::parse(self.body_slice(rva)?)
    }

    /// Run the resolution pass: every stored index becomes a direct
    /// reference in the returned [`ObjectModel`], and every method body is
    /// decoded into instructions.
    ///
    /// # Errors
    /// Fails on out-of-range indexes, malformed signatures, or undecodable
    /// method bodies
    pub fn resolve(&self) -> Result<ObjectModel> {
        resolver::resolve(self)
    }
}
