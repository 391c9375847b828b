//! Metadata root header and stream directory.
//!
//! The metadata root (ECMA-335 II.24.2.1) is the entry point for reading CLI
//! metadata: it carries the version string and the directory of streams
//! (`#~`, `#Strings`, `#US`, `#GUID`, `#Blob`) with their offsets relative to
//! the root. [`Root`] parses that directory; [`Root::write`] emits it for the
//! build pipeline.

use crate::{
    file::io::{read_le, read_le_at},
    Error::OutOfBounds,
    Result,
};

/// The MAGIC value introducing the metadata root: `BSJB`
pub const METADATA_MAGIC: u32 = 0x424A_5342;

/// One entry of the stream directory inside the metadata root.
#[derive(Debug, Clone)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Stream name, one of `#~`, `#-`, `#Strings`, `#US`, `#GUID`, `#Blob`
    pub name: String,
}

impl StreamHeader {
    /// Parse one stream header from a byte slice.
    ///
    /// # Errors
    /// Returns an error when the data is truncated or the name is not one of
    /// the five streams ECMA-335 defines (plus the uncompressed `#-` form).
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let offset = read_le::<u32>(data)?;
        let size = read_le::<u32>(&data[4..])?;

        let name_bytes = &data[8..];
        let end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(OutOfBounds)?;
        let name = std::str::from_utf8(&name_bytes[..end])
            .map_err(|_| malformed_error!("Stream name is not valid UTF-8"))?
            .to_string();

        match name.as_str() {
            "#~" | "#-" | "#Strings" | "#US" | "#GUID" | "#Blob" => {}
            _ => return Err(malformed_error!("Unknown stream name - '{}'", name)),
        }

        Ok(StreamHeader { offset, size, name })
    }

    /// The serialised size of this header: 8 bytes plus the name padded to 4.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        8 + (((self.name.len() + 1) + 3) & !3)
    }
}

/// The header of the present metadata, with the stream directory resolved.
///
/// This is the first structure parsed when reading metadata out of a PE file,
/// and the last one emitted when writing: stream offsets are only known after
/// every stream's bytes are final.
#[derive(Debug)]
pub struct Root {
    /// Magic signature for physical metadata: 0x424A5342
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Always 0
    pub reserved: u32,
    /// Version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags, always 0
    pub flags: u16,
    /// Stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Reads a [`Root`] metadata header from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice positioned at the metadata root
    ///
    /// # Errors
    /// Returns an error if the data is too short, the signature is wrong, or
    /// the stream directory is malformed (bad names, duplicates, ranges
    /// leaving the metadata).
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != METADATA_MAGIC {
            return Err(malformed_error!(
                "Metadata magic does not match - 0x{:08X}",
                signature
            ));
        }

        let version_length = read_le::<u32>(&data[12..])? as usize;
        if version_length > 255 || 16 + version_length > data.len() {
            return Err(malformed_error!(
                "Version string length {} is invalid",
                version_length
            ));
        }

        // The stored length includes padding; the string ends at the first NUL
        let version_bytes = &data[16..16 + version_length];
        let version_end = version_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(version_length);
        let version = std::str::from_utf8(&version_bytes[..version_end])
            .map_err(|_| malformed_error!("Version string is not valid UTF-8"))?
            .to_string();

        let mut cursor = 16 + version_length;
        let flags = read_le_at::<u16>(data, &mut cursor)?;
        let stream_count = read_le_at::<u16>(data, &mut cursor)?;
        if stream_count == 0 || stream_count > 6 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if cursor > data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[cursor..])?;
            match u32::checked_add(header.offset, header.size) {
                Some(end) if (end as usize) <= data.len() => {}
                _ => {
                    return Err(malformed_error!(
                        "Stream '{}' leaves the metadata ({} + {})",
                        header.name,
                        header.offset,
                        header.size
                    ))
                }
            }

            if stream_headers
                .iter()
                .any(|existing: &StreamHeader| existing.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream name - '{}'", header.name));
            }

            cursor += header.byte_size();
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// Find a stream by name
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }

    /// Serialise the root and its stream directory.
    ///
    /// Stream offsets in `stream_headers` must already be final: the root
    /// does not move streams, it only describes them.
    #[must_use]
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.signature.to_le_bytes());
        out.extend_from_slice(&self.major_version.to_le_bytes());
        out.extend_from_slice(&self.minor_version.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());

        // Version string, NUL terminated, padded to a 4 byte boundary
        let padded = (self.version.len() + 1 + 3) & !3;
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(padded as u32).to_le_bytes());
        out.extend_from_slice(self.version.as_bytes());
        out.resize(out.len() + (padded - self.version.len()), 0);

        out.extend_from_slice(&self.flags.to_le_bytes());
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.stream_headers.len() as u16).to_le_bytes());

        for header in &self.stream_headers {
            out.extend_from_slice(&header.offset.to_le_bytes());
            out.extend_from_slice(&header.size.to_le_bytes());
            out.extend_from_slice(header.name.as_bytes());
            let name_padded = ((header.name.len() + 1) + 3) & !3;
            out.resize(out.len() + (name_padded - header.name.len()), 0);
        }

        out
    }

    /// Size of the serialised root in bytes, for layout planning.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let version_padded = (self.version.len() + 1 + 3) & !3;
        let headers: usize = self.stream_headers.iter().map(StreamHeader::byte_size).sum();
        16 + version_padded + 4 + headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x42, 0x53, 0x4A, 0x42, // BSJB
            0x01, 0x00,             // major = 1
            0x01, 0x00,             // minor = 1
            0x00, 0x00, 0x00, 0x00, // reserved
            0x08, 0x00, 0x00, 0x00, // version length (padded) = 8
            b'v', b'4', b'.', b'0', b'.', b'0', 0x00, 0x00,
            0x00, 0x00,             // flags
            0x01, 0x00,             // one stream

            0x20, 0x00, 0x00, 0x00, // offset 0x20
            0x08, 0x00, 0x00, 0x00, // size 8
            0x23, 0x7E, 0x00, 0x00, // "#~\0" + pad
            // stream data so offset+size stays in range
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let root = Root::read(&header_bytes).unwrap();
        assert_eq!(root.signature, METADATA_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.minor_version, 1);
        assert_eq!(root.version, "v4.0.0");
        assert_eq!(root.stream_headers.len(), 1);
        assert_eq!(root.stream_headers[0].name, "#~");
        assert_eq!(root.stream_headers[0].offset, 0x20);
        assert_eq!(root.stream_headers[0].size, 8);
        assert!(root.stream("#~").is_some());
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn write_read_round_trip() {
        let root = Root {
            signature: METADATA_MAGIC,
            major_version: 1,
            minor_version: 1,
            reserved: 0,
            version: "v2.0.50727".to_string(),
            flags: 0,
            stream_headers: vec![
                StreamHeader {
                    offset: 0x6C,
                    size: 4,
                    name: "#~".to_string(),
                },
                StreamHeader {
                    offset: 0x70,
                    size: 4,
                    name: "#Strings".to_string(),
                },
            ],
        };

        let mut bytes = root.write();
        assert_eq!(bytes.len(), root.byte_size());
        bytes.resize(0x74, 0); // back the declared stream ranges with data

        let reread = Root::read(&bytes).unwrap();
        assert_eq!(reread.version, "v2.0.50727");
        assert_eq!(reread.stream_headers.len(), 2);
        assert_eq!(reread.stream("#Strings").unwrap().offset, 0x70);
    }

    #[test]
    fn duplicate_stream_names_should_fail() {
        #[rustfmt::skip]
        let mut header_bytes = vec![
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00,
            0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            b'v', b'4', b'.', b'0', b'.', b'0', 0x00, 0x00,
            0x00, 0x00,
            0x02, 0x00,

            0x40, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,

            0x44, 0x00, 0x00, 0x00,
            0x04, 0x00, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,
        ];
        header_bytes.resize(0x48, 0);

        let result = Root::read(&header_bytes);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate stream name"));
    }
}
