//! Reading assembled executables back.
//!
//! Mirrors what a launcher stub does at startup: find the trailer from the
//! end of the file, then read the payload region it describes.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::format::{Trailer, MIN_TRAILER_SIZE, TRAILER_LENGTH_FIELD};
use crate::transform::for_encoding;
use crate::{PackError, Result};

/// Read and validate the trailer of an assembled executable.
pub fn read_trailer(path: impl AsRef<Path>) -> Result<Trailer> {
    let mut file = File::open(path.as_ref())?;
    read_trailer_from(&mut file)
}

/// Read the trailer from any seekable reader positioned anywhere.
pub fn read_trailer_from<R: Read + Seek>(reader: &mut R) -> Result<Trailer> {
    let file_size = reader.seek(SeekFrom::End(0))?;
    if file_size < MIN_TRAILER_SIZE as u64 {
        return Err(PackError::MalformedTrailer(
            "file too small to contain trailer".to_string(),
        ));
    }

    reader.seek(SeekFrom::End(-(TRAILER_LENGTH_FIELD as i64)))?;
    let mut tail = [0u8; TRAILER_LENGTH_FIELD];
    reader.read_exact(&mut tail)?;
    let trailer_len = Trailer::length_from_tail(tail);

    if trailer_len < MIN_TRAILER_SIZE || trailer_len as u64 > file_size {
        return Err(PackError::MalformedTrailer(format!(
            "trailer length {} out of range for a {}-byte file",
            trailer_len, file_size
        )));
    }

    reader.seek(SeekFrom::End(-(trailer_len as i64)))?;
    let mut trailer_bytes = vec![0u8; trailer_len];
    reader.read_exact(&mut trailer_bytes)?;

    let trailer = Trailer::from_bytes(&trailer_bytes)?;
    trailer.check_file_length(file_size)?;
    Ok(trailer)
}

/// Read the payload region exactly as embedded.
pub fn read_payload(path: impl AsRef<Path>) -> Result<(Trailer, Vec<u8>)> {
    let mut file = File::open(path.as_ref())?;
    let trailer = read_trailer_from(&mut file)?;

    file.seek(SeekFrom::Start(trailer.jar_offset()))?;
    let mut payload = vec![0u8; trailer.jar_length() as usize];
    file.read_exact(&mut payload)?;

    Ok((trailer, payload))
}

/// Recover the original JAR bytes, undoing any payload transform.
pub fn extract_jar(path: impl AsRef<Path>) -> Result<(Trailer, Vec<u8>)> {
    let (trailer, payload) = read_payload(path)?;
    let jar = for_encoding(trailer.payload_encoding()).decompress(&payload)?;
    Ok((trailer, jar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FORMAT_VERSION;
    use std::fs;
    use std::io::Cursor;

    fn write_exe(dir: &Path, stub: &[u8], payload: &[u8], version: u32) -> std::path::PathBuf {
        let trailer =
            Trailer::new(version, stub.len() as u64, payload.len() as u64, "a.Main").unwrap();
        let mut bytes = stub.to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&trailer.to_bytes());
        let path = dir.join("exe");
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_read_trailer_and_payload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_exe(temp_dir.path(), b"stubstub", b"PK-payload", FORMAT_VERSION);

        let trailer = read_trailer(&path).unwrap();
        assert_eq!(trailer.stub_length(), 8);
        assert_eq!(trailer.jar_length(), 10);
        assert_eq!(trailer.entry_point(), "a.Main");

        let (_, payload) = read_payload(&path).unwrap();
        assert_eq!(payload, b"PK-payload");
    }

    #[test]
    fn test_extract_zstd_payload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let raw = b"jar bytes jar bytes jar bytes".repeat(20);
        let packed = zstd::bulk::compress(&raw, 3).unwrap();
        let path = write_exe(
            temp_dir.path(),
            b"stub",
            &packed,
            crate::format::FORMAT_VERSION_ZSTD,
        );

        let (trailer, jar) = extract_jar(&path).unwrap();
        assert_eq!(trailer.jar_length(), packed.len() as u64);
        assert_eq!(jar, raw);
    }

    #[test]
    fn test_extract_launch_trailer() {
        use crate::format::{LaunchMetadata, PayloadEncoding};

        let temp_dir = tempfile::tempdir().unwrap();
        let raw = b"jar bytes".repeat(30);
        let packed = zstd::bulk::compress(&raw, 3).unwrap();
        let launch = LaunchMetadata {
            min_java_version: 17,
            preferred_java_version: 21,
            ..Default::default()
        };
        let trailer =
            Trailer::with_launch(PayloadEncoding::Zstd, 4, packed.len() as u64, "a.Main", launch)
                .unwrap();
        let mut bytes = b"stub".to_vec();
        bytes.extend_from_slice(&packed);
        bytes.extend_from_slice(&trailer.to_bytes());
        let path = temp_dir.path().join("exe");
        fs::write(&path, bytes).unwrap();

        let (found, jar) = extract_jar(&path).unwrap();
        assert_eq!(found.launch().unwrap().min_java_version, 17);
        assert_eq!(jar, raw);
    }

    #[test]
    fn test_plain_binary_rejected() {
        let mut not_packed = Cursor::new(vec![0x7Fu8; 4096]);
        assert!(matches!(
            read_trailer_from(&mut not_packed),
            Err(PackError::MalformedTrailer(_))
        ));

        let mut tiny = Cursor::new(b"ELF".to_vec());
        assert!(matches!(
            read_trailer_from(&mut tiny),
            Err(PackError::MalformedTrailer(_))
        ));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = write_exe(temp_dir.path(), b"stubstub", b"payload", FORMAT_VERSION);

        // Drop a byte from the front: trailer still parses but lengths no longer add up
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[1..]).unwrap();
        assert!(matches!(
            read_trailer(&path),
            Err(PackError::MalformedTrailer(_))
        ));
    }
}
