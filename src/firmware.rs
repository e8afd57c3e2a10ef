//! Firmware container decoding
//!
//! A firmware file is an LZMA compressed UTF-8 JSON document:
//!
//! ```text
//! {
//!   "chip": "ATxmega256A3U",
//!   "board": [[revision, "board name"], ...],
//!   "build_info": "...",            (optional)
//!   "build_date": "...",            (optional)
//!   "application": true,            (optional, default false)
//!   "bootloader": false,            (optional, default false)
//!   "data": [[page_number, "nonce hex", "data hex", "digest hex"], ...]
//! }
//! ```

use std::io::Read;

use serde::Deserialize;
use xz2::read::XzDecoder;
use xz2::stream::Stream;

use crate::error::ImageError;

/// A single flash page to program
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Page {
    pub page_number: u32,
    pub nonce: Vec<u8>,
    /// The exact bytes to write
    pub data: Vec<u8>,
    /// Device computed digest of the page, passed through to the device untouched
    pub digest: Vec<u8>,
}

/// A decoded firmware image
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FirmwareImage {
    /// The chip model the firmware was built for
    pub chip: String,
    /// Supported boards as `(revision, board_name)` pairs.
    ///
    /// Note that this is the reverse of the `(board_name, revision)` order a device reports.
    pub board: Vec<(u32, String)>,
    pub build_info: Option<String>,
    pub build_date: Option<String>,
    pub is_application: bool,
    pub is_bootloader: bool,
    /// Pages in the order they appear in the container, which is the order they are written in
    pub pages: Vec<Page>,
}

/// The firmware document as it appears on the wire
#[derive(Deserialize)]
struct RawImage {
    chip: String,
    board: Vec<(u32, String)>,
    #[serde(default)]
    build_info: Option<String>,
    #[serde(default)]
    build_date: Option<String>,
    #[serde(default)]
    application: bool,
    #[serde(default)]
    bootloader: bool,
    data: Vec<(u32, String, String, String)>,
}

fn decode_hex(page: u32, field: &'static str, value: &str) -> Result<Vec<u8>, ImageError> {
    hex::decode(value).map_err(|source| ImageError::Hex {
        page,
        field,
        source,
    })
}

impl FirmwareImage {
    /// Decodes a firmware image from a compressed stream.
    ///
    /// Both the `.xz` container and the legacy `.lzma` container are accepted.
    pub fn from_reader<R: Read>(reader: R) -> Result<FirmwareImage, ImageError> {
        let stream = Stream::new_auto_decoder(u64::max_value(), 0)?;
        let mut decoder = XzDecoder::new_stream(reader, stream);
        let mut buf = Vec::new();

        decoder.read_to_end(&mut buf)?;

        let document = String::from_utf8(buf)?;

        FirmwareImage::from_json(&document)
    }

    /// Decodes a firmware image from an in-memory compressed buffer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use asphodel_flash::FirmwareImage;
    ///
    /// let bytes = std::fs::read("device.firmware").unwrap();
    /// let image = FirmwareImage::from_bytes(&bytes)?;
    ///
    /// println!("{} pages for {}", image.pages.len(), image.chip);
    /// # Ok::<(), asphodel_flash::ImageError>(())
    /// ```
    pub fn from_bytes(bytes: &[u8]) -> Result<FirmwareImage, ImageError> {
        FirmwareImage::from_reader(bytes)
    }

    fn from_json(document: &str) -> Result<FirmwareImage, ImageError> {
        let raw: RawImage = serde_json::from_str(document)?;
        let mut pages = Vec::with_capacity(raw.data.len());

        for (page_number, nonce, data, digest) in raw.data {
            pages.push(Page {
                page_number,
                nonce: decode_hex(page_number, "nonce", &nonce)?,
                data: decode_hex(page_number, "data", &data)?,
                digest: decode_hex(page_number, "digest", &digest)?,
            });
        }

        Ok(FirmwareImage {
            chip: raw.chip,
            board: raw.board,
            build_info: raw.build_info,
            build_date: raw.build_date,
            is_application: raw.application,
            is_bootloader: raw.bootloader,
            pages,
        })
    }

    /// Sum of the data lengths of every page
    pub fn data_len(&self) -> u64 {
        self.pages.iter().map(|page| page.data.len() as u64).sum()
    }

    /// Whether the image contains an application and nothing else
    pub fn is_application_only(&self) -> bool {
        self.is_application && !self.is_bootloader
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_hex::assert_eq_hex;
    use hex_literal::hex;
    use serde_json::json;
    use xz2::stream::LzmaOptions;
    use xz2::write::XzEncoder;

    use super::*;
    use crate::testutil;

    #[test]
    fn it_should_decode_firmware() {
        let bytes = testutil::compress(&json!({
            "chip": "ATxmega256A3U",
            "board": [[2, "WMRTCP"], [3, "WMRTCP"]],
            "build_info": "1.2.3-abcdef",
            "build_date": "2020-01-02T03:04:05",
            "application": true,
            "data": [
                [7, "00112233", "deadbeef", "a0a1a2a3"],
                [6, "", "cafe", "ff"],
            ],
        }));

        let image = FirmwareImage::from_bytes(&bytes).unwrap();

        assert_eq!(image.chip, "ATxmega256A3U");
        assert_eq!(
            image.board,
            vec![(2, "WMRTCP".to_string()), (3, "WMRTCP".to_string())]
        );
        assert_eq!(image.build_info.as_deref(), Some("1.2.3-abcdef"));
        assert_eq!(image.build_date.as_deref(), Some("2020-01-02T03:04:05"));
        assert!(image.is_application);
        assert!(!image.is_bootloader);
        assert_eq!(image.pages.len(), 2);

        // Pages keep their container order rather than being sorted by number
        assert_eq!(image.pages[0].page_number, 7);
        assert_eq!(image.pages[1].page_number, 6);
        assert_eq_hex!(image.pages[0].nonce, hex!("00112233").to_vec());
        assert_eq_hex!(image.pages[0].data, hex!("deadbeef").to_vec());
        assert_eq_hex!(image.pages[0].digest, hex!("a0a1a2a3").to_vec());
        assert!(image.pages[1].nonce.is_empty());
        assert_eq!(image.data_len(), 6);
    }

    #[test]
    fn it_should_default_optional_fields() {
        let bytes = testutil::compress(&json!({
            "chip": "EFM32",
            "board": [],
            "data": [],
        }));

        let image = FirmwareImage::from_bytes(&bytes).unwrap();

        assert_eq!(image.build_info, None);
        assert_eq!(image.build_date, None);
        assert!(!image.is_application);
        assert!(!image.is_bootloader);
        assert!(image.pages.is_empty());
    }

    #[test]
    fn it_should_round_trip_a_fixture_image() {
        let image = testutil::image(&[(0, vec![0x11; 80]), (1, vec![0x22; 80])]);
        let bytes = testutil::encode(&image);

        assert_eq!(FirmwareImage::from_bytes(&bytes).unwrap(), image);
    }

    #[test]
    fn it_should_decode_from_a_stream() {
        let image = testutil::image(&[(3, vec![1, 2, 3])]);
        let bytes = testutil::encode(&image);

        let decoded = FirmwareImage::from_reader(std::io::Cursor::new(bytes)).unwrap();

        assert_eq!(decoded, image);
    }

    #[test]
    fn it_should_decode_legacy_lzma_containers() {
        let document = json!({
            "chip": "ATxmega32A4U",
            "board": [[1, "TESTBOARD"]],
            "data": [[0, "", "0102", "03"]],
        });

        let options = LzmaOptions::new_preset(6).unwrap();
        let stream = Stream::new_lzma_encoder(&options).unwrap();
        let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(document.to_string().as_bytes()).unwrap();
        let bytes = encoder.finish().unwrap();

        let image = FirmwareImage::from_bytes(&bytes).unwrap();

        assert_eq!(image.chip, "ATxmega32A4U");
        assert_eq_hex!(image.pages[0].data, vec![0x01, 0x02]);
    }

    #[test]
    fn it_should_reject_uncompressed_input() {
        let document = br#"{"chip": "x", "board": [], "data": []}"#;

        assert!(matches!(
            FirmwareImage::from_bytes(document),
            Err(ImageError::Io(_))
        ));
    }

    #[test]
    fn it_should_reject_missing_fields() {
        let bytes = testutil::compress(&json!({ "chip": "x", "board": [] }));

        assert!(matches!(
            FirmwareImage::from_bytes(&bytes),
            Err(ImageError::Json(_))
        ));
    }

    #[test]
    fn it_should_reject_malformed_hex() {
        let bytes = testutil::compress(&json!({
            "chip": "x",
            "board": [],
            "data": [[4, "00", "abc", "00"]],
        }));

        match FirmwareImage::from_bytes(&bytes) {
            Err(ImageError::Hex { page, field, .. }) => {
                assert_eq!(page, 4);
                assert_eq!(field, "data");
            }
            other => panic!("expected a hex error, got {:?}", other),
        }
    }

    #[test]
    fn it_should_reject_malformed_page_entries() {
        let bytes = testutil::compress(&json!({
            "chip": "x",
            "board": [],
            "data": [[4, "00", "00"]],
        }));

        assert!(matches!(
            FirmwareImage::from_bytes(&bytes),
            Err(ImageError::Json(_))
        ));
    }

    #[test]
    fn it_should_reject_non_utf8_contents() {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(&[0xff, 0xfe, 0xfd]).unwrap();
        let bytes = encoder.finish().unwrap();

        assert!(matches!(
            FirmwareImage::from_bytes(&bytes),
            Err(ImageError::Utf8(_))
        ));
    }
}
