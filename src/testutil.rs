//! Fixture helpers shared by the unit tests

use std::io::Write;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use xz2::write::XzEncoder;

use crate::firmware::{FirmwareImage, Page};

/// Compresses a firmware document the same way firmware files are produced
pub fn compress(document: &Value) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);

    encoder.write_all(document.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Stand-in for the digest a device computes over a page
pub fn digest(page_number: u32, nonce: &[u8], data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();

    hasher.update(page_number.to_le_bytes());
    hasher.update(nonce);
    hasher.update(data);
    hasher.finalize()[..16].to_vec()
}

/// Builds an application image for chip "TESTCHIP" on board ("TESTBOARD", 1)
pub fn image(pages: &[(u32, Vec<u8>)]) -> FirmwareImage {
    let pages = pages
        .iter()
        .map(|(page_number, data)| {
            let nonce = page_number.to_be_bytes().to_vec();

            Page {
                page_number: *page_number,
                digest: digest(*page_number, &nonce, data),
                nonce,
                data: data.clone(),
            }
        })
        .collect();

    FirmwareImage {
        chip: "TESTCHIP".to_string(),
        board: vec![(1, "TESTBOARD".to_string())],
        build_info: Some("1.0.0-test".to_string()),
        build_date: Some("2020-11-21T12:00:00".to_string()),
        is_application: true,
        is_bootloader: false,
        pages,
    }
}

/// Encodes an image into a compressed firmware container
pub fn encode(image: &FirmwareImage) -> Vec<u8> {
    let data: Vec<Value> = image
        .pages
        .iter()
        .map(|page| {
            json!([
                page.page_number,
                hex::encode(&page.nonce),
                hex::encode(&page.data),
                hex::encode(&page.digest),
            ])
        })
        .collect();

    compress(&json!({
        "chip": image.chip,
        "board": image.board,
        "build_info": image.build_info,
        "build_date": image.build_date,
        "application": image.is_application,
        "bootloader": image.is_bootloader,
        "data": data,
    }))
}
