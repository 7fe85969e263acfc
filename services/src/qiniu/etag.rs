//! Qiniu content hash ("etag").
//!
//! Content is split into 4 MiB blocks. A single block hashes to
//! `0x16 || sha1(block)`; several blocks hash to
//! `0x96 || sha1(sha1(b0) || sha1(b1) || ...)`. The 21 bytes are URL-safe
//! base64 encoded.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use sha1::{Digest, Sha1};
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

const SINGLE_BLOCK_PREFIX: u8 = 0x16;
const MULTI_BLOCK_PREFIX: u8 = 0x96;

pub fn etag_of_bytes(data: &[u8]) -> String {
    let blocks: Vec<[u8; 20]> = if data.is_empty() {
        vec![block_sha1(data)]
    } else {
        data.chunks(BLOCK_SIZE).map(block_sha1).collect()
    };
    encode(&blocks)
}

pub async fn etag_of_file(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut blocks = Vec::new();

    loop {
        let filled = fill_block(&mut file, &mut buf).await?;
        if filled == 0 && !blocks.is_empty() {
            break;
        }
        blocks.push(block_sha1(&buf[..filled]));
        if filled < BLOCK_SIZE {
            break;
        }
    }
    Ok(encode(&blocks))
}

/// Reads until `buf` is full or the file ends; returns the byte count.
async fn fill_block(file: &mut tokio::fs::File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn block_sha1(block: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&Sha1::digest(block));
    out
}

fn encode(blocks: &[[u8; 20]]) -> String {
    let mut out = Vec::with_capacity(21);
    if let [single] = blocks {
        out.push(SINGLE_BLOCK_PREFIX);
        out.extend_from_slice(single);
    } else {
        out.push(MULTI_BLOCK_PREFIX);
        let mut hasher = Sha1::new();
        for block in blocks {
            hasher.update(block);
        }
        out.extend_from_slice(&hasher.finalize());
    }
    URL_SAFE.encode(out)
}
