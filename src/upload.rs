//! The Upload-Decoder component: unwraps a JSON envelope of
//! base64+zlib-compressed report files, drives the XML-Parser over each,
//! and emits a packed binary stream plus a concatenated readable
//! transcript.

use std::io::Read;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use serde::Deserialize;

use crate::error::Error;
use crate::junit;
use crate::model::ParsingInfo;

const EXPECTED_FORMAT: &str = "base64+compressed";

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    network: Vec<String>,
    test_results_files: Vec<ReportFileEntry>,
}

#[derive(Debug, Deserialize)]
struct ReportFileEntry {
    filename: String,
    format: String,
    data: String,
}

/// Decodes one raw upload envelope into `(packed_bytes, readable_bytes)`.
///
/// The first file to fail aborts the whole upload: neither output is
/// partially emitted.
pub fn parse_raw_upload(bytes: &[u8]) -> Result<(Vec<u8>, Vec<u8>), Error> {
    let envelope: UploadEnvelope =
        serde_json::from_slice(bytes).map_err(|e| Error::InvalidEnvelope(e.to_string()))?;

    let mut infos = Vec::with_capacity(envelope.test_results_files.len());
    let mut readable = Vec::new();

    for entry in envelope.test_results_files {
        if entry.format != EXPECTED_FORMAT {
            tracing::warn!(file = %entry.filename, format = %entry.format, "unsupported upload format");
            return Err(Error::InvalidEnvelope(format!(
                "unsupported format `{}` for file `{}`",
                entry.format, entry.filename
            )));
        }

        let decompressed = decode_entry(&entry).inspect_err(|e| {
            tracing::warn!(file = %entry.filename, error = %e, "failed to decode report file");
        })?;

        let info = junit::parse(&decompressed)
            .inspect_err(|e| {
                tracing::warn!(file = %entry.filename, error = %e, "failed to parse report file");
            })
            .map_err(|source| Error::Parser {
                file: entry.filename.clone(),
                source,
            })?;
        infos.push(info);

        readable.extend_from_slice(format!("# path={}\n", entry.filename).as_bytes());
        readable.extend_from_slice(&decompressed);
        readable.extend_from_slice(b"\n<<<<<< EOF\n");
    }

    tracing::info!(files = infos.len(), "decoded raw upload");

    let packed = rmp_serde::to_vec_named(&infos)
        .map_err(|e| Error::InvalidEnvelope(format!("failed to pack parsed results: {e}")))?;

    Ok((packed, readable))
}

fn decode_entry(entry: &ReportFileEntry) -> Result<Vec<u8>, Error> {
    let compressed = BASE64.decode(&entry.data).map_err(|e| Error::DecodeFailure {
        file: entry.filename.clone(),
        reason: format!("base64: {e}"),
    })?;

    let mut decompressed = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut decompressed)
        .map_err(|e| Error::DecodeFailure {
            file: entry.filename.clone(),
            reason: format!("zlib: {e}"),
        })?;

    Ok(decompressed)
}

/// Decodes `packed_bytes` back into the sequence of [`ParsingInfo`] that
/// produced it. Used by tests and by hosts that want to inspect the packed
/// stream directly rather than persist it opaquely.
pub fn unpack(bytes: &[u8]) -> Result<Vec<ParsingInfo>, Error> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::InvalidEnvelope(format!("failed to unpack parsed results: {e}")))
}
