//! Boundary artifacts: the opaque program blob container and the JSON
//! bundle external tooling consumes.
//!
//! A blob is a length-prefixed byte sequence produced and understood by
//! an external codec; this crate only validates the framing. A bundle
//! carries a program's name, its root triple, and optionally the blob,
//! so callers can identify a program without holding its DAG.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bits::{bytes_to_hex, hex_to_bytes};
use crate::merkle::RootTriple;

/// Framing errors for the blob container.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobError {
    #[error("blob truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("{0} trailing bytes after the framed payload")]
    TrailingBytes(usize),
}

/// A length-prefixed opaque program encoding (4-byte big-endian prefix).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBlob {
    bytes: Vec<u8>,
}

impl ProgramBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.bytes.len());
        out.extend_from_slice(&(self.bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, BlobError> {
        if data.len() < 4 {
            return Err(BlobError::Truncated {
                needed: 4,
                have: data.len(),
            });
        }
        let len = u32::from_be_bytes(data[..4].try_into().expect("4-byte slice")) as usize;
        let payload = &data[4..];
        if payload.len() < len {
            return Err(BlobError::Truncated {
                needed: len,
                have: payload.len(),
            });
        }
        if payload.len() > len {
            return Err(BlobError::TrailingBytes(payload.len() - len));
        }
        Ok(Self {
            bytes: payload.to_vec(),
        })
    }
}

/// Errors while writing or reading a bundle file.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("bundle i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bundle blob field: {0}")]
    BlobHex(String),
}

/// A program's identifying artifact: name, root triple, optional blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBundle {
    pub name: String,
    pub cmr: String,
    pub imr: String,
    pub amr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ProgramBundle {
    pub fn new(name: impl Into<String>, roots: &RootTriple) -> Self {
        Self {
            name: name.into(),
            cmr: roots.cmr.to_hex(),
            imr: roots.imr.to_hex(),
            amr: roots.amr.to_hex(),
            blob: None,
        }
    }

    pub fn with_blob(mut self, blob: &ProgramBlob) -> Self {
        self.blob = Some(bytes_to_hex(&blob.encode()));
        self
    }

    /// Recover the framed blob, if the bundle carries one.
    pub fn decode_blob(&self) -> Result<Option<ProgramBlob>, BundleError> {
        match &self.blob {
            None => Ok(None),
            Some(hex) => {
                let data = hex_to_bytes(hex).map_err(BundleError::BlobHex)?;
                let blob = ProgramBlob::decode(&data)
                    .map_err(|e| BundleError::BlobHex(e.to_string()))?;
                Ok(Some(blob))
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("bundle serializes to JSON")
    }

    pub fn write(&self, path: &Path) -> Result<(), BundleError> {
        fs::write(path, self.to_json() + "\n")?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctx8::reference_roots;

    #[test]
    fn test_blob_round_trip() {
        let blob = ProgramBlob::new(vec![1, 2, 3, 4, 5]);
        let encoded = blob.encode();
        assert_eq!(encoded.len(), 9);
        assert_eq!(ProgramBlob::decode(&encoded).unwrap(), blob);
    }

    #[test]
    fn test_blob_framing_errors() {
        assert_eq!(
            ProgramBlob::decode(&[0, 0]),
            Err(BlobError::Truncated { needed: 4, have: 2 })
        );
        assert_eq!(
            ProgramBlob::decode(&[0, 0, 0, 5, 1, 2]),
            Err(BlobError::Truncated { needed: 5, have: 2 })
        );
        assert_eq!(
            ProgramBlob::decode(&[0, 0, 0, 1, 9, 9]),
            Err(BlobError::TrailingBytes(1))
        );
        assert_eq!(
            ProgramBlob::decode(&[0, 0, 0, 0]),
            Ok(ProgramBlob::new(Vec::new()))
        );
    }

    #[test]
    fn test_bundle_json_round_trip() {
        let bundle = ProgramBundle::new("ctx8-reference", &reference_roots())
            .with_blob(&ProgramBlob::new(vec![0xaa, 0xbb]));
        let parsed: ProgramBundle = serde_json::from_str(&bundle.to_json()).unwrap();
        assert_eq!(parsed, bundle);
        assert_eq!(
            parsed.decode_blob().unwrap().unwrap().bytes(),
            &[0xaa, 0xbb]
        );
    }

    #[test]
    fn test_bundle_without_blob_omits_field() {
        let bundle = ProgramBundle::new("ctx8-reference", &reference_roots());
        assert!(!bundle.to_json().contains("blob"));
        assert_eq!(bundle.decode_blob().unwrap(), None);
    }
}
