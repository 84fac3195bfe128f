//! Sound clip asset
//!
//! Holds the encoded file bytes; decoding is left to the playback backend.

use crate::assets::{Asset, AssetError};

/// Encoded audio data loaded through the asset server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundClip {
    data: Vec<u8>,
    format: AudioFormat,
}

/// Container formats recognised by their magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// RIFF/WAVE
    Wav,
    /// Ogg Vorbis
    Ogg,
    /// MPEG layer 3
    Mp3,
    /// FLAC
    Flac,
}

impl AudioFormat {
    /// Detect the format from the leading bytes
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes.get(..4)? {
            b"RIFF" => Some(Self::Wav),
            b"OggS" => Some(Self::Ogg),
            b"fLaC" => Some(Self::Flac),
            // ID3 tag or a bare frame sync
            [b'I', b'D', b'3', _] | [0xFF, 0xFB | 0xFA | 0xF3 | 0xF2, _, _] => Some(Self::Mp3),
            _ => None,
        }
    }
}

impl SoundClip {
    /// Wrap encoded bytes of a known format
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Encoded file bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Container format
    pub fn format(&self) -> AudioFormat {
        self.format
    }
}

impl Asset for SoundClip {
    const KIND: &'static str = "sound_clip";

    fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::InvalidData("Empty audio file".to_string()));
        }
        let format = AudioFormat::detect(bytes)
            .ok_or_else(|| AssetError::UnsupportedFormat("unrecognised audio container".to_string()))?;
        Ok(Self::new(bytes.to_vec(), format))
    }
}
