//! Manifest model and the collaborators that produce it
//!
//! A manifest container (`manifest.unity3d`) carries three text assets named
//! `Bundle`, `Sound` and `Movie`. Each is an encrypted, encoded list of entries
//! of one shape:
//!
//! ```text
//! manifest.unity3d ──ContainerReader──▶ TextAsset { name, bytes }
//!                                            │
//!                                   ManifestCipher::decrypt
//!                                            │
//!                          ManifestDecoder::decode(kind, bytes)
//!                                            │
//!                                            ▼
//!                     ManifestEntries::{Bundle, Sound, Movie}
//! ```
//!
//! The decoder is told which kind it is decoding; the entry shape is never
//! inferred from the payload.

mod codec;
mod container;
mod entries;

pub use codec::{JsonManifestCodec, ManifestDecoder};
pub use container::{ContainerReader, MANIFEST_NAME, TextAsset};
pub use entries::{BundleEntry, Manifest, ManifestEntries, ManifestSet, MovieEntry, SoundEntry};
