pub mod error;
pub mod config;
pub mod integrity;
pub mod record;
pub mod packer;
pub mod block;
pub mod extract;
pub mod collect;
pub mod archive;

pub use error::{PackError, Result};
pub use config::PackOptions;
pub use archive::{BeamPacker, PackReport, UnpackReport};
pub use packer::{pack, Block, FileDescriptor, PackedFile};
pub use block::{BlockWriter, DecodedBlock, decode_records};
pub use record::FileRecord;
pub use integrity::{Validator, Digest, digests_equal};
