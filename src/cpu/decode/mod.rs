//! Fetch & decode (C): ModRM decoding and effective-address calculation.

mod modrm;
mod operand;

pub use modrm::{decode_rm, fetch_modrm, ModRm};
pub use operand::Rm;
