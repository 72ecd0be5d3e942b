//! # Gatewayエンドポイント

pub mod node_info;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use node_info::handle_authority_info;
pub use verify::handle_verify;
