//! Byte and text encodings of [`SavedState`].

use crate::error::StateError;
use crate::saved_state::SavedState;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

pub fn to_bytes(state: &SavedState) -> Result<Vec<u8>, StateError> {
    Ok(serde_json::to_vec(state)?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<SavedState, StateError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Text form embedded in a response when state is kept on the client
pub fn encode_payload(state: &SavedState) -> Result<String, StateError> {
    Ok(URL_SAFE_NO_PAD.encode(to_bytes(state)?))
}

pub fn decode_payload(payload: &str) -> Result<SavedState, StateError> {
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim())?;
    from_bytes(&bytes)
}
