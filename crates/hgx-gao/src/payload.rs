use crate::error::{GaoError, GaoResult};

/// Application state carried by a GAO.
///
/// `pack` produces the plaintext sealed into each container; `unpack` must
/// accept whatever `pack` produced.
pub trait GaoPayload: Clone + Default + Send + Sync + 'static {
    fn pack(&self) -> Vec<u8>;

    fn unpack(packed: &[u8]) -> GaoResult<Self>;
}

impl GaoPayload for Vec<u8> {
    fn pack(&self) -> Vec<u8> {
        self.clone()
    }

    fn unpack(packed: &[u8]) -> GaoResult<Self> {
        Ok(packed.to_vec())
    }
}

impl GaoPayload for String {
    fn pack(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn unpack(packed: &[u8]) -> GaoResult<Self> {
        String::from_utf8(packed.to_vec()).map_err(|e| GaoError::Payload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pass_through() {
        let state = vec![0u8, 1, 2, 255];
        assert_eq!(Vec::<u8>::unpack(&state.pack()).unwrap(), state);
    }

    #[test]
    fn string_requires_utf8() {
        assert_eq!(String::unpack(b"hello").unwrap(), "hello");
        assert!(matches!(
            String::unpack(&[0xff, 0xfe]),
            Err(GaoError::Payload(_))
        ));
    }
}
