//! CBOR encoding of stored values.

use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn encode<T: Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(bytes)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replog_protocol::Entity;

    #[test]
    fn entity_survives_cbor() {
        let entity = Entity::new("people", "p1")
            .with_field("name", "Ada")
            .with_field("age", 36)
            .with_field("score", 1.5)
            .with_field("tags", serde_json::json!(["a", "b"]));
        let decoded: Entity = decode(&encode(&entity).unwrap()).unwrap();
        assert_eq!(decoded, entity);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        let result: CoreResult<Entity> = decode(&[0xff, 0x00]);
        assert!(matches!(result, Err(CoreError::Codec(_))));
    }
}
