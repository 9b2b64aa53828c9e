use serde::de::DeserializeOwned;

use crate::error::DefinitionError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DefinitionError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DefinitionError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn from_value_with_path<T: DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, DefinitionError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| DefinitionError::Parse {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}
