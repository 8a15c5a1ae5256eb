//! Model listing response parsing.

use super::error::ProbeError;
use serde::Deserialize;

/// OpenAI-compatible /v1/models response format
#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Parse an OpenAI-style model listing into model ids.
pub fn parse_model_list(body: &str) -> Result<Vec<String>, ProbeError> {
    let response: ModelsResponse =
        serde_json::from_str(body).map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;
    Ok(response.data.into_iter().map(|m| m.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        let body = r#"{"object":"list","data":[{"id":"llama3-8b","object":"model"},{"id":"lora-x"}]}"#;
        assert_eq!(parse_model_list(body).unwrap(), vec!["llama3-8b", "lora-x"]);
    }

    #[test]
    fn test_parse_model_list_empty() {
        assert!(parse_model_list(r#"{"data":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_model_list_invalid() {
        assert!(matches!(
            parse_model_list("not json"),
            Err(ProbeError::InvalidResponse(_))
        ));
    }
}
