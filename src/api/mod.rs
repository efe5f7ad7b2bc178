use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST <base>/generate`.
#[derive(Serialize, Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ResponseFormat>,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
}

/// One newline-delimited record of the streamed response, as sent by the
/// server. Every field is optional; the decoder turns this into a typed chunk.
///
/// Counters and durations accept any non-negative JSON number, since some
/// servers write them as floats.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct GenerateResponse {
    pub response: Option<String>,
    pub done: Option<bool>,
    pub done_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_duration: Option<u64>,
    /// Older name of `total_duration`.
    #[serde(default, deserialize_with = "lenient_count")]
    pub done_duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub load_duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_eval_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub eval_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub eval_duration: Option<u64>,
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn total_duration(&self) -> Option<u64> {
        self.total_duration.or(self.done_duration)
    }
}

/// Read a count as `u64`, rounding floats. Negative or non-finite values are
/// treated as absent.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number.and_then(|number| {
        number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(|value| value.round() as u64)
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_absent_format_and_options() {
        let request = GenerateRequest {
            model: "llama3:latest".into(),
            system: String::new(),
            prompt: "Why is the sky blue?".into(),
            format: None,
            stream: true,
            options: GenerateOptions::default(),
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            value,
            json!({
                "model": "llama3:latest",
                "system": "",
                "prompt": "Why is the sky blue?",
                "stream": true,
                "options": {}
            })
        );
    }

    #[test]
    fn request_includes_format_and_sampling_when_set() {
        let request = GenerateRequest {
            model: "gemma:7b".into(),
            system: "grade it".into(),
            prompt: "Here is the customer comment: great".into(),
            format: Some(ResponseFormat::Json),
            stream: true,
            options: GenerateOptions {
                seed: Some(42),
                temperature: Some(0.5),
            },
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["format"], "json");
        assert_eq!(value["options"]["seed"], 42);
        assert_eq!(value["options"]["temperature"], 0.5);
    }

    #[test]
    fn response_reads_done_duration_as_total() {
        let record: GenerateResponse =
            serde_json::from_str(r#"{"done":true,"done_duration":99}"#).expect("parse");
        assert_eq!(record.total_duration(), Some(99));

        let record: GenerateResponse =
            serde_json::from_str(r#"{"done":true,"total_duration":5,"done_duration":7}"#)
                .expect("both names in one record");
        assert_eq!(record.total_duration(), Some(5));

        let record: GenerateResponse = serde_json::from_str(
            r#"{"model":"llama3","created_at":"2024-05-01T10:00:00Z","response":"Hi","done":false}"#,
        )
        .expect("unknown fields are ignored");
        assert_eq!(record.response.as_deref(), Some("Hi"));
        assert_eq!(record.done, Some(false));
        assert_eq!(record.total_duration(), None);
    }

    #[test]
    fn counts_accept_float_numbers() {
        let record: GenerateResponse = serde_json::from_str(
            r#"{"done":true,"eval_count":12.0,"eval_duration":1.5e9,"load_duration":-3,"prompt_eval_count":null}"#,
        )
        .expect("parse");
        assert_eq!(record.eval_count, Some(12));
        assert_eq!(record.eval_duration, Some(1_500_000_000));
        assert_eq!(record.load_duration, None);
        assert_eq!(record.prompt_eval_count, None);

        let err = serde_json::from_str::<GenerateResponse>(r#"{"eval_count":"many"}"#);
        assert!(err.is_err());
    }
}
