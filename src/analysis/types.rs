use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};

/// Payload handed to the external classifier for a single frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    /// `data:image/jpeg;base64,...` still taken from the live feed.
    pub video_data_uri: String,
    pub head_movement_description: String,
    pub contextual_cues: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutput {
    pub is_suspicious: bool,
    pub reason: String,
}

/// Outcome of one classifier call. Exactly one of data/error exists.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Success(AnalysisOutput),
    Failure(String),
}

impl AnalysisResult {
    pub fn data(&self) -> Option<&AnalysisOutput> {
        match self {
            AnalysisResult::Success(output) => Some(output),
            AnalysisResult::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisResult::Success(_) => None,
            AnalysisResult::Failure(message) => Some(message),
        }
    }

    pub fn is_suspicious(&self) -> bool {
        self.data().map(|output| output.is_suspicious).unwrap_or(false)
    }
}

// The webview consumes the `{ data, error }` shape.
impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AnalysisResult", 2)?;
        state.serialize_field("data", &self.data())?;
        state.serialize_field("error", &self.error())?;
        state.end()
    }
}
