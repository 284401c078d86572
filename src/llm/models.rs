//! Catalogue of the Gemini models the service can be pointed at

/// Model definition with metadata
#[derive(Debug, Clone, Copy)]
pub struct ModelDef {
    /// Model name as sent to the API (e.g., "gemini-2.0-flash")
    pub id: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Context window size in tokens
    pub context_window: usize,
}

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const MODELS: &[ModelDef] = &[
    ModelDef {
        id: "gemini-2.0-flash",
        description: "Gemini 2.0 Flash (fast, default)",
        context_window: 1_048_576,
    },
    ModelDef {
        id: "gemini-2.5-flash",
        description: "Gemini 2.5 Flash (balanced)",
        context_window: 1_048_576,
    },
    ModelDef {
        id: "gemini-2.5-pro-lite",
        description: "Gemini 2.5 Pro Lite",
        context_window: 1_048_576,
    },
];

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    MODELS
}

/// Look up a model by its API name
pub fn find_model(id: &str) -> Option<&'static ModelDef> {
    MODELS.iter().find(|m| m.id == id)
}
