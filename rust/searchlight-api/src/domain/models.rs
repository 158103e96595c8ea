//! Static catalogue of selectable AI models.
//!
//! A model is only a label carried through to the stored record and the
//! mock analysis. No inference happens anywhere in the service.

use serde::Serialize;

/// One entry of the model catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    pub id: u32,
    pub name: &'static str,
    pub description: &'static str,
}

/// The five selectable models, default first.
pub const MODELS: [ModelRef; 5] = [
    ModelRef {
        id: 1,
        name: "Claude 3.5 Sonnet",
        description: "Smart model by Anthropic",
    },
    ModelRef {
        id: 2,
        name: "GPT-4o",
        description: "Smart model by OpenAI",
    },
    ModelRef {
        id: 3,
        name: "Gemini 2.0 Flash",
        description: "Fast model by Google for reasoning",
    },
    ModelRef {
        id: 4,
        name: "Sonar",
        description: "Fast model by Perplexity",
    },
    ModelRef {
        id: 5,
        name: "Grok",
        description: "Fast model by X",
    },
];

/// The model a fresh session starts with.
#[must_use]
pub fn default_model() -> ModelRef {
    MODELS[0]
}

/// Look a model up by its display name (case-insensitive).
#[must_use]
pub fn find_model(name: &str) -> Option<ModelRef> {
    let name = name.trim();
    MODELS
        .iter()
        .copied()
        .find(|model| model.name.eq_ignore_ascii_case(name))
}
