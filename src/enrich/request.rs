//! Enrichment input and its canonical text form.

use serde::{Deserialize, Serialize};

/// The text-bearing subset of a product record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRequest {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EnrichmentRequest {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Build the labeled text blob handed to the embedding backend.
///
/// Fields appear in the order name, category, description, tags. Blank
/// fields are left out along with their label.
pub fn canonical_text(request: &EnrichmentRequest) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(4);

    let mut push = |label: &str, value: &str| {
        let value = clean(value);
        if !value.is_empty() {
            segments.push(format!("{label}: {value}"));
        }
    };

    push("Product", &request.name);
    push("Category", &request.category);
    if let Some(description) = &request.description {
        push("Description", description);
    }

    let tags: Vec<String> = request
        .tags
        .iter()
        .map(|t| clean(t))
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        segments.push(format!("Tags: {}", tags.join(", ")));
    }

    segments.join(" ").trim().to_string()
}

/// Trim and fold line breaks into single spaces.
fn clean(value: &str) -> String {
    value
        .trim()
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
