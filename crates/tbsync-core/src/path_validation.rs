//! Path helpers for names that come from the server.

use std::collections::HashMap;

/// Turn an entity name into a single path component.
///
/// Path separators and NUL become `_`; `.`/`..`/empty map to `_` so a name can
/// never climb out of its parent directory.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized names already used inside one parent directory.
///
/// Distinct server names can sanitize to the same component ("a/b" and
/// "a_b"); such entities would share a directory and a telemetry file, so
/// each collision is reported.
#[derive(Debug, Default)]
pub struct SiblingNames {
    seen: HashMap<String, String>,
    collisions: usize,
}

impl SiblingNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `name` and record it, warning when a different name already
    /// claimed the same component.
    pub fn component(&mut self, name: &str) -> String {
        let component = sanitize_component(name);
        match self.seen.get(&component) {
            Some(first) if first != name => {
                self.collisions += 1;
                tracing::warn!(
                    component = %component,
                    first = %first,
                    name = %name,
                    "Entity names collide after sanitizing; both share one directory"
                );
            }
            Some(_) => {}
            None => {
                self.seen.insert(component.clone(), name.to_string());
            }
        }
        component
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
