//! Path lexing - splits a path expression into typed steps.
//!
//! A path addresses one position inside one record:
//!
//! ```text
//! path     = type "/" id ( "/" step )* suffix?
//! step     = name ( "[" index "]" )?
//! suffix   = "/$" | "?schema" | "?ref" | "?flat"
//! ```
//!
//! Paths are ASCII and case-sensitive. The suffix attaches to the last
//! step only and selects an alternate rendering mode.

use crate::error::WalkError;

/// Terminal modifier on a path selecting a rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Suffix {
    /// Return the value at the path; terminal references are dereferenced.
    #[default]
    None,
    /// `/$` - return the raw link text of a reference scalar.
    Raw,
    /// `?schema` - return the schema fragment governing the position.
    Schema,
    /// `?ref` - return the fully dereferenced value.
    Ref,
    /// `?flat` - return the value with keyed collections collapsed to key lists.
    Flat,
}

impl Suffix {
    /// The literal spelling of the suffix, empty for [`Suffix::None`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Suffix::None => "",
            Suffix::Raw => "/$",
            Suffix::Schema => "?schema",
            Suffix::Ref => "?ref",
            Suffix::Flat => "?flat",
        }
    }
}

/// One step of a path: an attribute name with an optional composite-key index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub attribute: String,
    pub index: Option<String>,
}

impl Step {
    /// Render the step back to its path-segment form (`name` or `name[idx]`).
    pub fn to_segment(&self) -> String {
        match &self.index {
            Some(idx) => format!("{}[{}]", self.attribute, idx),
            None => self.attribute.clone(),
        }
    }
}

/// A lexed path expression: record address, steps, and terminal suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    pub record_type: String,
    pub record_id: String,
    pub steps: Vec<Step>,
    pub suffix: Suffix,
}

impl PathExpr {
    /// Lex a path string.
    ///
    /// # Errors
    ///
    /// Returns `WalkError::BadPath` on empty segments, missing type/id,
    /// malformed brackets, or an unknown suffix.
    pub fn parse(path: &str) -> Result<Self, WalkError> {
        let bad = |message: String| WalkError::BadPath {
            path: path.to_string(),
            message,
        };

        let (rest, suffix) = split_suffix(path).map_err(|e| e.at_path(path))?;
        let mut segments = rest.split('/');

        let record_type = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| bad("missing record type".into()))?;
        if record_type.contains(['[', ']']) {
            return Err(bad(format!("record type [{record_type}] cannot carry an index")));
        }
        let record_id = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| bad("missing record id".into()))?;
        if record_id.contains(['[', ']']) {
            return Err(bad(format!("record id [{record_id}] cannot carry an index")));
        }

        let mut steps = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                return Err(bad("empty path segment".into()));
            }
            let (attribute, index) = parse_array_path(segment).map_err(|e| e.at_path(path))?;
            steps.push(Step { attribute, index });
        }

        Ok(PathExpr {
            record_type: record_type.to_string(),
            record_id: record_id.to_string(),
            steps,
            suffix,
        })
    }
}

/// Split one path segment into its attribute name and optional index.
///
/// `abc` yields `("abc", None)`; `abc[1]` yields `("abc", Some("1"))`.
///
/// # Errors
///
/// Returns `WalkError::BadPath` when brackets are present but empty,
/// unbalanced, or nested, or when the name is empty.
pub fn parse_array_path(segment: &str) -> Result<(String, Option<String>), WalkError> {
    let bad = |message: String| WalkError::BadPath {
        path: segment.to_string(),
        message,
    };

    let Some(open) = segment.find('[') else {
        if segment.contains(']') {
            return Err(bad("unmatched ] in path segment".into()));
        }
        return Ok((segment.to_string(), None));
    };

    if !segment.ends_with(']') {
        return Err(bad("unterminated [ in path segment".into()));
    }
    let name = &segment[..open];
    let index = &segment[open + 1..segment.len() - 1];
    if name.is_empty() {
        return Err(bad("missing attribute name before [".into()));
    }
    if name.contains(']') {
        return Err(bad("unmatched ] in path segment".into()));
    }
    if index.is_empty() {
        return Err(bad("empty index brackets".into()));
    }
    if index.contains(['[', ']']) {
        return Err(bad("nested brackets in index".into()));
    }

    Ok((name.to_string(), Some(index.to_string())))
}

/// Strip the terminal suffix from a path, if any.
fn split_suffix(path: &str) -> Result<(&str, Suffix), WalkError> {
    let bad = |message: String| WalkError::BadPath {
        path: path.to_string(),
        message,
    };

    let (rest, suffix) = match path.find('?') {
        Some(pos) => {
            let suffix = match &path[pos..] {
                "?schema" => Suffix::Schema,
                "?ref" => Suffix::Ref,
                "?flat" => Suffix::Flat,
                other => return Err(bad(format!("unknown suffix [{other}]"))),
            };
            (&path[..pos], suffix)
        }
        None => (path, Suffix::None),
    };

    if let Some(stripped) = rest.strip_suffix("/$") {
        if suffix != Suffix::None {
            return Err(bad("multiple suffixes".into()));
        }
        return Ok((stripped, Suffix::Raw));
    }

    Ok((rest, suffix))
}
