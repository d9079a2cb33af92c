/* Image descriptions as they appear in the input documents, and the placement rules they turn
 * into. A document maps image names to their description, for example:
 *
 *   mcuboot:
 *     placement:
 *       before: [spm, app]
 *     size: 0xc000
 *   provision:
 *     placement: last
 *     size: 0x1000
 */

use indexmap::IndexMap;
use serde::Deserialize;

use crate::errors::LayoutError;

pub const LAST_KEYWORD: &str = "last";
pub const BEFORE_KEY: &str = "before";
pub const AFTER_KEY: &str = "after";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PlacementScheme {
    Keyword(String),
    Rule(IndexMap<String, Vec<String>>),
}

#[derive(Debug, Deserialize)]
pub struct ImageScheme {
    pub placement: PlacementScheme,
    pub size: Option<u64>,
}

/// One input document. Document order is kept, the first image owns the document's output.
pub type ImageGroupScheme = IndexMap<String, ImageScheme>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Directly before/after the first of `candidates` that exists.
    Adjacent {
        direction: Direction,
        candidates: Vec<String>,
    },
    /// At the very end of flash.
    Last,
    /// Placed by elimination; only the application image.
    Unconstrained,
}

impl Placement {
    pub fn before(candidates: &[&str]) -> Self {
        Placement::Adjacent {
            direction: Direction::Before,
            candidates: candidates.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn after(candidates: &[&str]) -> Self {
        Placement::Adjacent {
            direction: Direction::After,
            candidates: candidates.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn from_scheme(image: &str, scheme: PlacementScheme) -> Result<Self, LayoutError> {
        let malformed = |reason: String| LayoutError::MalformedPlacement {
            image: image.to_string(),
            reason,
        };

        match scheme {
            PlacementScheme::Keyword(keyword) if keyword == LAST_KEYWORD => Ok(Placement::Last),
            PlacementScheme::Keyword(keyword) => {
                Err(malformed(format!("unknown placement `{}`", keyword)))
            }
            PlacementScheme::Rule(rule) => {
                if rule.len() != 1 {
                    return Err(malformed(format!(
                        "expected exactly one of `{}` or `{}`, found {} keys",
                        BEFORE_KEY,
                        AFTER_KEY,
                        rule.len()
                    )));
                }

                let (key, candidates) = rule
                    .into_iter()
                    .next()
                    .ok_or_else(|| malformed("empty placement".to_string()))?;

                let direction = match key.as_str() {
                    BEFORE_KEY => Direction::Before,
                    AFTER_KEY => Direction::After,
                    other => return Err(malformed(format!("unknown placement rule `{}`", other))),
                };

                Ok(Placement::Adjacent {
                    direction,
                    candidates,
                })
            }
        }
    }
}
