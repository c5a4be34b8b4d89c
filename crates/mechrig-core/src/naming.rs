//! Naming convention parser.
//!
//! Object and collection names carry rig semantics:
//!
//! | Pattern                 | Tag                          |
//! |-------------------------|------------------------------|
//! | `<name>_Mirrored`       | [`SemanticTag::MirroredGroup`] |
//! | `Hinge_<name>`          | [`SemanticTag::Hinge`]         |
//! | `Piston_<ID>_Cyl`       | [`SemanticTag::PistonCylinder`] |
//! | `Piston_<ID>_Rod`       | [`SemanticTag::PistonRod`]     |
//!
//! Rules are checked in that order. Matching ignores case and surrounding
//! whitespace; anything else is [`SemanticTag::Plain`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Suffix marking a collection whose contents are mirrored left/right.
pub const MIRRORED_SUFFIX: &str = "_mirrored";

/// Prefix marking a single-axis hinge.
pub const HINGE_PREFIX: &str = "hinge_";

const PISTON_PATTERN: &str = r"(?i)^piston_(.+)_(cyl|rod)$";

static PISTON_REGEX: OnceLock<Regex> = OnceLock::new();

fn piston_regex() -> &'static Regex {
    PISTON_REGEX.get_or_init(|| Regex::new(PISTON_PATTERN).expect("invalid regex pattern"))
}

/// Semantic classification of an object or group name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SemanticTag {
    /// No special meaning.
    #[default]
    Plain,
    /// Single-axis rotational joint pivoting on the named object.
    Hinge { pivot: String },
    /// Cylinder half of a piston actuator.
    PistonCylinder { id: String },
    /// Rod half of a piston actuator.
    PistonRod { id: String },
    /// Group to be expanded into left and right sides.
    MirroredGroup { base_name: String },
}

impl SemanticTag {
    /// Returns true for [`SemanticTag::Hinge`].
    pub fn is_hinge(&self) -> bool {
        matches!(self, SemanticTag::Hinge { .. })
    }

    /// Returns the piston id for cylinder and rod tags.
    pub fn piston_id(&self) -> Option<&str> {
        match self {
            SemanticTag::PistonCylinder { id } | SemanticTag::PistonRod { id } => Some(id),
            _ => None,
        }
    }

    /// Returns true if this tag is a piston cylinder or rod.
    pub fn is_piston(&self) -> bool {
        self.piston_id().is_some()
    }
}

/// Classifies a name into a [`SemanticTag`].
///
/// Total and pure: every string maps to exactly one tag and the same string
/// always maps to the same tag. Hinge pivots are bound to the name itself; use
/// [`classify_object`] to bind them to an object identifier instead.
///
/// # Example
/// ```
/// use mechrig_core::naming::{classify, SemanticTag};
///
/// assert_eq!(
///     classify("  piston_01_CYL "),
///     SemanticTag::PistonCylinder { id: "01".to_string() }
/// );
/// assert_eq!(classify("Chassis"), SemanticTag::Plain);
/// ```
pub fn classify(name: &str) -> SemanticTag {
    let trimmed = name.trim();

    if let Some(base) = strip_suffix_ignore_case(trimmed, MIRRORED_SUFFIX) {
        if !base.trim().is_empty() {
            return SemanticTag::MirroredGroup {
                base_name: base.trim_end().to_string(),
            };
        }
    }

    if has_prefix_ignore_case(trimmed, HINGE_PREFIX) {
        return SemanticTag::Hinge {
            pivot: trimmed.to_string(),
        };
    }

    if let Some(caps) = piston_regex().captures(trimmed) {
        let id = caps[1].to_string();
        return if caps[2].eq_ignore_ascii_case("cyl") {
            SemanticTag::PistonCylinder { id }
        } else {
            SemanticTag::PistonRod { id }
        };
    }

    SemanticTag::Plain
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    if !s.is_char_boundary(split) {
        return None;
    }
    let (head, tail) = s.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Classifies an object name, binding hinge pivots to the object's identifier.
pub fn classify_object(id: &str, name: &str) -> SemanticTag {
    match classify(name) {
        SemanticTag::Hinge { .. } => SemanticTag::Hinge {
            pivot: id.to_string(),
        },
        other => other,
    }
}

/// Classification of a group (collection) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupClass {
    /// Whether the group expands into left/right sides.
    pub mirrored: bool,
    /// Name with any `_Mirrored` suffix removed.
    pub base_name: String,
    /// Tag of the base name (hinge, piston or plain).
    pub kind: SemanticTag,
}

/// Classifies a group name into its mirror role and semantic kind.
///
/// `Piston_01_Cyl_Mirrored` is a mirrored piston cylinder: the mirror suffix
/// is peeled off first and the remainder classified again.
pub fn classify_group(name: &str) -> GroupClass {
    match classify(name) {
        SemanticTag::MirroredGroup { base_name } => {
            let kind = match classify(&base_name) {
                // Nested mirror suffixes do not stack.
                SemanticTag::MirroredGroup { .. } => SemanticTag::Plain,
                other => other,
            };
            GroupClass {
                mirrored: true,
                base_name,
                kind,
            }
        }
        kind => GroupClass {
            mirrored: false,
            base_name: name.trim().to_string(),
            kind,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        assert_eq!(classify("Chassis"), SemanticTag::Plain);
        assert_eq!(classify(""), SemanticTag::Plain);
        assert_eq!(classify("   "), SemanticTag::Plain);
        assert_eq!(classify("Mirrored"), SemanticTag::Plain);
        assert_eq!(classify("_Mirrored"), SemanticTag::Plain);
        assert_eq!(classify("Hinged"), SemanticTag::Plain);
        assert_eq!(classify("Piston__Cyl"), SemanticTag::Plain);
    }

    #[test]
    fn test_mirrored() {
        assert_eq!(
            classify("Arm_Mirrored"),
            SemanticTag::MirroredGroup {
                base_name: "Arm".to_string()
            }
        );
        assert_eq!(
            classify("  arm_MIRRORED  "),
            SemanticTag::MirroredGroup {
                base_name: "arm".to_string()
            }
        );
    }

    #[test]
    fn test_hinge() {
        assert_eq!(
            classify(" Hinge_Door"),
            SemanticTag::Hinge {
                pivot: "Hinge_Door".to_string()
            }
        );
        assert_eq!(
            classify_object("obj-7", "HINGE_lid"),
            SemanticTag::Hinge {
                pivot: "obj-7".to_string()
            }
        );
    }

    #[test]
    fn test_piston() {
        assert_eq!(
            classify("Piston_01_Cyl"),
            SemanticTag::PistonCylinder {
                id: "01".to_string()
            }
        );
        assert_eq!(
            classify("PISTON_front_lift_rod"),
            SemanticTag::PistonRod {
                id: "front_lift".to_string()
            }
        );
        assert_eq!(classify("Piston_01_Cylinder"), SemanticTag::Plain);
    }

    #[test]
    fn test_mirrored_wins_over_other_rules() {
        assert_eq!(
            classify("Hinge_Door_Mirrored"),
            SemanticTag::MirroredGroup {
                base_name: "Hinge_Door".to_string()
            }
        );

        let class = classify_group("Piston_01_Cyl_Mirrored");
        assert!(class.mirrored);
        assert_eq!(class.base_name, "Piston_01_Cyl");
        assert_eq!(class.kind.piston_id(), Some("01"));
    }

    #[test]
    fn test_group_class_plain() {
        let class = classify_group(" Body ");
        assert!(!class.mirrored);
        assert_eq!(class.base_name, "Body");
        assert_eq!(class.kind, SemanticTag::Plain);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for name in ["Arm_Mirrored", "Hinge_A", "Piston_x_Rod", "Plain"] {
            assert_eq!(classify(name), classify(name));
        }
    }
}
