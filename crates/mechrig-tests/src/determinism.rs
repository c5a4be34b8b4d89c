//! Determinism checks for rig builds.
//!
//! A build is deterministic when fresh documents over the same scene, and
//! repeated rebuilds of one document, all produce the same skeleton
//! fingerprint.

use mechrig_core::{skeleton_fingerprint, ObjectId, RigDocument, RigResult, Scene};

/// Result of a determinism verification.
#[derive(Debug, Clone)]
pub struct DeterminismResult {
    /// Whether every run produced the same fingerprint.
    pub is_deterministic: bool,
    pub runs: usize,
    /// Fingerprint of the first run.
    pub fingerprint: String,
    /// First run whose fingerprint differed, with that fingerprint.
    pub mismatch: Option<(usize, String)>,
}

impl DeterminismResult {
    /// Panic with a detailed message if not deterministic.
    pub fn assert_deterministic(&self) {
        if let Some((run, fingerprint)) = &self.mismatch {
            panic!(
                "Non-deterministic build: run {} of {} produced {} instead of {}",
                run, self.runs, fingerprint, self.fingerprint
            );
        }
    }
}

/// Builds `scene` `runs` times in fresh documents, then rebuilds the last
/// document `runs` more times in place, comparing every fingerprint.
///
/// # Errors
/// The first build error encountered.
pub fn verify_build_determinism(
    scene: &Scene,
    origin: Option<&str>,
    runs: usize,
) -> RigResult<DeterminismResult> {
    let origin = origin.map(ObjectId::new);
    let mut fingerprints = Vec::with_capacity(runs * 2);
    let mut last = None;

    for _ in 0..runs {
        let mut doc = RigDocument::new(scene.clone());
        doc.build_rig(&[], origin.clone(), None)?;
        fingerprints.push(skeleton_fingerprint(doc.skeleton()?)?);
        last = Some(doc);
    }
    if let Some(mut doc) = last {
        for _ in 0..runs {
            doc.rebuild()?;
            fingerprints.push(skeleton_fingerprint(doc.skeleton()?)?);
        }
    }

    let fingerprint = fingerprints.first().cloned().unwrap_or_default();
    let mismatch = fingerprints
        .iter()
        .enumerate()
        .find(|(_, f)| **f != fingerprint)
        .map(|(i, f)| (i, f.clone()));
    Ok(DeterminismResult {
        is_deterministic: mismatch.is_none(),
        runs: fingerprints.len(),
        fingerprint,
        mismatch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_chain_is_deterministic() {
        let result = verify_build_determinism(&fixtures::chain(3), None, 2).unwrap();
        assert!(result.is_deterministic);
        assert_eq!(result.runs, 4);
        assert_eq!(result.fingerprint.len(), 64);
    }

    #[test]
    #[should_panic(expected = "Non-deterministic build")]
    fn test_mismatch_panics() {
        DeterminismResult {
            is_deterministic: false,
            runs: 2,
            fingerprint: "a".into(),
            mismatch: Some((1, "b".into())),
        }
        .assert_deterministic();
    }
}
