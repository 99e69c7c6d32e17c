//! Fragment and reconstructed distributions.
//!
//! Distributions are dense vectors indexed little-endian: bit `i` of the
//! index is the outcome of wire `i`. Bitstrings are written with character
//! `i` giving wire `i`.

use std::collections::BTreeMap;

use qsplit_ir::WireId;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{CutError, CutResult};
use crate::instance::{BasisAssignment, FragmentInstance};

/// Tolerance for negative entries in a probability vector.
const NEGATIVE_TOLERANCE: f64 = 1e-12;

/// Output distribution of one fragment run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FragmentDistribution {
    num_wires: usize,
    probs: Vec<f64>,
    shots: Option<u64>,
}

impl FragmentDistribution {
    /// Create a distribution from exact probabilities.
    pub fn from_probabilities(num_wires: usize, probs: Vec<f64>) -> CutResult<Self> {
        check_len(num_wires, probs.len())?;
        if let Some((index, p)) = probs
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < -NEGATIVE_TOLERANCE)
        {
            return Err(CutError::InvalidDistribution(format!(
                "entry {index} is {p}"
            )));
        }
        Ok(Self {
            num_wires,
            probs,
            shots: None,
        })
    }

    /// Create a distribution from measurement counts keyed by bitstring.
    ///
    /// Repeated keys are summed, so counts from several shot batches can be
    /// chained into a single call.
    pub fn from_counts<I, S>(num_wires: usize, counts: I) -> CutResult<Self>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        if num_wires >= usize::BITS as usize {
            return Err(CutError::InvalidDistribution(format!(
                "{num_wires} wires do not fit a dense distribution"
            )));
        }
        let mut totals = vec![0u64; 1usize << num_wires];
        let mut shots = 0u64;
        for (bits, count) in counts {
            let index = parse_bitstring(bits.as_ref(), num_wires)?;
            totals[index] += count;
            shots += count;
        }
        if shots == 0 {
            return Err(CutError::InvalidDistribution("no shots recorded".into()));
        }

        #[allow(clippy::cast_precision_loss)]
        let probs = totals
            .into_iter()
            .map(|c| c as f64 / shots as f64)
            .collect();
        Ok(Self {
            num_wires,
            probs,
            shots: Some(shots),
        })
    }

    /// Number of wires.
    #[inline]
    pub fn num_wires(&self) -> usize {
        self.num_wires
    }

    /// Probability vector.
    #[inline]
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Number of shots, for sampled distributions.
    #[inline]
    pub fn shots(&self) -> Option<u64> {
        self.shots
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        self.probs.iter().sum()
    }
}

/// Fragment distributions indexed by fragment and boundary assignment.
#[derive(Debug, Clone, Default)]
pub struct FragmentResults {
    per_fragment: Vec<FxHashMap<BasisAssignment, FragmentDistribution>>,
}

impl FragmentResults {
    /// Create an empty result table for `num_fragments` fragments.
    pub fn new(num_fragments: usize) -> Self {
        Self {
            per_fragment: vec![FxHashMap::default(); num_fragments],
        }
    }

    /// Number of fragments the table covers.
    #[inline]
    pub fn num_fragments(&self) -> usize {
        self.per_fragment.len()
    }

    /// Record a distribution, replacing any earlier one for the same key.
    pub fn insert(
        &mut self,
        fragment: usize,
        assignment: BasisAssignment,
        distribution: FragmentDistribution,
    ) -> CutResult<()> {
        let num_fragments = self.per_fragment.len();
        let table = self.per_fragment.get_mut(fragment).ok_or_else(|| {
            CutError::InvalidDistribution(format!(
                "fragment {fragment} out of range ({num_fragments} fragments)"
            ))
        })?;
        table.insert(assignment, distribution);
        Ok(())
    }

    /// Look up a distribution.
    pub fn get(&self, fragment: usize, assignment: &BasisAssignment) -> Option<&FragmentDistribution> {
        self.per_fragment.get(fragment)?.get(assignment)
    }

    /// Total number of stored distributions.
    pub fn len(&self) -> usize {
        self.per_fragment.iter().map(FxHashMap::len).sum()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Instances from `instances` that have no stored distribution.
    pub fn missing<'a>(&self, instances: &'a [FragmentInstance]) -> Vec<&'a FragmentInstance> {
        instances
            .iter()
            .filter(|i| self.get(i.fragment, &i.assignment).is_none())
            .collect()
    }
}

/// Reconstructed distribution over the original circuit's wires.
///
/// Produced by the signed reconstruction sum, so individual entries may be
/// slightly negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconstructedDistribution {
    wires: Vec<WireId>,
    probs: Vec<f64>,
}

impl ReconstructedDistribution {
    /// Create a distribution over `wires`.
    pub fn new(wires: Vec<WireId>, probs: Vec<f64>) -> CutResult<Self> {
        check_len(wires.len(), probs.len())?;
        Ok(Self { wires, probs })
    }

    /// Wires, in the order of the index bits.
    #[inline]
    pub fn wires(&self) -> &[WireId] {
        &self.wires
    }

    /// Number of wires.
    #[inline]
    pub fn num_wires(&self) -> usize {
        self.wires.len()
    }

    /// Dense probability vector.
    #[inline]
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    /// Consume into the dense probability vector.
    pub fn into_probs(self) -> Vec<f64> {
        self.probs
    }

    /// Sum of all entries.
    pub fn total(&self) -> f64 {
        self.probs.iter().sum()
    }

    /// Probability of one outcome.
    pub fn probability(&self, bitstring: &str) -> CutResult<f64> {
        let index = parse_bitstring(bitstring, self.wires.len())?;
        Ok(self.probs[index])
    }

    /// Outcomes whose absolute value exceeds `threshold`, keyed by bitstring.
    pub fn to_bitstring_map(&self, threshold: f64) -> BTreeMap<String, f64> {
        self.probs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.abs() > threshold)
            .map(|(index, &p)| (index_to_bitstring(index, self.wires.len()), p))
            .collect()
    }

    /// The `k` most likely outcomes, most likely first.
    pub fn top_k(&self, k: usize) -> Vec<(String, f64)> {
        let mut indexed: Vec<(usize, f64)> = self.probs.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        indexed
            .into_iter()
            .take(k)
            .map(|(index, p)| (index_to_bitstring(index, self.wires.len()), p))
            .collect()
    }

    /// The closest probability distribution in L2 distance.
    ///
    /// Negative mass is removed from the smallest entries upwards and spread
    /// evenly over the remaining ones.
    #[allow(clippy::cast_precision_loss)]
    pub fn nearest_probability(&self) -> Self {
        let mut order: Vec<usize> = (0..self.probs.len()).collect();
        order.sort_by(|&a, &b| self.probs[a].total_cmp(&self.probs[b]));

        let mut probs = vec![0.0; self.probs.len()];
        let mut remaining = self.probs.len();
        let mut beta = 0.0;
        for index in order {
            let value = self.probs[index];
            let shifted = value + beta / remaining as f64;
            if shifted < 0.0 {
                beta += value;
                remaining -= 1;
            } else {
                probs[index] = shifted;
            }
        }

        Self {
            wires: self.wires.clone(),
            probs,
        }
    }

    /// Total variation distance to another distribution over the same wires.
    pub fn total_variation_distance(&self, other: &[f64]) -> CutResult<f64> {
        self.check_other(other)?;
        Ok(0.5
            * self
                .probs
                .iter()
                .zip(other)
                .map(|(p, q)| (p - q).abs())
                .sum::<f64>())
    }

    /// Hellinger fidelity `(sum sqrt(p q))^2`, with negative entries clipped
    /// to zero.
    pub fn hellinger_fidelity(&self, other: &[f64]) -> CutResult<f64> {
        self.check_other(other)?;
        let overlap: f64 = self
            .probs
            .iter()
            .zip(other)
            .map(|(p, q)| (p.max(0.0) * q.max(0.0)).sqrt())
            .sum();
        Ok(overlap * overlap)
    }

    /// First Wasserstein distance between the two distributions seen as
    /// weights on the outcome indices `0..2^n`.
    ///
    /// Negative entries are clipped and both sides are renormalized.
    pub fn wasserstein_distance(&self, other: &[f64]) -> CutResult<f64> {
        self.check_other(other)?;
        let p_total: f64 = self.probs.iter().map(|p| p.max(0.0)).sum();
        let q_total: f64 = other.iter().map(|q| q.max(0.0)).sum();
        if p_total <= 0.0 || q_total <= 0.0 {
            return Err(CutError::InvalidDistribution(
                "distribution has no positive mass".into(),
            ));
        }

        let mut p_cdf = 0.0;
        let mut q_cdf = 0.0;
        let mut distance = 0.0;
        let last = self.probs.len() - 1;
        for (p, q) in self.probs[..last].iter().zip(&other[..last]) {
            p_cdf += p.max(0.0) / p_total;
            q_cdf += q.max(0.0) / q_total;
            distance += (p_cdf - q_cdf).abs();
        }
        Ok(distance)
    }

    fn check_other(&self, other: &[f64]) -> CutResult<()> {
        if other.len() != self.probs.len() {
            return Err(CutError::InvalidDistribution(format!(
                "cannot compare distributions of length {} and {}",
                self.probs.len(),
                other.len()
            )));
        }
        Ok(())
    }
}

fn check_len(num_wires: usize, len: usize) -> CutResult<()> {
    let expected = 1usize.checked_shl(num_wires as u32).unwrap_or(0);
    if num_wires >= usize::BITS as usize || len != expected {
        return Err(CutError::InvalidDistribution(format!(
            "{num_wires} wire(s) need {expected} entries, got {len}"
        )));
    }
    Ok(())
}

/// Parse a bitstring (character `i` = wire `i`) into a little-endian index.
pub fn parse_bitstring(bits: &str, num_wires: usize) -> CutResult<usize> {
    if bits.len() != num_wires {
        return Err(CutError::InvalidDistribution(format!(
            "bitstring {bits:?} does not have {num_wires} characters"
        )));
    }
    bits.bytes().enumerate().try_fold(0usize, |index, (i, b)| match b {
        b'0' => Ok(index),
        b'1' => Ok(index | (1 << i)),
        _ => Err(CutError::InvalidDistribution(format!(
            "bitstring {bits:?} contains {:?}",
            b as char
        ))),
    })
}

/// Format a little-endian index as a bitstring (character `i` = wire `i`).
pub fn index_to_bitstring(index: usize, num_wires: usize) -> String {
    (0..num_wires)
        .map(|i| if (index >> i) & 1 == 1 { '1' } else { '0' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wires(n: u32) -> Vec<WireId> {
        (0..n).map(WireId::qubit).collect()
    }

    #[test]
    fn test_bitstring_convention() {
        assert_eq!(parse_bitstring("100", 3).unwrap(), 1);
        assert_eq!(parse_bitstring("001", 3).unwrap(), 4);
        assert_eq!(index_to_bitstring(6, 3), "011");
        assert!(parse_bitstring("10", 3).is_err());
        assert!(parse_bitstring("1x0", 3).is_err());
    }

    #[test]
    fn test_from_counts_merges_batches() {
        let first = [("00", 30u64), ("11", 20)];
        let second = [("00", 10u64), ("10", 40)];
        let dist =
            FragmentDistribution::from_counts(2, first.into_iter().chain(second)).unwrap();
        assert_eq!(dist.shots(), Some(100));
        assert!((dist.probs()[0] - 0.4).abs() < 1e-12);
        assert!((dist.probs()[1] - 0.4).abs() < 1e-12);
        assert!((dist.probs()[3] - 0.2).abs() < 1e-12);
        assert!((dist.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_counts_rejects_empty() {
        let empty: [(&str, u64); 0] = [];
        assert!(FragmentDistribution::from_counts(1, empty).is_err());
    }

    #[test]
    fn test_from_probabilities_validation() {
        assert!(FragmentDistribution::from_probabilities(1, vec![0.5, 0.5]).is_ok());
        assert!(FragmentDistribution::from_probabilities(2, vec![0.5, 0.5]).is_err());
        assert!(FragmentDistribution::from_probabilities(1, vec![1.5, -0.5]).is_err());
        assert!(FragmentDistribution::from_probabilities(1, vec![f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_results_table() {
        let mut results = FragmentResults::new(2);
        let dist = FragmentDistribution::from_probabilities(1, vec![1.0, 0.0]).unwrap();
        results
            .insert(1, BasisAssignment::default(), dist.clone())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.get(1, &BasisAssignment::default()), Some(&dist));
        assert!(results.get(0, &BasisAssignment::default()).is_none());
        assert!(results.insert(5, BasisAssignment::default(), dist).is_err());

        let instances = vec![
            FragmentInstance {
                fragment: 0,
                assignment: BasisAssignment::default(),
            },
            FragmentInstance {
                fragment: 1,
                assignment: BasisAssignment::default(),
            },
        ];
        assert_eq!(results.missing(&instances), vec![&instances[0]]);
    }

    #[test]
    fn test_nearest_probability() {
        let dist =
            ReconstructedDistribution::new(wires(2), vec![0.7, 0.55, -0.3, 0.05]).unwrap();
        let fixed = dist.nearest_probability();
        assert!(fixed.probs().iter().all(|p| *p >= 0.0));
        assert!((fixed.total() - 1.0).abs() < 1e-12);
        assert_eq!(fixed.probs()[2], 0.0);
        // the small positive entry is also pushed to zero
        assert_eq!(fixed.probs()[3], 0.0);
        assert!((fixed.probs()[0] - 0.575).abs() < 1e-12);
        assert!((fixed.probs()[1] - 0.425).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_probability_keeps_valid_distribution() {
        let dist = ReconstructedDistribution::new(wires(1), vec![0.25, 0.75]).unwrap();
        assert_eq!(dist.nearest_probability(), dist);
    }

    #[test]
    fn test_metrics() {
        let dist = ReconstructedDistribution::new(wires(1), vec![1.0, 0.0]).unwrap();
        assert!((dist.total_variation_distance(&[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(dist.hellinger_fidelity(&[0.0, 1.0]).unwrap().abs() < 1e-12);
        assert!((dist.hellinger_fidelity(&[1.0, 0.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((dist.wasserstein_distance(&[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(dist.total_variation_distance(&[1.0]).is_err());

        let spread = ReconstructedDistribution::new(wires(2), vec![0.5, 0.0, 0.0, 0.5]).unwrap();
        let w = spread.wasserstein_distance(&[0.0, 0.5, 0.5, 0.0]).unwrap();
        assert!((w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_top_k_and_lookup() {
        let dist = ReconstructedDistribution::new(wires(2), vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        let top = dist.top_k(2);
        assert_eq!(top[0].0, "11");
        assert_eq!(top[1].0, "01");
        assert!((dist.probability("10").unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(dist.to_bitstring_map(0.25).len(), 2);
    }
}
