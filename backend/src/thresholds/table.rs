use super::ThresholdError;
use crate::events::{RandomWord, MAX_UNIT};
use crate::models::CtmcParams;

/// Threshold vectors with their uniformization constants
///
/// Dimension `i < I` bounds the busy agents of group `i`; dimension `I`
/// bounds the total queue size. Modes are numbered in increasing order of
/// jump rate, so the first dominating vector is the cheapest one.
///
/// # Example
/// ```
/// use callcenter_ctmc_core_rs::models::CtmcParams;
/// use callcenter_ctmc_core_rs::thresholds::ModeTable;
///
/// let mut params = CtmcParams::new(1, 1).unwrap();
/// params.set_max_arrival_rate(0, 1.0).unwrap();
/// params.set_max_service_rate(0, 0, 1.0).unwrap();
/// params.set_max_num_agents(0, 10).unwrap();
///
/// let thresholds = vec![vec![10, 0], vec![2, 0]];
/// let table = ModeTable::build(&params, Some(thresholds.as_slice()), &[1.0]).unwrap();
/// assert_eq!(table.num_modes(), 2);
/// assert_eq!(table.vector(0), &[2, 0]);
/// assert_eq!(table.rate(0), 3.0);
/// assert_eq!(table.uniformization_rate(), 11.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModeTable {
    num_groups: usize,
    vectors: Vec<Vec<u32>>,
    rates: Vec<f64>,
    success: Vec<f64>,
    log_fail: Vec<f64>,
    uniformization_rate: f64,
    bands: Vec<Vec<u32>>,
}

impl ModeTable {
    /// Validate `thresholds` against the bounds in `params` and compute the
    /// jump rate of every mode
    ///
    /// `group_weights[i]` is the service-rate weight of one busy agent of
    /// group `i` in the jump rate. `None` yields the single maximal mode.
    pub fn build(
        params: &CtmcParams,
        thresholds: Option<&[Vec<u32>]>,
        group_weights: &[f64],
    ) -> Result<Self, ThresholdError> {
        let num_groups = params.num_agent_groups();
        let dims = num_groups + 1;
        if group_weights.len() != num_groups {
            return Err(ThresholdError::WeightArity {
                expected: num_groups,
                found: group_weights.len(),
            });
        }

        let maximal: Vec<u32> = (0..num_groups)
            .map(|i| params.max_num_agents(i))
            .chain(std::iter::once(params.max_queue_capacity()))
            .collect();

        let mut vectors = match thresholds {
            None => vec![maximal.clone()],
            Some(rows) => {
                for (row, vector) in rows.iter().enumerate() {
                    if vector.len() != dims {
                        return Err(ThresholdError::WrongArity {
                            row,
                            expected: dims,
                            found: vector.len(),
                        });
                    }
                    for (dimension, (&value, &bound)) in vector.iter().zip(&maximal).enumerate() {
                        if value > bound {
                            return Err(ThresholdError::ExceedsBound {
                                row,
                                dimension,
                                value,
                                bound,
                            });
                        }
                    }
                }
                if !rows.iter().any(|v| *v == maximal) {
                    return Err(ThresholdError::MissingMaximalVector);
                }
                rows.to_vec()
            }
        };

        let base = params.total_max_arrival_rate();
        let patience = params.total_max_patience_rate();
        let rate_of = |v: &[u32]| -> f64 {
            let service: f64 = v[..num_groups]
                .iter()
                .zip(group_weights)
                .map(|(&n, &w)| f64::from(n) * w)
                .sum();
            base + service + f64::from(v[num_groups]) * patience
        };

        vectors.sort_by(|a, b| rate_of(a).total_cmp(&rate_of(b)).then_with(|| a.cmp(b)));
        vectors.dedup();

        let rates: Vec<f64> = vectors.iter().map(|v| rate_of(v)).collect();
        let uniformization_rate = rate_of(&maximal);
        let success: Vec<f64> = rates
            .iter()
            .map(|&rate| {
                if uniformization_rate > 0.0 {
                    (rate / uniformization_rate).min(1.0)
                } else {
                    0.0
                }
            })
            .collect();
        let log_fail = success.iter().map(|&p| (-p).ln_1p()).collect();

        let bands = (0..dims)
            .map(|d| {
                let mut values: Vec<u32> = vectors.iter().map(|v| v[d]).collect();
                values.sort_unstable();
                values.dedup();
                values
            })
            .collect();

        Ok(Self {
            num_groups,
            vectors,
            rates,
            success,
            log_fail,
            uniformization_rate,
            bands,
        })
    }

    pub fn num_modes(&self) -> usize {
        self.vectors.len()
    }

    /// `I + 1`: one dimension per agent group plus the queue
    pub fn num_dimensions(&self) -> usize {
        self.num_groups + 1
    }

    pub fn queue_dimension(&self) -> usize {
        self.num_groups
    }

    pub fn vector(&self, mode: usize) -> &[u32] {
        &self.vectors[mode]
    }

    pub fn vectors(&self) -> &[Vec<u32>] {
        &self.vectors
    }

    pub fn group_threshold(&self, mode: usize, group: usize) -> u32 {
        self.vectors[mode][group]
    }

    pub fn queue_threshold(&self, mode: usize) -> u32 {
        self.vectors[mode][self.num_groups]
    }

    /// Jump rate `Λ_r` of a mode
    pub fn rate(&self, mode: usize) -> f64 {
        self.rates[mode]
    }

    /// Global rate `Λ̃`, the rate of the maximal vector
    pub fn uniformization_rate(&self) -> f64 {
        self.uniformization_rate
    }

    /// Probability `Λ_r / Λ̃` that a uniformized step of mode `r` is an
    /// event of the mode rather than a padding self-jump
    pub fn success_probability(&self, mode: usize) -> f64 {
        self.success[mode]
    }

    /// Sorted distinct threshold values of dimension `d`
    pub fn bands(&self, d: usize) -> &[u32] {
        &self.bands[d]
    }

    /// Band of dimension `d` containing `value`: the smallest threshold at
    /// or above it
    pub fn band_of(&self, d: usize, value: u32) -> usize {
        let bands = &self.bands[d];
        bands.partition_point(|&b| b < value).min(bands.len() - 1)
    }

    /// First mode (in rate order) whose vector dominates the band values
    pub fn dominating_mode(&self, band_index: &[usize]) -> usize {
        self.vectors
            .iter()
            .position(|v| {
                band_index
                    .iter()
                    .enumerate()
                    .all(|(d, &b)| v[d] >= self.bands[d][b])
            })
            .unwrap_or(self.vectors.len() - 1)
    }

    /// Split one random word into a run of self-jumps and a fresh word
    ///
    /// The number of padding self-jumps before the next event of `mode` is
    /// geometric with success probability `Λ_r / Λ̃`. It is read off the word
    /// by inversion, and the position of the word inside its geometric cell
    /// is rescaled into a new uniform word for the event draw. Returns
    /// `u64::MAX` self-jumps when the mode has no events at all.
    pub fn split_self_jumps(&self, mode: usize, word: RandomWord) -> (u64, RandomWord) {
        let p = self.success[mode];
        if p >= 1.0 {
            return (0, word);
        }
        if p <= 0.0 {
            return (u64::MAX, word);
        }
        let log_fail = self.log_fail[mode];
        let log_survive = (-word.to_unit()).ln_1p();
        let skipped = (log_survive / log_fail).floor();
        if skipped >= u64::MAX as f64 {
            return (u64::MAX, word);
        }
        let offset = log_survive - skipped * log_fail;
        let residual = (-offset.exp_m1() / p).clamp(0.0, MAX_UNIT);
        (skipped as u64, RandomWord::from_unit(residual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(agents: u32, queue: u32) -> CtmcParams {
        let mut params = CtmcParams::new(1, 1).unwrap();
        params.set_max_arrival_rate(0, 1.0).unwrap();
        params.set_max_service_rate(0, 0, 1.0).unwrap();
        params.set_max_patience_rate(0, 0.5).unwrap();
        params.set_max_num_agents(0, agents).unwrap();
        params.set_max_queue_capacity(queue).unwrap();
        params
    }

    #[test]
    fn test_default_single_maximal_mode() {
        let table = ModeTable::build(&params(4, 2), None, &[1.0]).unwrap();
        assert_eq!(table.num_modes(), 1);
        assert_eq!(table.vector(0), &[4, 2]);
        assert_eq!(table.rate(0), 1.0 + 4.0 + 1.0);
        assert_eq!(table.success_probability(0), 1.0);
    }

    #[test]
    fn test_validation_errors() {
        let p = params(4, 2);
        assert_eq!(
            ModeTable::build(&p, Some(&[vec![4]][..]), &[1.0]).unwrap_err(),
            ThresholdError::WrongArity {
                row: 0,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            ModeTable::build(&p, Some(&[vec![4, 2], vec![5, 0]][..]), &[1.0]).unwrap_err(),
            ThresholdError::ExceedsBound {
                row: 1,
                dimension: 0,
                value: 5,
                bound: 4
            }
        );
        assert_eq!(
            ModeTable::build(&p, Some(&[vec![3, 2]][..]), &[1.0]).unwrap_err(),
            ThresholdError::MissingMaximalVector
        );
        assert_eq!(
            ModeTable::build(&p, Some(&[] as &[Vec<u32>]), &[1.0]).unwrap_err(),
            ThresholdError::MissingMaximalVector
        );
    }

    #[test]
    fn test_modes_sorted_by_rate_and_deduplicated() {
        let p = params(4, 2);
        let rows = vec![vec![4, 2], vec![1, 0], vec![2, 1], vec![1, 0]];
        let table = ModeTable::build(&p, Some(rows.as_slice()), &[1.0]).unwrap();
        assert_eq!(table.vectors(), &[vec![1, 0], vec![2, 1], vec![4, 2]]);
        assert_eq!(table.bands(0), &[1, 2, 4]);
        assert_eq!(table.bands(1), &[0, 1, 2]);
        assert!(table.rate(0) < table.rate(1));
    }

    #[test]
    fn test_dominating_mode_picks_cheapest() {
        let p = params(4, 2);
        let rows = vec![vec![4, 2], vec![1, 0], vec![2, 1]];
        let table = ModeTable::build(&p, Some(rows.as_slice()), &[1.0]).unwrap();
        let bands = |busy: u32, queue: u32| [table.band_of(0, busy), table.band_of(1, queue)];
        assert_eq!(table.dominating_mode(&bands(0, 0)), 0);
        assert_eq!(table.dominating_mode(&bands(2, 0)), 1);
        assert_eq!(table.dominating_mode(&bands(1, 1)), 1);
        assert_eq!(table.dominating_mode(&bands(1, 2)), 2);
    }

    #[test]
    fn test_self_jump_split_is_geometric() {
        let p = params(100, 0);
        let rows = vec![vec![1, 0], vec![100, 0]];
        let table = ModeTable::build(&p, Some(rows.as_slice()), &[1.0]).unwrap();
        let success = table.success_probability(0);
        assert!((success - 2.0 / 101.0).abs() < 1e-12);

        // P(G = 0) = p: words below p yield no skip
        let (g, _) = table.split_self_jumps(0, RandomWord::from_unit(success * 0.5));
        assert_eq!(g, 0);
        let (g, _) = table.split_self_jumps(0, RandomWord::from_unit(0.5));
        let expected = (0.5f64.ln() / (1.0 - success).ln()).floor() as u64;
        assert_eq!(g, expected);

        // The maximal mode never skips
        let word = RandomWord::from_unit(0.9);
        assert_eq!(table.split_self_jumps(1, word), (0, word));
    }

    #[test]
    fn test_residual_word_is_uniform() {
        let p = params(100, 0);
        let rows = vec![vec![1, 0], vec![100, 0]];
        let table = ModeTable::build(&p, Some(rows.as_slice()), &[1.0]).unwrap();
        let samples = 20_000u32;
        let mut below_half = 0u32;
        for s in 0..samples {
            let u = (f64::from(s) + 0.5) / f64::from(samples);
            let (_, residual) = table.split_self_jumps(0, RandomWord::from_unit(u));
            if residual.to_unit() < 0.5 {
                below_half += 1;
            }
        }
        let frac = f64::from(below_half) / f64::from(samples);
        assert!((frac - 0.5).abs() < 0.02, "fraction below 0.5 was {}", frac);
    }

    #[test]
    fn test_zero_rates_skip_forever() {
        let p = CtmcParams::new(1, 1).unwrap();
        let table = ModeTable::build(&p, None, &[0.0]).unwrap();
        assert_eq!(table.uniformization_rate(), 0.0);
        let (g, _) = table.split_self_jumps(0, RandomWord::from_unit(0.3));
        assert_eq!(g, u64::MAX);
    }
}
