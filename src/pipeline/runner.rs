//! End-to-end runner: marker selection followed by deconvolution.

use crate::correct::correct_bh_matrix;
use crate::data::{
    ContrastSet, DeconvResultSet, DesignMatrix, MergeMethod, Phenotype, Profile, QValueMatrix,
    SignatureMatrix, SignatureSummary,
};
use crate::deconv::{deconvolve, DeconvConfig};
use crate::error::{DeconvError, Result};
use crate::filter::{filter_specific_regions, filter_weak_regions, ScoreFilterConfig, ScoredRegion};
use crate::normalize::{log2_transform, normalize, NormMethod};
use crate::report::Reporter;
use crate::signature::{optimize_signature, OptimizerConfig, SizeTrial};
use crate::simulate::SimulationConfig;
use crate::test::test_markers;
use serde::{Deserialize, Serialize};
use std::path::Path;

const COMPONENT: &str = "Pipeline";

/// Settings for marker selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub normalization: NormMethod,
    /// Test `log2(1 + x)` of the normalized profile instead of linear values.
    pub log_transform: bool,
    /// How replicate columns are collapsed before scoring.
    pub merge: MergeMethod,
    pub score: ScoreFilterConfig,
    pub optimizer: OptimizerConfig,
    /// Workers for the per-region tests.
    pub threads: usize,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            normalization: NormMethod::Quantile,
            log_transform: false,
            merge: MergeMethod::Mean,
            score: ScoreFilterConfig::default(),
            optimizer: OptimizerConfig::default(),
            threads: 1,
        }
    }
}

impl MarkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(DeconvError::configuration(COMPONENT, "threads must be at least 1"));
        }
        self.score.validate()?;
        self.optimizer.validate()
    }
}

/// Full run configuration, saved and loaded as YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Name of the run.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub deconvolution: DeconvConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "marker-deconv".to_string(),
            description: None,
            markers: MarkerConfig::default(),
            deconvolution: DeconvConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(DeconvError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(DeconvError::from)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Set the worker count of every stage.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.markers.threads = threads;
        self.deconvolution.threads = threads;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.markers.validate()?;
        self.deconvolution.validate()
    }
}

/// Everything marker selection produced.
#[derive(Debug, Clone)]
pub struct MarkerRun {
    pub signature: SignatureMatrix,
    /// Pooled q-values of every tested region.
    pub qvalues: QValueMatrix,
    /// Regions that passed the specificity filter.
    pub candidates: Vec<ScoredRegion>,
    pub trials: Vec<SizeTrial>,
    pub n_input_regions: usize,
    pub n_tested_regions: usize,
}

/// Serializable overview of a marker run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub n_input_regions: usize,
    pub n_tested_regions: usize,
    pub n_candidates: usize,
    pub signature: SignatureSummary,
    pub trials: Vec<SizeTrial>,
}

impl MarkerRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            n_input_regions: self.n_input_regions,
            n_tested_regions: self.n_tested_regions,
            n_candidates: self.candidates.len(),
            signature: self.signature.summary(),
            trials: self.trials.clone(),
        }
    }

    pub fn summary_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }
}

/// Select marker regions from pure profiles and build the signature matrix.
///
/// The phenotype is reordered to the profile's sample columns; a sample
/// present on one side only is a [`DeconvError::DataMismatch`].
pub fn find_markers(
    profile: &Profile,
    phenotype: &Phenotype,
    config: &MarkerConfig,
    reporter: &dyn Reporter,
) -> Result<MarkerRun> {
    config.validate()?;
    let phenotype = phenotype.align_to(profile.sample_ids())?;
    let n_input_regions = profile.n_regions();

    let profile = profile.dedup_regions()?;
    if profile.n_regions() < n_input_regions {
        reporter.warn(
            COMPONENT,
            &format!(
                "{} duplicate region ids dropped (first occurrence kept)",
                n_input_regions - profile.n_regions()
            ),
        );
    }

    let normalized = normalize(&profile, config.normalization)?;
    reporter.info(COMPONENT, &format!("profile normalized with {}", config.normalization));

    let (filtered, _) = filter_weak_regions(&normalized, config.threads)?;
    reporter.info(
        COMPONENT,
        &format!(
            "{} of {} regions kept after the weak-signal filter",
            filtered.n_regions(),
            profile.n_regions()
        ),
    );

    let tested = if config.log_transform {
        log2_transform(&filtered)?
    } else {
        filtered.clone()
    };

    let design = DesignMatrix::from_phenotype(&phenotype)?;
    let contrasts = ContrastSet::from_design(&design);
    reporter.debug(
        COMPONENT,
        &format!("{} contrasts over {} cell types", contrasts.len(), design.n_groups()),
    );

    let pvalues = test_markers(&tested, &design, &contrasts, config.threads)?;
    let qvalues = correct_bh_matrix(&pvalues)?;

    let merged = filtered.merge_replicates(&phenotype, config.merge)?;
    let candidates = filter_specific_regions(&merged, &qvalues, &config.score)?;
    reporter.info(COMPONENT, &format!("{} cell-type specific candidate regions", candidates.len()));
    if candidates.is_empty() {
        return Err(DeconvError::EmptyData(
            "no region passed the specificity filter".to_string(),
        ));
    }

    let optimized = optimize_signature(&merged, &candidates, &config.optimizer, reporter)?;

    Ok(MarkerRun {
        signature: optimized.signature,
        qvalues,
        candidates,
        trials: optimized.trials,
        n_input_regions,
        n_tested_regions: filtered.n_regions(),
    })
}

/// Output of [`run`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub markers: MarkerRun,
    pub deconvolution: Option<DeconvResultSet>,
}

/// Select markers and, when a mixture is given, deconvolve it against the
/// resulting signature.
pub fn run(
    profile: &Profile,
    phenotype: &Phenotype,
    mixture: Option<&Profile>,
    config: &RunConfig,
    reporter: &dyn Reporter,
) -> Result<RunOutput> {
    config.validate()?;
    let markers = find_markers(profile, phenotype, &config.markers, reporter)?;
    let deconvolution = match mixture {
        Some(mix) => Some(deconvolve(&markers.signature, mix, &config.deconvolution, reporter)?),
        None => None,
    };
    Ok(RunOutput { markers, deconvolution })
}
