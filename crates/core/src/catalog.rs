//! # Method Catalog
//!
//! Static catalog of Stata analysis methods, grouped into the five analysis
//! categories of an empirical paper. Entries are immutable; selecting one is
//! a pure lookup by category and index or name.

use serde::{Deserialize, Serialize};

/// Analysis phase a method belongs to
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Descriptive statistics and data preparation
    #[default]
    Basic,
    /// Benchmark estimation
    Benchmark,
    /// Robustness checks
    Robust,
    /// Endogeneity and identification
    Endo,
    /// Heterogeneity and mechanism analysis
    Hetero,
}

impl Category {
    /// All categories in workbench order
    pub fn all() -> [Category; 5] {
        [
            Category::Basic,
            Category::Benchmark,
            Category::Robust,
            Category::Endo,
            Category::Hetero,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Benchmark => "benchmark",
            Self::Robust => "robust",
            Self::Endo => "endo",
            Self::Hetero => "hetero",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "benchmark" => Some(Self::Benchmark),
            "robust" => Some(Self::Robust),
            "endo" => Some(Self::Endo),
            "hetero" => Some(Self::Hetero),
            _ => None,
        }
    }

    /// Display title
    pub fn title(&self) -> &'static str {
        match self {
            Self::Basic => "Descriptive Statistics",
            Self::Benchmark => "Benchmark Regression",
            Self::Robust => "Robustness Checks",
            Self::Endo => "Endogeneity & Identification",
            Self::Hetero => "Heterogeneity & Mechanism",
        }
    }

    /// Ordered methods of this category
    pub fn methods(&self) -> &'static [AnalysisMethod] {
        match self {
            Self::Basic => BASIC,
            Self::Benchmark => BENCHMARK,
            Self::Robust => ROBUST,
            Self::Endo => ENDO,
            Self::Hetero => HETERO,
        }
    }

    /// Look up a method by position
    pub fn method(&self, index: usize) -> Option<&'static AnalysisMethod> {
        self.methods().get(index)
    }

    /// Look up a method by name (case-insensitive)
    pub fn method_by_name(&self, name: &str) -> Option<&'static AnalysisMethod> {
        self.methods()
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog entry: the method's name and a hint steering the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisMethod {
    pub name: &'static str,
    pub hint: &'static str,
}

const fn method(name: &'static str, hint: &'static str) -> AnalysisMethod {
    AnalysisMethod { name, hint }
}

const BASIC: &[AnalysisMethod] = &[
    method(
        "Descriptive Statistics",
        "Summarize every variable (N, mean, sd, min, p50, max) with tabstat and export the table with esttab or asdoc.",
    ),
    method(
        "Winsorization",
        "Winsorize continuous variables at the 1st and 99th percentiles with winsor2, replacing in place.",
    ),
    method(
        "Missing Value Diagnostics",
        "Report missing-value patterns with misstable summarize and misstable patterns; do not drop observations.",
    ),
    method(
        "Correlation Matrix",
        "Pairwise correlations with significance stars (pwcorr, star(0.05)) exported with logout or esttab.",
    ),
    method(
        "Multicollinearity (VIF)",
        "Run the baseline OLS then estat vif; flag variables with VIF above 10.",
    ),
    method(
        "Panel Structure",
        "Declare the panel with xtset using the fixed-effect identifiers, then xtdescribe and xtsum.",
    ),
    method(
        "Distribution Plots",
        "Histogram with kdensity overlay for the dependent and core explanatory variables; graph export as png.",
    ),
    method(
        "Group Mean Comparison",
        "Split the sample at the median of X and compare means of Y and controls with ttest; export the comparison.",
    ),
    method(
        "Outlier Inspection",
        "Box plots and listing of observations beyond three standard deviations; inspection only, no deletion.",
    ),
    method(
        "Log Transformations",
        "Generate ln_ versions of strictly positive skewed variables with gen ln_var = ln(var).",
    ),
    method(
        "Time Trend Plot",
        "Plot yearly means of Y and X with preserve/collapse/twoway line/restore so the data stay intact.",
    ),
    method(
        "Standardization",
        "Create z-scores with egen std() for continuous regressors to ease coefficient comparison.",
    ),
];

const BENCHMARK: &[AnalysisMethod] = &[
    method(
        "OLS Baseline",
        "reg y x controls, vce(robust); export with esttab including R-squared and N.",
    ),
    method(
        "Stepwise Controls",
        "Successive columns: X alone, X plus controls, X plus controls plus fixed effects; store with eststo and export with esttab.",
    ),
    method(
        "Two-Way Fixed Effects",
        "reghdfe y x controls, absorb(fixed effects) vce(cluster firstfe); export with esttab.",
    ),
    method(
        "Panel FE (xtreg)",
        "xtreg y x controls i.year, fe vce(cluster id) after xtset; export coefficients.",
    ),
    method(
        "Random Effects & Hausman",
        "Estimate fe and re, store both, run hausman fe re, sigmamore and report the test.",
    ),
    method(
        "Logit / Probit",
        "For a binary outcome: logit and probit with robust errors, then margins, dydx(*) for marginal effects.",
    ),
    method(
        "Tobit",
        "Censored outcome at zero: tobit y x controls, ll(0) vce(robust); report marginal effects.",
    ),
    method(
        "Poisson PML",
        "Count or nonnegative outcome: ppmlhdfe y x controls, absorb(fixed effects) vce(cluster).",
    ),
    method(
        "Standard Error Comparison",
        "Same specification with robust, clustered by each fixed-effect dimension, and two-way clustered errors.",
    ),
    method(
        "Standardized Coefficients",
        "reg y x controls, beta to report standardized effects next to the raw estimates.",
    ),
    method(
        "Quantile Regression",
        "sqreg y x controls, quantiles(25 50 75) reps(200); export coefficients by quantile.",
    ),
    method(
        "Lagged Explanatory Variable",
        "Use L.x after xtset to mitigate simultaneity; reghdfe with the same fixed effects and clustering.",
    ),
];

const ROBUST: &[AnalysisMethod] = &[
    method(
        "Alternative Dependent Variable",
        "Re-estimate the benchmark with an alternative measure of Y constructed from existing variables.",
    ),
    method(
        "Alternative Core Regressor",
        "Re-estimate with an alternative measure of X (e.g. a dummy or rank transformation of the existing X).",
    ),
    method(
        "Winsorized Re-estimation",
        "Winsorize at 1/99 and 5/95 and re-run the benchmark for each cut.",
    ),
    method(
        "Subsample Exclusion",
        "Exclude special periods or regions with if conditions and re-run the benchmark.",
    ),
    method(
        "Lag Structure",
        "Replace X with L1.x and L2.x in turn; keep the benchmark fixed effects.",
    ),
    method(
        "High-Dimensional Fixed Effects",
        "Add interacted fixed effects (e.g. region#year) in the absorb clause alongside the supplied fixed effects.",
    ),
    method(
        "Alternative Clustering",
        "Cluster standard errors at each fixed-effect level and two-way, reporting all columns.",
    ),
    method(
        "Additional Controls",
        "Add squared and interaction terms of existing controls to address omitted-variable concerns.",
    ),
    method(
        "Placebo Test (Permutation)",
        "Randomly permute X across observations 500 times in a loop, store each coefficient, and plot the distribution against the true estimate.",
    ),
    method(
        "Shortened Window",
        "Re-estimate on a trimmed time window with keep if inrange(year, ...) inside preserve/restore.",
    ),
    method(
        "Alternative Estimator",
        "Re-estimate with a different estimator suited to the outcome (ppmlhdfe, tobit, or areg).",
    ),
    method(
        "Influential Observations",
        "Compute Cook's distance after reg and re-estimate excluding observations above 4/N.",
    ),
];

const ENDO: &[AnalysisMethod] = &[
    method(
        "Instrumental Variables (2SLS)",
        "ivreghdfe y controls (x = instrument), absorb(fixed effects) first; report first stage, Kleibergen-Paap F, and Hansen J.",
    ),
    method(
        "Propensity Score Matching",
        "psmatch2 on a binary treatment from X with controls as covariates, nearest neighbour with caliper; pstest for balance.",
    ),
    method(
        "Entropy Balancing",
        "ebalance on controls for a binary treatment, then weighted reghdfe with the generated weights.",
    ),
    method(
        "Difference-in-Differences",
        "reghdfe y c.treat#c.post controls, absorb(fixed effects) vce(cluster); export the interaction coefficient.",
    ),
    method(
        "Event Study",
        "Leads and lags around treatment timing, omit the period before treatment, plot with coefplot to check parallel trends.",
    ),
    method(
        "Staggered DID",
        "csdid or did_imputation for staggered adoption; report the aggregated ATT and event-time estimates.",
    ),
    method(
        "Heckman Selection",
        "heckman two-step with an exclusion restriction from the controls; report the inverse Mills ratio.",
    ),
    method(
        "Regression Discontinuity",
        "rdrobust y running variable with default bandwidth, rdplot, and a density test with rddensity.",
    ),
    method(
        "Synthetic Control",
        "synth with pre-period outcome lags and controls as predictors; plot treated versus synthetic unit.",
    ),
    method(
        "Dynamic Panel GMM",
        "xtabond2 with L.y, gmm-style instruments for lagged y and x, iv-style for controls; report AR(2) and Hansen tests.",
    ),
    method(
        "Control Function",
        "First-stage residual from regressing x on the instrument, included in the second stage with bootstrap errors.",
    ),
    method(
        "Coefficient Stability (Oster)",
        "psacalc delta and beta with Rmax = 1.3 times the full-model R-squared.",
    ),
];

const HETERO: &[AnalysisMethod] = &[
    method(
        "Grouped Regression",
        "Split by each heterogeneity variable, estimate the benchmark per group, test the coefficient gap with suest.",
    ),
    method(
        "Interaction Term",
        "reghdfe y c.x##i.hetero controls, absorb(fixed effects); report the interaction coefficient.",
    ),
    method(
        "Fisher Permutation Test",
        "bdiff with 1000 reps to test inter-group coefficient differences across a heterogeneity variable.",
    ),
    method(
        "Stepwise Mediation",
        "Three-step Baron-Kenny: y on x, mechanism on x, y on x and mechanism, for each mechanism variable.",
    ),
    method(
        "Sobel Test",
        "sgmediation y, mv(mechanism) iv(x) cv(controls) for each mechanism variable.",
    ),
    method(
        "Bootstrap Mediation",
        "Bootstrap the indirect effect with 1000 reps and report the percentile confidence interval.",
    ),
    method(
        "Continuous Moderation",
        "Interact x with a centered continuous moderator, then margins and marginsplot across moderator values.",
    ),
    method(
        "Quantile Heterogeneity",
        "sqreg across quantiles 10 to 90 and plot the coefficient path of x.",
    ),
    method(
        "Channel as Outcome",
        "Use each mechanism variable as the dependent variable in the benchmark specification.",
    ),
    method(
        "Triple Differences",
        "Interact treat, post, and the heterogeneity variable; absorb the supplied fixed effects.",
    ),
    method(
        "Regional Heterogeneity",
        "Estimate the benchmark separately by region groups defined from existing identifiers.",
    ),
    method(
        "Marginal Effects by Group",
        "margins hetero, dydx(x) after the interaction model and marginsplot for group-specific effects.",
    ),
];
