use std::sync::Arc;

use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::MetricsProviderKind;
use crate::projects::repo_types::Project;
use crate::test_runs::repo_types::TestStatus;

/// Minimum coverage (exclusive, in percent) for a successful run.
pub const COVERAGE_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeQuality {
    pub lines_of_code: u32,
    pub complexity: String,
    /// Duplicated code, percent.
    pub duplications: f64,
    pub maintainability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityIssues {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    pub risk_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub response_time_ms: u32,
    pub load_time_ms: u32,
    pub memory_usage_mb: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    /// Line coverage, percent.
    pub coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub hash: String,
    pub branch: String,
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Everything one analysis of a project yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub code_quality: CodeQuality,
    pub security: SecurityIssues,
    pub performance: PerformanceMetrics,
    pub tests: TestSummary,
    pub commit: CommitInfo,
    pub logs: String,
}

impl Analysis {
    /// SUCCESS needs no failed tests, no high-severity issue and coverage
    /// above the threshold.
    pub fn verdict(&self) -> TestStatus {
        if self.tests.failed == 0
            && self.security.high == 0
            && self.tests.coverage > COVERAGE_THRESHOLD
        {
            TestStatus::Success
        } else {
            TestStatus::Failed
        }
    }
}

#[async_trait]
pub trait MetricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a project must have a repository URL before it can be analysed.
    fn requires_repository(&self) -> bool {
        false
    }

    async fn analyze(&self, project: &Project) -> anyhow::Result<Analysis>;
}

pub fn provider_for(kind: MetricsProviderKind) -> Arc<dyn MetricsProvider> {
    match kind {
        MetricsProviderKind::Simulated => Arc::new(SimulatedMetrics),
        MetricsProviderKind::Fixed => Arc::new(FixedMetrics),
    }
}

/// Pseudo-random metrics standing in for a real analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedMetrics;

const COMPLEXITY: [(&str, &str); 3] = [("low", "good"), ("medium", "fair"), ("high", "poor")];
const AUTHORS: [&str; 4] = [
    "dev@example.com",
    "qa@example.com",
    "lead@example.com",
    "ci-bot@example.com",
];

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn branch_slug(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "work".to_string()
    } else {
        slug.to_string()
    }
}

impl SimulatedMetrics {
    pub fn generate<R: Rng>(rng: &mut R, project: &Project, now: OffsetDateTime) -> Analysis {
        let (complexity, maintainability) = *COMPLEXITY.choose(rng).unwrap_or(&COMPLEXITY[0]);
        let code_quality = CodeQuality {
            lines_of_code: rng.gen_range(1_000..=50_000),
            complexity: complexity.to_string(),
            duplications: round1(rng.gen_range(0.0..15.0)),
            maintainability: maintainability.to_string(),
        };

        let (high, medium, low) = (
            rng.gen_range(0..=2),
            rng.gen_range(0..=5),
            rng.gen_range(0..=10),
        );
        let risk_level = if high > 0 {
            "high"
        } else if medium > 2 {
            "medium"
        } else {
            "low"
        };
        let security = SecurityIssues {
            high,
            medium,
            low,
            risk_level: risk_level.to_string(),
        };

        let performance = PerformanceMetrics {
            response_time_ms: rng.gen_range(50..=500),
            load_time_ms: rng.gen_range(500..=3_000),
            memory_usage_mb: rng.gen_range(64..=512),
        };

        let total = rng.gen_range(8..=20);
        let failed = rng.gen_range(0..=3);
        let tests = TestSummary {
            total,
            passed: total - failed,
            failed,
            coverage: round1(rng.gen_range(50.0..100.0)),
        };

        let branch = match rng.gen_range(0..3) {
            0 => "main".to_string(),
            1 => "develop".to_string(),
            _ => format!("feature/{}", branch_slug(&project.name)),
        };
        let commit = CommitInfo {
            hash: format!("{:07x}", rng.gen_range(0..0x1000_0000u32)),
            branch,
            author: AUTHORS.choose(rng).unwrap_or(&AUTHORS[0]).to_string(),
            timestamp: now,
        };

        let logs = format!(
            "Analyzing {name} @ {hash} ({branch})\n\
             Code quality: {loc} lines, {complexity} complexity, {dup}% duplicated\n\
             Security: {high} high / {medium} medium / {low} low\n\
             Performance: {rt} ms response, {lt} ms load, {mem} MB\n\
             Tests: {passed}/{total} passed, {cov}% coverage",
            name = project.name,
            hash = commit.hash,
            branch = commit.branch,
            loc = code_quality.lines_of_code,
            complexity = code_quality.complexity,
            dup = code_quality.duplications,
            high = security.high,
            medium = security.medium,
            low = security.low,
            rt = performance.response_time_ms,
            lt = performance.load_time_ms,
            mem = performance.memory_usage_mb,
            passed = tests.passed,
            total = tests.total,
            cov = tests.coverage,
        );

        Analysis {
            code_quality,
            security,
            performance,
            tests,
            commit,
            logs,
        }
    }
}

#[async_trait]
impl MetricsProvider for SimulatedMetrics {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn analyze(&self, project: &Project) -> anyhow::Result<Analysis> {
        let mut rng = StdRng::from_entropy();
        Ok(Self::generate(&mut rng, project, OffsetDateTime::now_utc()))
    }
}

/// Deterministic analyzer: every run of a project with a repository passes
/// with the same figures.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics;

impl FixedMetrics {
    pub fn analysis(now: OffsetDateTime) -> Analysis {
        Analysis {
            code_quality: CodeQuality {
                lines_of_code: 1_200,
                complexity: "low".into(),
                duplications: 0.0,
                maintainability: "good".into(),
            },
            security: SecurityIssues {
                high: 0,
                medium: 0,
                low: 0,
                risk_level: "low".into(),
            },
            performance: PerformanceMetrics {
                response_time_ms: 120,
                load_time_ms: 1_200,
                memory_usage_mb: 128,
            },
            tests: TestSummary {
                total: 10,
                passed: 10,
                failed: 0,
                coverage: 85.0,
            },
            commit: CommitInfo {
                hash: "123abc0".into(),
                branch: "main".into(),
                author: "test@example.com".into(),
                timestamp: now,
            },
            logs: "Test execution completed successfully".into(),
        }
    }
}

#[async_trait]
impl MetricsProvider for FixedMetrics {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn requires_repository(&self) -> bool {
        true
    }

    async fn analyze(&self, _project: &Project) -> anyhow::Result<Analysis> {
        Ok(Self::analysis(OffsetDateTime::now_utc()))
    }
}
