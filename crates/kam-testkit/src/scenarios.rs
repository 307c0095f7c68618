//! Named registry scenarios.
//!
//! Each scenario is a script of steps with the expected outcome of every
//! check and revoke. [`run_scenario`] drives them against a registry on
//! either store; `kam-server`'s integration tests replay the same steps
//! through the client against a live HTTP server.

use std::fmt;

use kam::CheckReason;
use kam_store::Store;

use crate::fixtures::TestFixture;

/// One step of a scenario.
#[derive(Debug, Clone)]
pub enum Step {
    Grant {
        package: &'static str,
        identity: &'static str,
        ttl_seconds: i64,
    },
    Revoke {
        package: &'static str,
        identity: &'static str,
        expect_revoked: bool,
    },
    Advance {
        secs: i64,
    },
    Check {
        package: &'static str,
        identity: &'static str,
        expect: CheckReason,
    },
    History {
        package: &'static str,
        expect_len: usize,
    },
}

/// A named script.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub steps: Vec<Step>,
}

/// Where and why a scenario diverged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFailure {
    pub scenario: &'static str,
    pub step: usize,
    pub message: String,
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step {}: {}", self.scenario, self.step, self.message)
    }
}

impl std::error::Error for ScenarioFailure {}

fn grant(package: &'static str, identity: &'static str, ttl_seconds: i64) -> Step {
    Step::Grant {
        package,
        identity,
        ttl_seconds,
    }
}

fn revoke(package: &'static str, identity: &'static str, expect_revoked: bool) -> Step {
    Step::Revoke {
        package,
        identity,
        expect_revoked,
    }
}

fn check(package: &'static str, identity: &'static str, expect: CheckReason) -> Step {
    Step::Check {
        package,
        identity,
        expect,
    }
}

/// Get all scenarios.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "grant_then_expire",
            description: "A one hour grant is valid now and expired an hour and a second later",
            steps: vec![
                grant("left-pad", "dev@example.com", 3600),
                check("left-pad", "dev@example.com", CheckReason::Valid),
                Step::Advance { secs: 3601 },
                check("left-pad", "dev@example.com", CheckReason::Expired),
            ],
        },
        Scenario {
            name: "revoke_unexpired",
            description: "Revoking an unexpired grant denies it with reason revoked",
            steps: vec![
                grant("pkg-a", "alice@x.com", 7200),
                revoke("pkg-a", "alice@x.com", true),
                check("pkg-a", "alice@x.com", CheckReason::Revoked),
            ],
        },
        Scenario {
            name: "revoke_missing",
            description: "Revoking a pair that was never granted reports false",
            steps: vec![
                revoke("ghost", "nobody@x.com", false),
                check("ghost", "nobody@x.com", CheckReason::NotFound),
            ],
        },
        Scenario {
            name: "revoke_is_idempotent",
            description: "A second revoke of the same record reports false",
            steps: vec![
                grant("pkg-a", "alice@x.com", 60),
                revoke("pkg-a", "alice@x.com", true),
                revoke("pkg-a", "alice@x.com", false),
                check("pkg-a", "alice@x.com", CheckReason::Revoked),
            ],
        },
        Scenario {
            name: "regrant_supersedes",
            description: "Granting twice keeps both records and only the latest counts",
            steps: vec![
                grant("pkg-b", "bob@x.com", 10),
                Step::Advance { secs: 5 },
                grant("pkg-b", "bob@x.com", 3600),
                Step::Advance { secs: 10 },
                check("pkg-b", "bob@x.com", CheckReason::Valid),
                Step::History {
                    package: "pkg-b",
                    expect_len: 2,
                },
            ],
        },
        Scenario {
            name: "regrant_after_revoke",
            description: "A fresh grant after a revoke restores authorization",
            steps: vec![
                grant("pkg-a", "alice@x.com", 60),
                revoke("pkg-a", "alice@x.com", true),
                grant("pkg-a", "alice@x.com", 60),
                check("pkg-a", "alice@x.com", CheckReason::Valid),
            ],
        },
        Scenario {
            name: "revoked_beats_expired",
            description: "A revoked record past its expiry still reports revoked",
            steps: vec![
                grant("pkg-a", "alice@x.com", 1),
                revoke("pkg-a", "alice@x.com", true),
                Step::Advance { secs: 2 },
                check("pkg-a", "alice@x.com", CheckReason::Revoked),
            ],
        },
        Scenario {
            name: "revoke_expired",
            description: "An expired record can still be revoked",
            steps: vec![
                grant("pkg-a", "alice@x.com", 1),
                Step::Advance { secs: 2 },
                check("pkg-a", "alice@x.com", CheckReason::Expired),
                revoke("pkg-a", "alice@x.com", true),
                check("pkg-a", "alice@x.com", CheckReason::Revoked),
            ],
        },
        Scenario {
            name: "zero_ttl",
            description: "A zero TTL grant is recorded and already expired",
            steps: vec![
                grant("pkg-a", "alice@x.com", 0),
                check("pkg-a", "alice@x.com", CheckReason::Expired),
                Step::History {
                    package: "pkg-a",
                    expect_len: 1,
                },
            ],
        },
        Scenario {
            name: "pairs_are_independent",
            description: "Revoking one identity leaves another identity on the package valid",
            steps: vec![
                grant("left-pad", "dev@example.com", 600),
                grant("left-pad", "alice@x.com", 600),
                revoke("left-pad", "alice@x.com", true),
                check("left-pad", "dev@example.com", CheckReason::Valid),
                check("left-pad", "alice@x.com", CheckReason::Revoked),
                check("pkg-a", "dev@example.com", CheckReason::NotFound),
            ],
        },
    ]
}

/// Run a scenario against a fixture, stopping at the first divergence.
pub async fn run_scenario<S: Store>(
    fixture: &TestFixture<S>,
    scenario: &Scenario,
) -> Result<(), ScenarioFailure> {
    let fail = |step: usize, message: String| ScenarioFailure {
        scenario: scenario.name,
        step,
        message,
    };

    for (index, step) in scenario.steps.iter().enumerate() {
        let registry = &fixture.registry;
        match step {
            Step::Grant {
                package,
                identity,
                ttl_seconds,
            } => {
                registry
                    .grant(package, identity, *ttl_seconds)
                    .await
                    .map_err(|e| fail(index, format!("grant failed: {}", e)))?;
            }
            Step::Revoke {
                package,
                identity,
                expect_revoked,
            } => {
                let revoked = registry
                    .revoke(package, identity)
                    .await
                    .map_err(|e| fail(index, format!("revoke failed: {}", e)))?;
                if revoked != *expect_revoked {
                    return Err(fail(
                        index,
                        format!("revoke returned {}, expected {}", revoked, expect_revoked),
                    ));
                }
            }
            Step::Advance { secs } => fixture.advance_secs(*secs),
            Step::Check {
                package,
                identity,
                expect,
            } => {
                let outcome = registry
                    .check(package, identity)
                    .await
                    .map_err(|e| fail(index, format!("check failed: {}", e)))?;
                if outcome.reason != *expect || outcome.authorized != expect.is_authorized() {
                    return Err(fail(
                        index,
                        format!("check returned {}, expected {}", outcome.reason, expect),
                    ));
                }
            }
            Step::History {
                package,
                expect_len,
            } => {
                let records = registry
                    .list_for_package(package)
                    .await
                    .map_err(|e| fail(index, format!("listing failed: {}", e)))?;
                if records.len() != *expect_len {
                    return Err(fail(
                        index,
                        format!("history has {} records, expected {}", records.len(), expect_len),
                    ));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_unique() {
        let scenarios = all_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }

    #[tokio::test]
    async fn test_scenarios_pass_on_memory_store() {
        for scenario in all_scenarios() {
            let fixture = TestFixture::new();
            if let Err(failure) = run_scenario(&fixture, &scenario).await {
                panic!("{}", failure);
            }
        }
    }

    #[tokio::test]
    async fn test_wrong_expectation_is_reported() {
        let scenario = Scenario {
            name: "wrong",
            description: "expects valid for a pair never granted",
            steps: vec![check("pkg", "a@b.c", CheckReason::Valid)],
        };
        let failure = run_scenario(&TestFixture::new(), &scenario).await.unwrap_err();
        assert_eq!(failure.step, 0);
        assert_eq!(failure.scenario, "wrong");
    }
}
