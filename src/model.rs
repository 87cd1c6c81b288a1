//! The normalized record model shared by every component: the XML-Parser
//! produces it, the Upload-Decoder packs it, and the Aggregate-Store keys
//! off it.

use serde::{Deserialize, Serialize};

/// The test framework a JUnit-family report was detected to originate from.
///
/// Detection is advisory (see [`crate::junit::framework::detect`]): it only
/// ever changes [`Testrun::computed_name`], never any other field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framework {
    Pytest,
    Jest,
    Vitest,
    PHPUnit,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Pytest => "Pytest",
            Framework::Jest => "Jest",
            Framework::Vitest => "Vitest",
            Framework::PHPUnit => "PHPUnit",
        }
    }
}

/// The result of running one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Failure,
    Error,
    Skip,
}

impl Outcome {
    pub fn is_failing(&self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error)
    }

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Failure => "failure",
            Outcome::Error => "error",
            Outcome::Skip => "skip",
        }
    }
}

/// One executed test case, normalized out of whatever dialect produced it.
///
/// Invariant: `duration >= 0.0`; `Pass`/`Skip` never carry a
/// `failure_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Testrun {
    pub name: String,
    #[serde(default)]
    pub classname: String,
    #[serde(default)]
    pub testsuite: String,
    pub duration: f64,
    pub outcome: Outcome,
    pub failure_message: Option<String>,
    pub filename: Option<String>,
    /// Carried through from upload metadata; never set by the XML-Parser.
    #[serde(default)]
    pub build_url: Option<String>,
    /// Canonical display identity, computed once framework detection has
    /// run over the whole document. `None` for `Unknown` framework.
    #[serde(default)]
    pub computed_name: Option<String>,
}

impl Testrun {
    /// The name used to key aggregate identity: `computed_name` if present,
    /// else the raw `name`.
    pub fn identity_name(&self) -> &str {
        self.computed_name.as_deref().unwrap_or(&self.name)
    }
}

/// The result of parsing one JUnit-family XML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsingInfo {
    pub framework: Option<Framework>,
    pub testruns: Vec<Testrun>,
}
