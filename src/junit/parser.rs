//! The heuristic multi-framework JUnit-XML parser.
//!
//! A single `quick_xml::Reader` driven through a dispatch over
//! `Event::Start/End/Empty/Text/CData`. `<testsuite>` elements may nest, so
//! this keeps a stack of open suite frames: an inner `<testsuite>` overrides
//! the outer one for its own cases.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::error::JunitParseError;
use crate::model::{Framework, Outcome, ParsingInfo, Testrun};

use super::framework;

const TAG_TESTSUITES: &[u8] = b"testsuites";
const TAG_TESTSUITE: &[u8] = b"testsuite";
const TAG_TESTCASE: &[u8] = b"testcase";
const TAG_SKIPPED: &[u8] = b"skipped";
const TAG_ERROR: &[u8] = b"error";
const TAG_FAILURE: &[u8] = b"failure";

/// Parses a single JUnit-family XML document into a [`ParsingInfo`].
pub fn parse(bytes: &[u8]) -> Result<ParsingInfo, JunitParseError> {
    let mut parser = JunitParser::default();
    parser.run(bytes)?;
    parser.finish()
}

#[derive(Debug, Default)]
struct SuiteFrame {
    name: String,
    /// The suite's own `time` attribute, for the per-testcase duration
    /// fallback.
    time: Option<f64>,
    /// Count of direct `<testcase>` children closed under this frame.
    testcase_count: usize,
    /// Indices into `JunitParser::testruns` of cases in this suite whose
    /// duration still needs the suite-time-divided-by-count fallback.
    pending_fallback: Vec<usize>,
}

#[derive(Debug, Default)]
struct PendingCase {
    name: Option<String>,
    classname: String,
    filename: Option<String>,
    duration: Option<f64>,
    needs_fallback: bool,
    skipped: bool,
    error_seen: bool,
    error_text: String,
    failure_seen: bool,
    failure_text: String,
    failure_attr_message: Option<String>,
    in_error: bool,
    in_failure: bool,
}

#[derive(Debug, Default)]
struct JunitParser {
    stack: Vec<SuiteFrame>,
    suite_names: Vec<String>,
    suite_files: Vec<String>,
    testruns: Vec<Testrun>,
    current_case: Option<PendingCase>,
    saw_accepted_root: bool,
}

impl JunitParser {
    fn run(&mut self, bytes: &[u8]) -> Result<(), JunitParseError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| JunitParseError::MalformedXml(e.to_string()))?;
            if matches!(event, Event::Eof) {
                break;
            }
            self.dispatch(event)?;
            buf.clear();
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), JunitParseError> {
        match event {
            Event::Start(e) => match e.name().as_ref() {
                TAG_TESTSUITES => self.saw_accepted_root = true,
                TAG_TESTSUITE => {
                    self.saw_accepted_root = true;
                    self.open_suite(&e);
                }
                TAG_TESTCASE => self.open_case(&e),
                TAG_SKIPPED => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.skipped = true;
                    }
                }
                TAG_ERROR => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.error_seen = true;
                        case.in_error = true;
                    }
                }
                TAG_FAILURE => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.failure_seen = true;
                        case.failure_attr_message = attr_decoded(&e, "message");
                        case.in_failure = true;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                TAG_TESTSUITE => self.close_suite(),
                TAG_TESTCASE => self.close_case()?,
                TAG_ERROR => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.in_error = false;
                    }
                }
                TAG_FAILURE => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.in_failure = false;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                TAG_TESTSUITES => self.saw_accepted_root = true,
                TAG_TESTSUITE => {
                    self.saw_accepted_root = true;
                    self.open_suite(&e);
                    self.close_suite();
                }
                TAG_TESTCASE => {
                    self.open_case(&e);
                    self.close_case()?;
                }
                TAG_SKIPPED => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.skipped = true;
                    }
                }
                TAG_ERROR => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.error_seen = true;
                    }
                }
                TAG_FAILURE => {
                    if let Some(case) = self.current_case.as_mut() {
                        case.failure_seen = true;
                        case.failure_attr_message = attr_decoded(&e, "message");
                    }
                }
                _ => {}
            },
            Event::Text(e) => self.push_text(&e),
            Event::CData(e) => {
                if let Ok(unescaped) = e.minimal_escape() {
                    self.push_text(&unescaped);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn push_text(&mut self, e: &BytesText) {
        let Some(case) = self.current_case.as_mut() else {
            return;
        };
        let Ok(text) = e.unescape() else { return };
        if case.in_error {
            case.error_text.push_str(&text);
        } else if case.in_failure {
            case.failure_text.push_str(&text);
        }
    }

    fn open_suite(&mut self, e: &BytesStart) {
        let name = attr_decoded(e, "name").unwrap_or_default();
        self.suite_names.push(name.clone());
        if let Some(file) = attr_decoded(e, "file") {
            self.suite_files.push(file);
        }
        let time = attr_decoded(e, "time").and_then(|t| t.parse::<f64>().ok());
        self.stack.push(SuiteFrame {
            name,
            time,
            testcase_count: 0,
            pending_fallback: Vec::new(),
        });
    }

    fn close_suite(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let fallback = match frame.time {
            Some(t) if frame.testcase_count > 0 => t / frame.testcase_count as f64,
            _ => 0.0,
        };
        for idx in frame.pending_fallback {
            if let Some(testrun) = self.testruns.get_mut(idx) {
                testrun.duration = fallback;
            }
        }
    }

    fn open_case(&mut self, e: &BytesStart) {
        let name = attr_raw(e, "name");
        let classname = attr_raw(e, "classname").unwrap_or_default();
        let filename = attr_raw(e, "file");
        let (duration, needs_fallback) =
            match attr_decoded(e, "time").and_then(|t| t.parse::<f64>().ok()) {
                Some(d) => (Some(d), false),
                None => (None, true),
            };

        self.current_case = Some(PendingCase {
            name,
            classname,
            filename,
            duration,
            needs_fallback,
            ..Default::default()
        });
    }

    fn close_case(&mut self) -> Result<(), JunitParseError> {
        let Some(case) = self.current_case.take() else {
            return Ok(());
        };
        let name = case.name.ok_or(JunitParseError::MissingTestCaseName)?;

        let (outcome, failure_message) = if case.skipped {
            (Outcome::Skip, None)
        } else if case.error_seen {
            let text = case.error_text.trim();
            (Outcome::Error, (!text.is_empty()).then(|| text.to_string()))
        } else if case.failure_seen {
            let text = case.failure_text.trim();
            let message = if !text.is_empty() {
                Some(text.to_string())
            } else {
                case.failure_attr_message
            };
            (Outcome::Failure, message)
        } else {
            (Outcome::Pass, None)
        };

        let testsuite = self.stack.last().map(|f| f.name.clone()).unwrap_or_default();

        let testrun = Testrun {
            name,
            classname: case.classname,
            testsuite,
            duration: case.duration.unwrap_or(0.0),
            outcome,
            failure_message,
            filename: case.filename,
            build_url: None,
            computed_name: None,
        };

        let idx = self.testruns.len();
        self.testruns.push(testrun);

        if let Some(frame) = self.stack.last_mut() {
            frame.testcase_count += 1;
            if case.needs_fallback {
                frame.pending_fallback.push(idx);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ParsingInfo, JunitParseError> {
        if !self.saw_accepted_root {
            return Err(JunitParseError::NoTestSuiteFound);
        }

        let framework = framework::detect(&self.suite_names, &self.suite_files, &self.testruns);
        for testrun in &mut self.testruns {
            testrun.computed_name = framework::compute_name(framework, testrun);
        }

        Ok(ParsingInfo {
            framework,
            testruns: self.testruns,
        })
    }
}

fn attr_decoded(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|cow| cow.trim().to_string())
}

/// Reads an attribute value without entity-unescaping it. `name`/
/// `classname`/`filename` are kept raw on `Testrun`; only `computed_name`
/// construction decodes them.
fn attr_raw(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .map(|attr| String::from_utf8_lossy(&attr.value).trim().to_string())
}
