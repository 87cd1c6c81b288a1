use pretty_assertions::assert_eq;

use testres_core::{Framework, Outcome};

fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))).unwrap()
}

#[test]
fn pytest_report_with_failure_and_pass() {
    let info = testres_core::junit::parse(&fixture("junit.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::Pytest));
    assert_eq!(info.testruns.len(), 2);

    let first = &info.testruns[0];
    assert_eq!(first.outcome, Outcome::Failure);
    assert_eq!(first.duration, 0.001);
    assert_eq!(first.failure_message.as_deref(), Some("assert False"));
    assert_eq!(
        first.computed_name.as_deref(),
        Some("tests.test_parsers.TestParsers::test_junit[junit.xml--True]")
    );

    let second = &info.testruns[1];
    assert_eq!(second.outcome, Outcome::Pass);
    assert_eq!(second.duration, 0.064);
    assert_eq!(second.failure_message, None);
}

#[test]
fn nested_testsuite_only_names_innermost_cases() {
    let info = testres_core::junit::parse(&fixture("junit-nested-testsuite.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::Pytest));
    assert_eq!(info.testruns.len(), 2);

    let inner = &info.testruns[0];
    assert_eq!(inner.testsuite, "nested_testsuite");
    assert_eq!(inner.computed_name, None);

    let outer = &info.testruns[1];
    assert_eq!(outer.testsuite, "pytest");
    assert_eq!(
        outer.computed_name.as_deref(),
        Some("tests.test_parsers.TestParsers::test_outer")
    );
}

#[test]
fn vitest_report_joins_classname_and_decoded_name() {
    let info = testres_core::junit::parse(&fixture("vitest-junit.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::Vitest));
    assert_eq!(info.testruns.len(), 2);

    let failing = &info.testruns[0];
    assert_eq!(failing.outcome, Outcome::Failure);
    assert!(failing
        .failure_message
        .as_deref()
        .unwrap()
        .starts_with("AssertionError: expected 5 to be 4"));
    assert_eq!(
        failing.computed_name.as_deref(),
        Some("__tests__/test-file-1.test.ts > first test file > 2 + 2 should equal 4")
    );

    let passing = &info.testruns[1];
    assert_eq!(passing.outcome, Outcome::Pass);
    assert_eq!(passing.duration, 0.0);
}

#[test]
fn jest_report_detected_from_sentence_style_names() {
    let info = testres_core::junit::parse(&fixture("jest-junit.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::Jest));
    assert_eq!(info.testruns.len(), 4);

    for testrun in &info.testruns {
        assert_eq!(testrun.computed_name.as_deref(), Some(testrun.name.as_str()));
    }
    assert_eq!(
        info.testruns[0].computed_name.as_deref(),
        Some("Title when rendered renders pull title")
    );
}

#[test]
fn phpunit_report_detected_from_suite_file_extension() {
    let info = testres_core::junit::parse(&fixture("phpunit.junit.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::PHPUnit));
    assert_eq!(info.testruns.len(), 2);

    assert_eq!(
        info.testruns[0].computed_name.as_deref(),
        Some("class.className::test1")
    );
    // No `classname` attribute on the second testcase: it decodes to an
    // empty string, not a missing identity.
    assert_eq!(info.testruns[1].computed_name.as_deref(), Some("::test2"));
}

#[test]
fn ctest_style_report_has_no_detected_framework() {
    let info = testres_core::junit::parse(&fixture("ctest.xml")).unwrap();
    assert_eq!(info.framework, None);
    assert_eq!(info.testruns[0].computed_name, None);
    assert_eq!(info.testruns[0].outcome, Outcome::Failure);
}

#[test]
fn missing_testsuite_name_still_parses_with_no_framework() {
    let info = testres_core::junit::parse(&fixture("no-testsuite-name.xml")).unwrap();
    assert_eq!(info.framework, None);
    assert_eq!(info.testruns.len(), 1);
}

#[test]
fn empty_testsuites_document_has_no_testruns() {
    let info = testres_core::junit::parse(&fixture("testsuites.xml")).unwrap();
    assert_eq!(info.framework, None);
    assert!(info.testruns.is_empty());
}

#[test]
fn error_and_skip_outcomes_are_distinguished() {
    let info = testres_core::junit::parse(&fixture("skip-error.junit.xml")).unwrap();
    assert_eq!(info.framework, Some(Framework::Pytest));
    assert_eq!(info.testruns.len(), 3);

    assert_eq!(info.testruns[0].outcome, Outcome::Error);
    assert_eq!(info.testruns[0].failure_message.as_deref(), Some("hello world"));

    assert_eq!(info.testruns[1].outcome, Outcome::Error);
    assert_eq!(info.testruns[1].failure_message, None);

    assert_eq!(info.testruns[2].outcome, Outcome::Skip);
    assert_eq!(info.testruns[2].failure_message, None);
}

#[test]
fn bare_testsuite_root_with_real_failure_text() {
    let info = testres_core::junit::parse(&fixture("empty_failure.junit.xml")).unwrap();
    assert_eq!(info.testruns.len(), 2);
    assert_eq!(info.testruns[0].outcome, Outcome::Pass);
    assert_eq!(info.testruns[1].outcome, Outcome::Failure);
    assert_eq!(info.testruns[1].failure_message.as_deref(), Some("TestError"));
}
