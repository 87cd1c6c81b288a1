//! Framework detection and the per-framework `computed_name` dispatch: a
//! tagged variant plus a pure dispatch function, not inheritance.
//!
//! Detection is advisory: it must not change `Testrun` content beyond
//! `computed_name`. It runs once, over the whole parsed document, after
//! every `<testcase>` has been collected.

use crate::model::{Framework, Testrun};

use super::entities::decode_entities;

/// Detects the framework dialect of a parsed document.
///
/// `suite_names` and `suite_files` are collected from every `<testsuite>`
/// element seen anywhere in the document (nested or not); `testruns` is the
/// full flattened list of parsed test cases. Checks run in order: Pytest,
/// then PHPUnit, then Vitest, then Jest, then `None` ("Unknown").
pub fn detect(suite_names: &[String], suite_files: &[String], testruns: &[Testrun]) -> Option<Framework> {
    if suite_names.iter().any(|n| n == "pytest")
        || testruns.iter().any(|t| looks_like_dotted_test_class(&t.classname))
    {
        return Some(Framework::Pytest);
    }

    if suite_files.iter().any(|f| f.ends_with(".php"))
        || testruns.iter().any(|t| {
            looks_like_php_class(&t.classname)
                && t.filename.as_deref().is_some_and(|f| f.ends_with(".php"))
        })
    {
        return Some(Framework::PHPUnit);
    }

    if testruns.iter().any(|t| looks_like_vitest_classname(&t.classname)) {
        return Some(Framework::Vitest);
    }

    if suite_names.iter().any(|n| n.eq_ignore_ascii_case("jest tests"))
        || (!testruns.is_empty()
            && testruns
                .iter()
                .all(|t| t.classname == t.name && t.name.contains(' ') && !looks_like_file_path(&t.name)))
    {
        return Some(Framework::Jest);
    }

    None
}

/// `classname` is a dotted path whose last segment starts with `Test`, e.g.
/// `tests.test_parsers.TestParsers`.
fn looks_like_dotted_test_class(classname: &str) -> bool {
    classname.contains('.')
        && classname
            .rsplit('.')
            .next()
            .is_some_and(|last| last.starts_with("Test"))
}

/// `classname` looks like a PHP class reference: namespaced with `\`, or a
/// dotted `class.className` shape that isn't pytest's dotted-Test pattern.
fn looks_like_php_class(classname: &str) -> bool {
    classname.contains('\\') || (classname.contains('.') && !looks_like_dotted_test_class(classname))
}

fn looks_like_vitest_classname(classname: &str) -> bool {
    [".test.ts", ".test.js", ".spec.ts", ".spec.js"]
        .iter()
        .any(|suffix| classname.ends_with(suffix))
}

fn looks_like_file_path(name: &str) -> bool {
    name.contains('/') || name.contains('\\') || name.ends_with(".ts") || name.ends_with(".js")
}

/// Computes `Testrun::computed_name` for a single test case, dispatching on
/// the document's detected framework.
///
/// `name`/`classname`/`filename` are kept raw (undecoded) on `Testrun`
/// itself, so every branch here decodes them before building the display
/// identity.
pub fn compute_name(framework: Option<Framework>, testrun: &Testrun) -> Option<String> {
    match framework? {
        Framework::Pytest => {
            // pytest's own JUnit exporter always names its root suite
            // "pytest"; a case living under some other (possibly nested)
            // suite isn't a genuine pytest case even if the document as a
            // whole was detected as Pytest.
            if testrun.testsuite != "pytest" {
                return None;
            }
            let classname = decode_entities(&testrun.classname);
            let name = decode_entities(&testrun.name);
            Some(match &testrun.filename {
                Some(filename) => format!("{}::{}::{}", decode_entities(filename), classname, name),
                None => format!("{classname}::{name}"),
            })
        }
        Framework::Vitest => {
            let classname = decode_entities(&testrun.classname);
            let name = decode_entities(&testrun.name);
            let prefix = format!("{classname} > ");
            match name.strip_prefix(&prefix) {
                Some(rest) => Some(format!("{classname} > {rest}")),
                None => Some(format!("{classname} > {name}")),
            }
        }
        Framework::Jest => Some(decode_entities(&testrun.name)),
        Framework::PHPUnit => {
            let classname = decode_entities(&testrun.classname);
            let name = decode_entities(&testrun.name);
            Some(format!("{classname}::{name}"))
        }
    }
}
