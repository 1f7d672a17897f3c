//! Parsing of `source://` references embedded in comment text.

use crate::store::percent_decode;

const SCHEME: &str = "source://";

/// A parsed reference to a line in an installed package's file.
///
/// Grammar: `source://<name>[@<version>]/<relativePath>#<line>`, where the
/// reference must run to the end of the comment, `<name>` excludes `/` and
/// `@`, and `<line>` is one or more digits. An empty inline version parses
/// as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub name: String,
    pub version: Option<String>,
    pub path: String,
    pub line: u32,
}

/// Extracts the trailing reference from one comment's text.
///
/// Most comments are not references, so anything that fails the grammar is
/// simply "no reference found" — never an error.
///
/// # Examples
///
/// ```
/// use srclink_core::source_ref::parse_trailing_reference;
///
/// let reference = parse_trailing_reference("# source://demo@1.0.0/lib/demo.rb#42").unwrap();
/// assert_eq!(reference.name, "demo");
/// assert_eq!(reference.version.as_deref(), Some("1.0.0"));
/// assert_eq!(reference.path, "lib/demo.rb");
/// assert_eq!(reference.line, 42);
///
/// assert!(parse_trailing_reference("# just a comment").is_none());
/// ```
pub fn parse_trailing_reference(comment: &str) -> Option<SourceRef> {
    let start = comment.find(SCHEME)?;
    let rest = &comment[start + SCHEME.len()..];

    let (body, line) = rest.rsplit_once('#')?;
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let line: u32 = line.parse().ok()?;

    let (package, path) = body.split_once('/')?;
    if path.is_empty() {
        return None;
    }

    let (name, version) = match package.split_once('@') {
        Some((name, version)) => {
            let version = (!version.is_empty()).then(|| version.to_owned());
            (name, version)
        }
        None => (package, None),
    };
    if name.is_empty() {
        return None;
    }

    Some(SourceRef {
        name: name.to_owned(),
        version,
        path: percent_decode(path),
        line,
    })
}
