use titvo_core::{AmbiguityPolicy, ChangedFile, ChangedFileSet, TitvoError};

const HEADER_PREFIX: &str = "diff --git ";
const A_PREFIX: &str = "a/";
const B_SEPARATOR: &str = " b/";

/// Result of scanning a unified diff for changed files.
///
/// # Examples
///
/// ```
/// use titvo_core::AmbiguityPolicy;
/// use titvo_difflens::parser::extract;
///
/// let diff = "diff --git a/app/main.py b/app/main.py\n\
///             diff --git a/old/name.py b/new/name.py\n";
/// let extraction = extract(diff, AmbiguityPolicy::Skip).unwrap();
/// assert_eq!(extraction.headers, 2);
/// assert_eq!(extraction.files.paths(), vec!["app/main.py", "new/name.py"]);
/// assert!(extraction.ambiguous.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Unique b-side paths in ascending order.
    pub files: ChangedFileSet,
    /// Header lines whose b-side could not be recovered.
    pub ambiguous: Vec<String>,
    /// Number of `diff --git` header lines seen.
    pub headers: usize,
}

/// Extract the set of files changed by a diff, skipping ambiguous headers.
///
/// This is [`extract`] with [`AmbiguityPolicy::Skip`]; skipped headers are
/// logged as warnings.
///
/// # Examples
///
/// ```
/// use titvo_difflens::parser::changed_files;
///
/// let diff = "diff --git a/foo.py b/foo.py\n\
///             index 1111111..2222222 100644\n\
///             diff --git a/old.py b/new.py\n\
///             similarity index 90%\n\
///             rename from old.py\n\
///             rename to new.py\n";
/// let files = changed_files(diff);
/// assert_eq!(files.paths(), vec!["foo.py", "new.py"]);
/// ```
pub fn changed_files(input: &str) -> ChangedFileSet {
    extract(input, AmbiguityPolicy::Skip)
        .map(|extraction| extraction.files)
        .unwrap_or_default()
}

/// Scan a unified diff and collect the post-change path of every file section.
///
/// A section starts at each line beginning with `diff --git `. Its b-side path
/// is resolved from, in order: quoted header tokens, `rename to` / `copy to`
/// metadata, the fixed-width split of a header naming the same path on both
/// sides, the `+++ b/` line, and finally a header with exactly one ` b/`
/// separator. Anything else is ambiguous and handled per `policy`; a path is
/// never truncated.
///
/// # Errors
///
/// Returns [`TitvoError::ExtractionAmbiguity`] for the first ambiguous header
/// when `policy` is [`AmbiguityPolicy::Fail`].
pub fn extract(input: &str, policy: AmbiguityPolicy) -> Result<Extraction, TitvoError> {
    let mut paths: Vec<ChangedFile> = Vec::new();
    let mut ambiguous: Vec<String> = Vec::new();
    let mut headers = 0usize;
    let mut current: Option<Section<'_>> = None;

    for raw in input.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if let Some(rest) = line.strip_prefix(HEADER_PREFIX) {
            if let Some(section) = current.take() {
                settle(section, &mut paths, &mut ambiguous, policy)?;
            }
            headers += 1;
            current = Some(Section::new(line, rest));
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };

        if section.in_hunks {
            continue;
        }
        if line.starts_with("@@") {
            section.in_hunks = true;
            continue;
        }

        if let Some(path) = line
            .strip_prefix("rename to ")
            .or_else(|| line.strip_prefix("copy to "))
        {
            section.moved_to = Some(unquote_path(path));
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            let path = unquote_path(path.trim_end_matches('\t'));
            section.new_side = path.strip_prefix("b/").map(str::to_string);
        }
    }

    if let Some(section) = current.take() {
        settle(section, &mut paths, &mut ambiguous, policy)?;
    }

    Ok(Extraction {
        files: paths.into_iter().collect(),
        ambiguous,
        headers,
    })
}

/// Per-file section state collected between two headers.
struct Section<'a> {
    line: &'a str,
    rest: &'a str,
    moved_to: Option<String>,
    new_side: Option<String>,
    in_hunks: bool,
}

impl<'a> Section<'a> {
    fn new(line: &'a str, rest: &'a str) -> Self {
        Self {
            line,
            rest,
            moved_to: None,
            new_side: None,
            in_hunks: false,
        }
    }

    fn resolve(&self) -> Option<String> {
        if let Some(path) = quoted_b_side(self.rest) {
            return Some(path);
        }
        if let Some(path) = &self.moved_to {
            return Some(path.clone());
        }
        if let Some(path) = symmetric_b_side(self.rest) {
            return Some(path.to_string());
        }
        if let Some(path) = &self.new_side {
            return Some(path.clone());
        }
        single_separator_b_side(self.rest).map(str::to_string)
    }
}

fn settle(
    section: Section<'_>,
    paths: &mut Vec<ChangedFile>,
    ambiguous: &mut Vec<String>,
    policy: AmbiguityPolicy,
) -> Result<(), TitvoError> {
    match section.resolve().and_then(ChangedFile::new) {
        Some(file) => {
            paths.push(file);
            Ok(())
        }
        None => match policy {
            AmbiguityPolicy::Fail => {
                Err(TitvoError::ExtractionAmbiguity(section.line.to_string()))
            }
            AmbiguityPolicy::Skip => {
                tracing::warn!(header = section.line, "skipping ambiguous diff header");
                ambiguous.push(section.line.to_string());
                Ok(())
            }
        },
    }
}

/// Split `a/P b/P` at its midpoint. The header length is `2 * |P| + 5`, so the
/// a-side length is fixed by the line itself and no substring search is
/// needed.
fn symmetric_b_side(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix(A_PREFIX)?;
    let len = body.len().checked_sub(B_SEPARATOR.len())?;
    if len % 2 != 0 {
        return None;
    }
    let half = len / 2;
    if !body.is_char_boundary(half) {
        return None;
    }
    let (a_side, tail) = body.split_at(half);
    let b_side = tail.strip_prefix(B_SEPARATOR)?;
    (a_side == b_side).then_some(b_side)
}

fn single_separator_b_side(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix(A_PREFIX)?;
    let mut hits = body.match_indices(B_SEPARATOR);
    let (idx, _) = hits.next()?;
    if hits.next().is_some() {
        return None;
    }
    Some(&body[idx + B_SEPARATOR.len()..])
}

/// Headers where git quoted at least one side: `"a/x" "b/y"`, `a/x "b/y"`
/// or `"a/x" b/y`.
fn quoted_b_side(rest: &str) -> Option<String> {
    if !rest.contains('"') {
        return None;
    }
    let second = if rest.starts_with('"') {
        let (_, tail) = parse_quoted(rest)?;
        tail.strip_prefix(' ')?.to_string()
    } else {
        let idx = rest.rfind(" \"b/")?;
        rest[idx + 1..].to_string()
    };
    let b_side = if second.starts_with('"') {
        let (value, tail) = parse_quoted(&second)?;
        if !tail.is_empty() {
            return None;
        }
        value
    } else {
        second
    };
    b_side.strip_prefix("b/").map(str::to_string)
}

fn unquote_path(raw: &str) -> String {
    if raw.starts_with('"') {
        if let Some((value, tail)) = parse_quoted(raw) {
            if tail.is_empty() {
                return value;
            }
        }
    }
    raw.to_string()
}

/// Parse a C-style quoted string as written by git, returning the decoded
/// value and the unparsed remainder after the closing quote.
fn parse_quoted(input: &str) -> Option<(String, &str)> {
    let body = input.strip_prefix('"')?;
    let bytes = body.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let value = String::from_utf8_lossy(&out).into_owned();
                return Some((value, &body[i + 1..]));
            }
            b'\\' => {
                let next = *bytes.get(i + 1)?;
                match next {
                    b'0'..=b'7' => {
                        let digits = bytes.get(i + 1..i + 4)?;
                        let mut value: u32 = 0;
                        for d in digits {
                            if !(b'0'..=b'7').contains(d) {
                                return None;
                            }
                            value = value * 8 + u32::from(d - b'0');
                        }
                        out.push(u8::try_from(value).ok()?);
                        i += 4;
                        continue;
                    }
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'r' => out.push(b'\r'),
                    b'a' => out.push(0x07),
                    b'b' => out.push(0x08),
                    b'f' => out.push(0x0c),
                    b'v' => out.push(0x0b),
                    other => out.push(other),
                }
                i += 2;
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(input: &str) -> Vec<String> {
        changed_files(input)
            .iter()
            .map(|f| f.path().to_string())
            .collect()
    }

    #[test]
    fn empty_diff_returns_empty_set() {
        let extraction = extract("", AmbiguityPolicy::Fail).unwrap();
        assert!(extraction.files.is_empty());
        assert_eq!(extraction.headers, 0);
    }

    #[test]
    fn non_header_lines_are_ignored() {
        let diff = "\
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
+diff --git a/fake b/fake
";
        assert!(paths(diff).is_empty());
    }

    #[test]
    fn single_modified_file() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
 }
";
        assert_eq!(paths(diff), vec!["src/main.rs"]);
    }

    #[test]
    fn rename_keeps_only_new_path() {
        let diff = "\
diff --git a/foo.py b/foo.py
--- a/foo.py
+++ b/foo.py
@@ -1 +1 @@
-x = 1
+x = 2
diff --git a/old.py b/new.py
similarity index 100%
rename from old.py
rename to new.py
";
        assert_eq!(paths(diff), vec!["foo.py", "new.py"]);
    }

    #[test]
    fn copy_uses_copy_target() {
        let diff = "\
diff --git a/base.py b/base_copy.py
similarity index 100%
copy from base.py
copy to base_copy.py
";
        assert_eq!(paths(diff), vec!["base_copy.py"]);
    }

    #[test]
    fn results_are_sorted_and_deduplicated() {
        let diff = "\
diff --git a/z.py b/z.py
diff --git a/a.py b/a.py
diff --git a/m/n.py b/m/n.py
diff --git a/a.py b/a.py
";
        let extraction = extract(diff, AmbiguityPolicy::Skip).unwrap();
        assert_eq!(extraction.headers, 4);
        assert_eq!(extraction.files.paths(), vec!["a.py", "m/n.py", "z.py"]);
    }

    #[test]
    fn path_containing_separator_is_not_truncated() {
        let diff = "diff --git a/docs/a b/c.md b/docs/a b/c.md\n";
        assert_eq!(paths(diff), vec!["docs/a b/c.md"]);
    }

    #[test]
    fn renamed_path_containing_separator_uses_metadata() {
        let diff = "\
diff --git a/x b/old.txt b/x b/new.txt
similarity index 100%
rename from x b/old.txt
rename to x b/new.txt
";
        assert_eq!(paths(diff), vec!["x b/new.txt"]);
    }

    #[test]
    fn plus_line_resolves_asymmetric_header() {
        let diff = "\
diff --git a/p b/q.txt b/p b/r.txt
--- a/p b/q.txt
+++ b/p b/r.txt
@@ -1 +1 @@
-a
+b
";
        assert_eq!(paths(diff), vec!["p b/r.txt"]);
    }

    #[test]
    fn hunk_content_does_not_override_metadata() {
        let diff = "\
diff --git a/p b/q.txt b/p b/r.txt
--- a/p b/q.txt
+++ b/p b/r.txt
@@ -1 +1,2 @@
-a
+++ b/elsewhere.txt
";
        assert_eq!(paths(diff), vec!["p b/r.txt"]);
    }

    #[test]
    fn ambiguous_header_is_skipped_with_skip_policy() {
        let diff = "\
diff --git a/p b/q b/r b/s
diff --git a/ok.py b/ok.py
";
        let extraction = extract(diff, AmbiguityPolicy::Skip).unwrap();
        assert_eq!(extraction.files.paths(), vec!["ok.py"]);
        assert_eq!(extraction.ambiguous, vec!["diff --git a/p b/q b/r b/s"]);
    }

    #[test]
    fn ambiguous_header_fails_with_fail_policy() {
        let diff = "diff --git a/p b/q b/r b/s\n";
        let err = extract(diff, AmbiguityPolicy::Fail).unwrap_err();
        assert!(matches!(err, TitvoError::ExtractionAmbiguity(ref line) if line.contains("a/p b/q")));
    }

    #[test]
    fn empty_path_is_never_inserted() {
        let extraction = extract("diff --git a/ b/\n", AmbiguityPolicy::Skip).unwrap();
        assert!(extraction.files.is_empty());
        assert_eq!(extraction.ambiguous.len(), 1);
    }

    #[test]
    fn deleted_file_keeps_header_path() {
        let diff = "\
diff --git a/gone.py b/gone.py
deleted file mode 100644
index e69de29..0000000
--- a/gone.py
+++ /dev/null
@@ -1 +0,0 @@
-print('bye')
";
        assert_eq!(paths(diff), vec!["gone.py"]);
    }

    #[test]
    fn new_file_is_included() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1 @@
+fn hello() {}
";
        assert_eq!(paths(diff), vec!["new.rs"]);
    }

    #[test]
    fn quoted_header_is_unquoted() {
        let diff = "diff --git \"a/caf\\303\\251.txt\" \"b/caf\\303\\251.txt\"\n";
        assert_eq!(paths(diff), vec!["café.txt"]);
    }

    #[test]
    fn mixed_quoting_is_handled() {
        let diff = "diff --git a/plain.txt \"b/tab\\there.txt\"\n";
        assert_eq!(paths(diff), vec!["tab\there.txt"]);
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let diff = "diff --git a/win.txt b/win.txt\r\nindex 1..2 100644\r\n";
        assert_eq!(paths(diff), vec!["win.txt"]);
    }

    #[test]
    fn binary_sections_still_list_the_file() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
";
        assert_eq!(paths(diff), vec!["image.png"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let diff = "\
diff --git a/b.py b/b.py
diff --git a/a.py b/c.py
";
        let first = extract(diff, AmbiguityPolicy::Skip).unwrap();
        let second = extract(diff, AmbiguityPolicy::Skip).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_quoted_decodes_escapes() {
        let (value, rest) = parse_quoted("\"a\\\"b\\\\c\" tail").unwrap();
        assert_eq!(value, "a\"b\\c");
        assert_eq!(rest, " tail");
    }

    #[test]
    fn parse_quoted_rejects_unterminated() {
        assert!(parse_quoted("\"never closed").is_none());
    }

    #[test]
    fn symmetric_split_handles_multibyte_paths() {
        assert_eq!(symmetric_b_side("a/ñandú.rs b/ñandú.rs"), Some("ñandú.rs"));
        assert_eq!(symmetric_b_side("a/x.rs b/y.rs"), None);
    }
}
