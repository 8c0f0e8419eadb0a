//! Tar encoding of a local image build context.
//!
//! The context is walked in name order without following symlinks, and
//! headers are written in tar's deterministic mode, so an unchanged tree
//! always produces the same bytes and the daemon's layer cache stays warm.
//! Paths matched by the context's `.dockerignore` are left out.

use std::io;

use camino::Utf8Path;
use cap_std::fs_utf8::Dir;
use tar::{Builder, HeaderMode};
use walkdir::{DirEntry, WalkDir};

const IGNORE_FILE: &str = ".dockerignore";

/// Files the daemon needs even when an ignore rule matches them.
const ALWAYS_SENT: [&str; 2] = ["Dockerfile", IGNORE_FILE];

/// Exclusion rules from a `.dockerignore` file.
///
/// Each non-comment line is a `/`-separated path relative to the context
/// root. Within a segment `*` matches any run of characters and `?` matches
/// one. A rule that matches a directory also matches everything below it,
/// and a leading `!` re-includes what an earlier rule excluded. The last
/// matching rule wins.
#[derive(Debug, Default)]
pub(super) struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

#[derive(Debug)]
struct IgnoreRule {
    segments: Vec<String>,
    include: bool,
}

impl IgnoreRules {
    pub(super) fn parse(contents: &str) -> Self {
        let rules = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let (include, pattern) = line
                    .strip_prefix('!')
                    .map_or((false, line), |rest| (true, rest.trim()));
                let segments: Vec<String> = pattern
                    .split('/')
                    .filter(|segment| !segment.is_empty() && *segment != ".")
                    .map(String::from)
                    .collect();
                (!segments.is_empty()).then_some(IgnoreRule { segments, include })
            })
            .collect();
        Self { rules }
    }

    /// Read `.dockerignore` from the context root; a missing file ignores nothing.
    pub(super) fn load(context: &Dir) -> io::Result<Self> {
        match context.read_to_string(IGNORE_FILE) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(error),
        }
    }

    pub(super) fn excludes(&self, archive_name: &str) -> bool {
        if ALWAYS_SENT.contains(&archive_name) {
            return false;
        }
        let path: Vec<&str> = archive_name.split('/').collect();
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(&path))
            .is_some_and(|rule| !rule.include)
    }
}

impl IgnoreRule {
    fn matches(&self, path: &[&str]) -> bool {
        self.segments.len() <= path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(pattern, name)| segment_matches(pattern, name))
    }
}

fn segment_matches(pattern: &str, name: &str) -> bool {
    let mut pattern_chars = pattern.chars();
    let mut name_chars = name.chars();
    match pattern_chars.next() {
        None => name.is_empty(),
        Some('*') => {
            let rest = pattern_chars.as_str();
            loop {
                if segment_matches(rest, name_chars.as_str()) {
                    return true;
                }
                if name_chars.next().is_none() {
                    return false;
                }
            }
        }
        Some('?') => {
            name_chars.next().is_some()
                && segment_matches(pattern_chars.as_str(), name_chars.as_str())
        }
        Some(expected) => {
            name_chars.next() == Some(expected)
                && segment_matches(pattern_chars.as_str(), name_chars.as_str())
        }
    }
}

/// Encode the build context rooted at `context_dir` as a tar archive.
///
/// Symlinks are stored as links rather than followed, so nothing outside
/// the context root is read.
pub(super) fn build_context_archive(
    context_dir: &Utf8Path,
    ignore: &IgnoreRules,
) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(vec![]);
    builder.follow_symlinks(false);
    builder.mode(HeaderMode::Deterministic);

    let walker = WalkDir::new(context_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();
    for entry_result in walker {
        let entry = entry_result.map_err(io::Error::from)?;
        let name = archive_name(context_dir, &entry)?;
        if ignore.excludes(&name) {
            tracing::trace!(path = %name, "excluded from build context");
            continue;
        }
        builder.append_path_with_name(entry.path(), &name)?;
    }

    builder.finish()?;
    builder.into_inner()
}

fn archive_name(context_dir: &Utf8Path, entry: &DirEntry) -> io::Result<String> {
    let relative = entry
        .path()
        .strip_prefix(context_dir)
        .map_err(io::Error::other)?;
    let utf8 = Utf8Path::from_path(relative).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("build context path is not UTF-8: {}", relative.display()),
        )
    })?;
    Ok(utf8
        .components()
        .map(|component| component.as_str())
        .collect::<Vec<_>>()
        .join("/"))
}
