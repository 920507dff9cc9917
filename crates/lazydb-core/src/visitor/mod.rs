use std::collections::BTreeMap;

// ============================================================================
// Path
// ============================================================================

#[derive(Clone, Copy, Debug)]
pub enum PathSegment {
    Field(&'static str),
    Index(usize),
}

// ============================================================================
// VisitorContext
// ============================================================================

/// Narrow interface exposed to constraint checks for reporting issues.
/// Implemented by the issue collector that tracks the current path.
pub trait VisitorContext {
    fn add_issue(&mut self, message: String);
}

impl dyn VisitorContext + '_ {
    pub fn issue(&mut self, msg: impl Into<String>) {
        self.add_issue(msg.into());
    }
}

// ============================================================================
// IssueCollector
// ============================================================================

/// Path-aware issue sink used by the validation walk.
#[derive(Debug, Default)]
pub struct IssueCollector {
    path: Vec<PathSegment>,
    issues: BTreeMap<String, Vec<String>>,
}

impl IssueCollector {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            path: Vec::new(),
            issues: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, seg: PathSegment) {
        self.path.push(seg);
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    #[must_use]
    pub const fn issues(&self) -> &BTreeMap<String, Vec<String>> {
        &self.issues
    }

    #[must_use]
    pub fn into_issues(self) -> BTreeMap<String, Vec<String>> {
        self.issues
    }
}

impl VisitorContext for IssueCollector {
    fn add_issue(&mut self, message: String) {
        let key = render_path(&self.path);
        self.issues.entry(key).or_default().push(message);
    }
}

fn render_path(path: &[PathSegment]) -> String {
    use std::fmt::Write;

    let mut out = String::new();

    for (i, seg) in path.iter().enumerate() {
        match seg {
            PathSegment::Field(s) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(s);
            }
            PathSegment::Index(n) => {
                let _ = write!(out, "[{n}]");
            }
        }
    }

    out
}

///
/// TESTS
///
